#![warn(missing_docs)]

//! Key material for an oo principal.
//!
//! A principal owns one Ed25519 [`KeyPair`], persisted by a [`KeyManager`]
//! under an explicit home directory. Its [`PublicKey`] is shared as a
//! `did:key`; anybody holding it can [`PublicKey::seal`] a payload that only
//! the pair can [`KeyPair::open`]. Third-party caveat ids are sealed this
//! way, so the principal can act as the discharge authority for caveats
//! addressed to it.

mod error;
mod key;
mod manager;
mod sealed;

pub use error::*;
pub use key::*;
pub use manager::*;
