#![warn(missing_docs)]

//! Attenuable, delegable capability tokens.
//!
//! A [`Macaroon`] is a bearer credential whose signature is a keyed hash
//! chain over its identifier and every caveat appended to it. Anybody holding
//! a token can append a caveat (narrowing what it authorizes), but nobody can
//! remove one without knowing the root key.
//!
//! Caveats come in two kinds:
//!
//! - **first-party** caveats carry a plain condition (for example
//!   `object=01J9...` or `before 2020-01-01T00:00:00Z`) that the verifying
//!   service evaluates directly;
//! - **third-party** caveats name an authority (their location) and can only
//!   be satisfied by presenting a *discharge* token minted by that authority
//!   and bound to the primary token with [`Macaroon::bind`].
//!
//! A [`Chain`] is the unit that travels between processes: the primary token
//! followed by any bound discharges. It has a lossless JSON wire form
//! ([`Chain::parse`] / [`Chain::to_bytes`]).
//!
//! # Example
//!
//! ```
//! use oo_macaroon::{Chain, Macaroon, condition};
//!
//! let root_key = b"a root key only the service knows";
//! let token = Macaroon::new(root_key, "01J9ZQ", "https://store.example")
//!     .add_first_party_caveat(&condition::object("01J9ZQ"));
//! let chain = Chain::new(token);
//!
//! let bytes = chain.to_bytes().unwrap();
//! let received = Chain::parse(&bytes).unwrap();
//!
//! assert_eq!(received.object_id().unwrap(), "01J9ZQ");
//! received
//!     .verify(root_key, |condition| match condition::parse(condition) {
//!         Some((condition::OBJECT, "01J9ZQ")) => Ok(()),
//!         _ => Err("unexpected caveat".to_string()),
//!     })
//!     .unwrap();
//! ```

mod caveat;
mod chain;
pub mod condition;
mod crypto;
mod error;
mod macaroon;
mod verify;
mod wire;

pub use caveat::*;
pub use chain::*;
pub use crypto::{CAVEAT_KEY_LENGTH, SIGNATURE_LENGTH};
pub use error::*;
pub use macaroon::*;
