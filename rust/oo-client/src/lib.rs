#![warn(missing_docs)]

//! Client for opaque-object stores.
//!
//! Content is sealed in a fresh [`Envelope`](oo_envelope::Envelope) before
//! it is handed to an [`ObjectStore`]. The store answers with a capability
//! chain for the object, and the [`Client`] extends that chain with a
//! third-party caveat at [`SELF_LOCATION`] whose condition is the envelope,
//! sealed to the principal's own key pair. Whoever holds the chain and the
//! key pair can discharge that caveat, which recovers the envelope; the store
//! only ever sees ciphertext.
//!
//! ```rust
//! use oo_client::{Client, MemoryObjectStore};
//! use oo_credentials::KeyManager;
//!
//! # async fn example() -> Result<(), oo_client::OoClientError> {
//! let client = Client::new(MemoryObjectStore::default(), KeyManager::new(".oo"));
//!
//! let issued = client.issue(b"hello world", Some("text/plain")).await?;
//! let read_only = client.attenuate(&issued.chain, "method=read", None, None)?;
//!
//! assert_eq!(client.resolve_and_fetch(&read_only).await?, b"hello world");
//! # Ok(())
//! # }
//! ```

mod caveat;
pub use caveat::*;

mod config;
pub use config::*;

mod discharge;
pub use discharge::*;

mod error;
pub use error::*;

mod operations;
pub use operations::*;

mod store;
pub use store::*;
