//! The object store a client talks to.
//!
//! An object store keeps opaque (already encrypted) content and guards every
//! object with a capability chain: creating an object returns the chain that
//! grants access to it, and fetching or deleting requires presenting a fully
//! discharged chain.

use async_trait::async_trait;
use oo_macaroon::Chain;
use thiserror::Error;

mod http;
pub use http::*;

mod memory;
pub use memory::*;

/// HTTP-like status used for a missing object.
pub const NOT_FOUND: u16 = 404;

/// HTTP-like status used for a capability the store refuses.
pub const FORBIDDEN: u16 = 403;

/// Errors reported by an [`ObjectStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store answered with a non-success status
    #[error("{status}: {message}")]
    Status {
        /// HTTP-like status code
        status: u16,
        /// Message supplied by the store
        message: String,
    },

    /// The store could not be reached
    #[error("Object store unreachable: {0}")]
    Transport(String),

    /// The request could not be encoded
    #[error("Invalid object store request: {0}")]
    InvalidRequest(String),

    /// The store answered with something other than what was asked for
    #[error("Invalid object store response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// A "no such object" error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Status {
            status: NOT_FOUND,
            message: message.into(),
        }
    }

    /// The status the store answered with, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` when the store reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(NOT_FOUND)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            StoreError::InvalidResponse(error.to_string())
        } else {
            StoreError::Transport(error.to_string())
        }
    }
}

/// A store of opaque objects guarded by capability chains.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `content` as a new object and return the chain granting access
    /// to it. The chain carries an `object` caveat naming the new object.
    async fn create(&self, content: Vec<u8>, content_type: Option<&str>)
    -> Result<Chain, StoreError>;

    /// Return the content of `object_id`, authorized by `chain`.
    async fn fetch(&self, object_id: &str, chain: &Chain) -> Result<Vec<u8>, StoreError>;

    /// Remove `object_id`, authorized by `chain`.
    async fn delete(&self, object_id: &str, chain: &Chain) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> ObjectStore for std::sync::Arc<S>
where
    S: ObjectStore + ?Sized,
{
    async fn create(
        &self,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<Chain, StoreError> {
        (**self).create(content, content_type).await
    }

    async fn fetch(&self, object_id: &str, chain: &Chain) -> Result<Vec<u8>, StoreError> {
        (**self).fetch(object_id, chain).await
    }

    async fn delete(&self, object_id: &str, chain: &Chain) -> Result<(), StoreError> {
        (**self).delete(object_id, chain).await
    }
}
