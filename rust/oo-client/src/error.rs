use oo_credentials::KeyManagerError;
use oo_envelope::EnvelopeError;
use oo_macaroon::{MacaroonError, ObjectIdError};
use thiserror::Error;

use crate::StoreError;

/// Every way a client operation can fail.
#[derive(Debug, Error)]
pub enum OoClientError {
    /// The capability could not be decoded or encoded.
    #[error("Malformed capability: {0}")]
    MalformedCapability(String),

    /// No token in the chain carries an `object` caveat.
    #[error("No object caveat found in capability")]
    ObjectNotFound,

    /// Two `object` caveats in the chain name different objects.
    #[error("Conflicting object caveats: {first:?} and {second:?}")]
    ConflictingObjectId {
        /// The object id seen first.
        first: String,
        /// The differing object id seen afterwards.
        second: String,
    },

    /// Randomness was unavailable.
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    /// Content could not be encrypted.
    #[error("Content could not be encrypted")]
    EncryptionFailed,

    /// Content did not authenticate under the recovered envelope.
    #[error("Decryption failed: content is corrupt or has been tampered with")]
    DecryptionFailed,

    /// An envelope carried in a caveat has the wrong shape.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// A caveat addressed to this principal could not be discharged.
    #[error("Self-discharge failed: {0}")]
    SelfDischargeFailed(String),

    /// A remote authority did not produce a discharge.
    #[error("Discharge from {location} failed: {reason}")]
    RemoteDischargeFailed {
        /// Location of the authority.
        location: String,
        /// What went wrong.
        reason: String,
    },

    /// A caveat could not be sealed to its authority's key.
    #[error("Failed to seal caveat: {0}")]
    SealFailed(String),

    /// A third-party caveat was requested without the authority's key.
    #[error("A public key is required for third-party location {0}")]
    MissingAuthorityKey(String),

    /// The object store refused or failed the request.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The principal's key pair could not be loaded or saved.
    #[error(transparent)]
    KeyPersistence(#[from] KeyManagerError),
}

impl OoClientError {
    /// `true` when the object store reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_not_found())
    }
}

impl From<MacaroonError> for OoClientError {
    fn from(error: MacaroonError) -> Self {
        match error {
            MacaroonError::Entropy(reason) => Self::Entropy(reason),
            other => Self::MalformedCapability(other.to_string()),
        }
    }
}

impl From<ObjectIdError> for OoClientError {
    fn from(error: ObjectIdError) -> Self {
        match error {
            ObjectIdError::NotFound => Self::ObjectNotFound,
            ObjectIdError::Conflicting { first, second } => {
                Self::ConflictingObjectId { first, second }
            }
        }
    }
}

impl From<EnvelopeError> for OoClientError {
    fn from(error: EnvelopeError) -> Self {
        match error {
            EnvelopeError::Entropy(reason) => Self::Entropy(reason),
            EnvelopeError::EncryptionFailed => Self::EncryptionFailed,
            EnvelopeError::DecryptionFailed => Self::DecryptionFailed,
            EnvelopeError::MalformedEnvelope(reason) => Self::MalformedEnvelope(reason),
        }
    }
}
