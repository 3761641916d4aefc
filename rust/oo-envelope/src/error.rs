use thiserror::Error;

/// Errors produced while creating, using or decoding an [`crate::Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The system randomness source could not be read.
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    /// The plaintext could not be encrypted.
    #[error("Content could not be encrypted")]
    EncryptionFailed,

    /// The ciphertext did not authenticate under this envelope.
    #[error("Content failed authentication")]
    DecryptionFailed,

    /// Encoded envelope bytes have the wrong shape.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
}
