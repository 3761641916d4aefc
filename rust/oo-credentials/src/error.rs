//! Error types for key material and its persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from creating or using key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Random number generation failed.
    #[error("RNG error: {0}")]
    Rng(getrandom::Error),

    /// The seed bytes have the wrong length (expected 32).
    #[error("Expected 32 seed bytes, got {0}")]
    InvalidSeedLength(usize),

    /// A sealed box does not have the expected layout.
    #[error("Malformed sealed box: {0}")]
    MalformedSealedBox(String),

    /// A sealed box could not be sealed.
    #[error("Failed to seal payload")]
    SealFailed,

    /// A sealed box was not addressed to this key pair, or was altered.
    #[error("Failed to open sealed box")]
    OpenFailed,
}

impl From<getrandom::Error> for KeyError {
    fn from(error: getrandom::Error) -> Self {
        Self::Rng(error)
    }
}

/// Errors that can occur when parsing a [`crate::PublicKey`] from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DidFromStrError {
    /// The DID header is invalid.
    #[error("Invalid did header")]
    InvalidDidHeader,

    /// The base58 prefix 'z' is missing.
    #[error("Missing base58 prefix 'z'")]
    MissingBase58Prefix,

    /// The base58 encoding is invalid.
    #[error("Invalid base58 encoding")]
    InvalidBase58,

    /// The key bytes are invalid.
    #[error("Invalid key bytes")]
    InvalidKey,
}

/// Errors from loading or persisting the principal's key pair.
#[derive(Debug, Error)]
pub enum KeyManagerError {
    /// Reading or writing the key record failed.
    #[error("Key file {path:?}: {source}")]
    Io {
        /// Path of the file or directory involved.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A key pair already exists and overwriting was not requested.
    #[error("Key pair already exists at {0:?}")]
    Exists(PathBuf),

    /// The key record could not be decoded.
    #[error("Invalid key record: {0}")]
    Decode(String),

    /// Key material could not be generated.
    #[error(transparent)]
    Key(#[from] KeyError),
}
