use thiserror::Error;

/// The common error type used by this crate
#[derive(Error, Debug)]
pub enum MacaroonError {
    /// The wire form of a capability could not be decoded
    #[error("Failed to decode capability: {0}")]
    Decode(String),

    /// A capability could not be encoded to its wire form
    #[error("Failed to encode capability: {0}")]
    Encode(String),

    /// A chain must contain at least its primary token
    #[error("Capability chain is empty")]
    EmptyChain,

    /// The system random source failed
    #[error("Random number generation failed: {0}")]
    Entropy(String),

    /// A third-party caveat key could not be sealed under the token signature
    #[error("Failed to seal caveat key: {0}")]
    Seal(String),
}

/// Errors produced while looking up the object a chain refers to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectIdError {
    /// No token in the chain carries an `object` caveat
    #[error("Object caveat not found")]
    NotFound,

    /// Two `object` caveats name different objects
    #[error("Multiple conflicting object caveats: {first:?} and {second:?}")]
    Conflicting {
        /// The first object id encountered.
        first: String,
        /// A later object id that differs from the first.
        second: String,
    },
}

/// Reasons a chain fails verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// A token's signature does not match its recomputed value
    #[error("Signature mismatch on token {identifier}")]
    SignatureMismatch {
        /// Printable form of the offending token identifier.
        identifier: String,
    },

    /// The checker rejected a first-party condition
    #[error("Caveat not satisfied: {condition}: {reason}")]
    CaveatNotSatisfied {
        /// The rejected condition.
        condition: String,
        /// Why the checker rejected it.
        reason: String,
    },

    /// A third-party caveat has no matching discharge in the chain
    #[error("No discharge for third-party caveat at {location}")]
    MissingDischarge {
        /// Location of the undischarged caveat.
        location: String,
    },

    /// The verification id of a third-party caveat did not open
    #[error("Verification id of caveat at {location} is invalid")]
    InvalidVerificationId {
        /// Location of the caveat.
        location: String,
    },

    /// A discharge was presented that no caveat asked for
    #[error("Discharge {identifier} was not used")]
    UnusedDischarge {
        /// Printable form of the unused discharge identifier.
        identifier: String,
    },
}
