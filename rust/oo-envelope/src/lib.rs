#![warn(missing_docs)]

//! Encryption context for a single stored object.
//!
//! An [`Envelope`] holds a single-use nonce, a symmetric key and the SHA-384
//! digest of the plaintext it sealed. Content is sealed with
//! XChaCha20-Poly1305, so any modification of the ciphertext is detected when
//! it is opened.
//!
//! The envelope never travels to the object store in the clear. Its encoded
//! form ([`Envelope::to_bytes`]) is a fixed-width concatenation
//! `nonce || key || digest` meant to be carried inside a sealed capability
//! caveat.

mod error;

pub use error::*;

use std::fmt::{Debug, Formatter};

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use sha2::{Digest, Sha384};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length in bytes of the envelope nonce.
pub const NONCE_LENGTH: usize = 24;

/// Length in bytes of the envelope key.
pub const KEY_LENGTH: usize = 32;

/// Length in bytes of the content digest.
pub const DIGEST_LENGTH: usize = 48;

/// Length in bytes of an encoded envelope.
pub const ENCODED_LENGTH: usize = NONCE_LENGTH + KEY_LENGTH + DIGEST_LENGTH;

/// Nonce, key and content digest for one object.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Envelope {
    nonce: [u8; NONCE_LENGTH],
    key: [u8; KEY_LENGTH],
    digest: [u8; DIGEST_LENGTH],
}

impl Envelope {
    /// Draw a fresh nonce and key from the system randomness source.
    ///
    /// The digest stays zeroed until [`Envelope::seal`] is called.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::Entropy`] when randomness is unavailable.
    pub fn generate() -> Result<Self, EnvelopeError> {
        let mut envelope = Self {
            nonce: [0; NONCE_LENGTH],
            key: [0; KEY_LENGTH],
            digest: [0; DIGEST_LENGTH],
        };
        getrandom::getrandom(&mut envelope.nonce)
            .and_then(|_| getrandom::getrandom(&mut envelope.key))
            .map_err(|error| EnvelopeError::Entropy(error.to_string()))?;
        Ok(envelope)
    }

    /// Record the digest of `plaintext` and return its authenticated
    /// ciphertext.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::EncryptionFailed`] if the cipher refuses the input.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        self.digest = digest(plaintext);
        self.cipher()
            .encrypt(XNonce::from_slice(&self.nonce), plaintext)
            .map_err(|_| EnvelopeError::EncryptionFailed)
    }

    /// Authenticate and decrypt `ciphertext`.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::DecryptionFailed`] when the ciphertext was altered,
    /// truncated, or sealed under a different envelope. No plaintext is
    /// returned in that case.
    pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        self.cipher()
            .decrypt(XNonce::from_slice(&self.nonce), ciphertext)
            .map_err(|_| EnvelopeError::DecryptionFailed)
    }

    /// Digest recorded by the last [`Envelope::seal`].
    pub fn digest(&self) -> &[u8; DIGEST_LENGTH] {
        &self.digest
    }

    /// `true` when `plaintext` hashes to the recorded digest.
    pub fn matches_digest(&self, plaintext: &[u8]) -> bool {
        digest(plaintext) == self.digest
    }

    /// Fixed-width encoding `nonce || key || digest`.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(ENCODED_LENGTH));
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.key);
        bytes.extend_from_slice(&self.digest);
        bytes
    }

    /// Decode the output of [`Envelope::to_bytes`].
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::MalformedEnvelope`] unless `bytes` is exactly
    /// [`ENCODED_LENGTH`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() != ENCODED_LENGTH {
            return Err(EnvelopeError::MalformedEnvelope(format!(
                "expected {ENCODED_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let (nonce, rest) = bytes.split_at(NONCE_LENGTH);
        let (key, digest) = rest.split_at(KEY_LENGTH);

        Ok(Self {
            nonce: field("nonce", nonce)?,
            key: field("key", key)?,
            digest: field("digest", digest)?,
        })
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.key))
    }
}

impl Debug for Envelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

fn digest(plaintext: &[u8]) -> [u8; DIGEST_LENGTH] {
    let mut out = [0u8; DIGEST_LENGTH];
    out.copy_from_slice(&Sha384::digest(plaintext));
    out
}

fn field<const N: usize>(name: &str, bytes: &[u8]) -> Result<[u8; N], EnvelopeError> {
    bytes.try_into().map_err(|_| {
        EnvelopeError::MalformedEnvelope(format!(
            "{name} must be {N} bytes, got {}",
            bytes.len()
        ))
    })
}
