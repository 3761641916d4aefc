//! Ed25519 key pairs and their `did:key` public form.

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use base58::{FromBase58, ToBase58};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::{DidFromStrError, KeyError};

const DID_KEY_PREFIX: &str = "did:key:z";
const ED25519_PUB: [u8; 2] = [0xed, 0x01];

/// Length in bytes of a key-pair seed.
pub const SEED_LENGTH: usize = 32;

/// The public half of a principal's key pair, written as an Ed25519
/// `did:key`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Raw Ed25519 public key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Build from raw Ed25519 public key bytes.
    ///
    /// # Errors
    ///
    /// Fails when the bytes are not a valid curve point, or are a point of
    /// small order that nothing can be sealed to.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, DidFromStrError> {
        let key = VerifyingKey::from_bytes(bytes).map_err(|_| DidFromStrError::InvalidKey)?;
        if key.is_weak() {
            return Err(DidFromStrError::InvalidKey);
        }
        Ok(Self(key))
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key)
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut raw_bytes = Vec::with_capacity(34);
        raw_bytes.extend_from_slice(&ED25519_PUB);
        raw_bytes.extend_from_slice(&self.0.to_bytes());
        write!(f, "{DID_KEY_PREFIX}{}", raw_bytes.to_base58())
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_string()).finish()
    }
}

impl FromStr for PublicKey {
    type Err = DidFromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 || parts[0] != "did" || parts[1] != "key" {
            return Err(DidFromStrError::InvalidDidHeader);
        }
        let b58 = parts[2]
            .strip_prefix('z')
            .ok_or(DidFromStrError::MissingBase58Prefix)?;
        let decoded = b58
            .from_base58()
            .map_err(|_| DidFromStrError::InvalidBase58)?;
        let raw: [u8; 34] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| DidFromStrError::InvalidKey)?;
        if raw[..2] != ED25519_PUB {
            return Err(DidFromStrError::InvalidKey);
        }
        let key: [u8; 32] = raw[2..]
            .try_into()
            .map_err(|_| DidFromStrError::InvalidKey)?;
        Self::from_bytes(&key)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A principal's Ed25519 key pair.
///
/// The pair is used to open sealed boxes addressed to its public key, which
/// is how a principal acts as the discharge authority for its own caveats.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new key pair with a seed from `getrandom`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG fails.
    pub fn generate() -> Result<Self, KeyError> {
        let mut seed = Zeroizing::new([0u8; SEED_LENGTH]);
        getrandom::getrandom(seed.as_mut_slice())?;
        Ok(Self::from_seed(&seed))
    }

    /// Rebuild a key pair from its seed.
    pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Rebuild a key pair from a seed of unchecked length.
    ///
    /// # Errors
    ///
    /// [`KeyError::InvalidSeedLength`] unless `seed` is 32 bytes.
    pub fn from_seed_slice(seed: &[u8]) -> Result<Self, KeyError> {
        let seed: &[u8; SEED_LENGTH] = seed
            .try_into()
            .map_err(|_| KeyError::InvalidSeedLength(seed.len()))?;
        Ok(Self::from_seed(seed))
    }

    /// The secret seed of this pair.
    pub fn seed(&self) -> Zeroizing<[u8; SEED_LENGTH]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// The public half of this pair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key())
    }

    pub(crate) fn scalar_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_scalar_bytes())
    }
}

impl Debug for KeyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
