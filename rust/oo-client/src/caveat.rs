use oo_credentials::{KeyError, KeyPair, PublicKey};
use oo_macaroon::{CAVEAT_KEY_LENGTH, Macaroon};
use zeroize::Zeroizing;

use crate::OoClientError;

/// What a third-party authority learns from a caveat id addressed to it:
/// the root key to mint the discharge under, and the condition to check.
///
/// The caveat id is this pair sealed to the authority's public key, so only
/// that authority can read the condition or produce the discharge.
pub struct ThirdPartyCaveatInfo {
    root_key: Zeroizing<[u8; CAVEAT_KEY_LENGTH]>,
    condition: Zeroizing<String>,
}

impl ThirdPartyCaveatInfo {
    /// A fresh caveat for `condition` with a random root key.
    ///
    /// # Errors
    ///
    /// [`OoClientError::Entropy`] when randomness is unavailable.
    pub fn new(condition: impl Into<String>) -> Result<Self, OoClientError> {
        let mut root_key = Zeroizing::new([0u8; CAVEAT_KEY_LENGTH]);
        getrandom::getrandom(root_key.as_mut_slice())
            .map_err(|error| OoClientError::Entropy(error.to_string()))?;
        Ok(Self {
            root_key,
            condition: Zeroizing::new(condition.into()),
        })
    }

    /// Root key the discharge must be minted under.
    pub fn root_key(&self) -> &[u8; CAVEAT_KEY_LENGTH] {
        &self.root_key
    }

    /// The condition the authority is asked to vouch for.
    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// Seal this caveat to `authority`, producing the caveat id.
    ///
    /// # Errors
    ///
    /// Fails when randomness is unavailable or `authority` is a low-order
    /// point.
    pub fn seal(&self, authority: &PublicKey) -> Result<Vec<u8>, KeyError> {
        let mut payload = Zeroizing::new(Vec::with_capacity(
            CAVEAT_KEY_LENGTH + self.condition.len(),
        ));
        payload.extend_from_slice(self.root_key.as_slice());
        payload.extend_from_slice(self.condition.as_bytes());
        authority.seal(&payload)
    }

    /// Recover the caveat behind `caveat_id` with the authority's key pair.
    ///
    /// # Errors
    ///
    /// Fails when the id was not sealed to `key_pair` or its payload is
    /// malformed.
    pub fn open(key_pair: &KeyPair, caveat_id: &[u8]) -> Result<Self, KeyError> {
        let payload = key_pair.open(caveat_id)?;
        if payload.len() < CAVEAT_KEY_LENGTH {
            return Err(KeyError::MalformedSealedBox(
                "caveat payload is shorter than its root key".into(),
            ));
        }
        let (root_key, condition) = payload.split_at(CAVEAT_KEY_LENGTH);

        let root_key: [u8; CAVEAT_KEY_LENGTH] = root_key
            .try_into()
            .map_err(|_| KeyError::MalformedSealedBox("truncated root key".into()))?;
        let condition = std::str::from_utf8(condition)
            .map_err(|_| KeyError::MalformedSealedBox("condition is not UTF-8".into()))?;

        Ok(Self {
            root_key: Zeroizing::new(root_key),
            condition: Zeroizing::new(condition.to_string()),
        })
    }

    /// Append this caveat to `macaroon` as a third-party caveat at
    /// `location`, addressed to `authority`.
    ///
    /// # Errors
    ///
    /// [`OoClientError::Entropy`] when randomness is unavailable and
    /// [`OoClientError::SealFailed`] when `authority` is not a usable key.
    pub fn add_to(
        &self,
        macaroon: &Macaroon,
        authority: &PublicKey,
        location: &str,
    ) -> Result<Macaroon, OoClientError> {
        let caveat_id = self
            .seal(authority)
            .map_err(|error| match error {
                KeyError::Rng(error) => OoClientError::Entropy(error.to_string()),
                other => OoClientError::SealFailed(format!("{authority}: {other}")),
            })?;
        Ok(macaroon.add_third_party_caveat(&self.root_key, caveat_id, location)?)
    }

    /// Mint the discharge for the caveat `caveat_id`, minted at `location`.
    pub fn discharge(&self, caveat_id: &[u8], location: &str) -> Macaroon {
        Macaroon::new(self.root_key.as_slice(), caveat_id, location)
    }
}

impl std::fmt::Debug for ThirdPartyCaveatInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThirdPartyCaveatInfo").finish_non_exhaustive()
    }
}
