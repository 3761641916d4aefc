//! Anonymous sealed boxes addressed to a [`PublicKey`].
//!
//! A sender draws an ephemeral X25519 secret, agrees on a shared point with
//! the recipient's Ed25519 key in its Montgomery form, and encrypts the
//! payload with XChaCha20-Poly1305 under a key derived from that point.
//!
//! ```text
//! version (1) || ephemeral public (32) || nonce (24) || ciphertext
//! ```

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use curve25519_dalek::MontgomeryPoint;
use zeroize::Zeroizing;

use crate::{KeyError, KeyPair, PublicKey};

const VERSION: u8 = 1;
const POINT_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 24;
const HEADER_LENGTH: usize = 1 + POINT_LENGTH + NONCE_LENGTH;
const SEAL_CONTEXT: &str = "oo-credentials 2015-09-08 sealed box";

fn box_key(
    shared: &MontgomeryPoint,
    ephemeral: &MontgomeryPoint,
    recipient: &MontgomeryPoint,
) -> Result<Zeroizing<[u8; 32]>, KeyError> {
    if shared.as_bytes() == &[0u8; POINT_LENGTH] {
        return Err(KeyError::OpenFailed);
    }
    let mut material = Zeroizing::new(Vec::with_capacity(3 * POINT_LENGTH));
    material.extend_from_slice(shared.as_bytes());
    material.extend_from_slice(ephemeral.as_bytes());
    material.extend_from_slice(recipient.as_bytes());
    Ok(Zeroizing::new(blake3::derive_key(SEAL_CONTEXT, &material)))
}

impl PublicKey {
    /// Seal `plaintext` so only the holder of this key's pair can open it.
    ///
    /// # Errors
    ///
    /// Fails when randomness is unavailable.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
        let mut ephemeral_secret = Zeroizing::new([0u8; 32]);
        let mut nonce = [0u8; NONCE_LENGTH];
        getrandom::getrandom(ephemeral_secret.as_mut_slice())?;
        getrandom::getrandom(&mut nonce)?;

        let recipient = self.verifying_key().to_montgomery();
        let ephemeral = MontgomeryPoint::mul_base_clamped(*ephemeral_secret);
        let shared = recipient.mul_clamped(*ephemeral_secret);
        let key = box_key(&shared, &ephemeral, &recipient).map_err(|_| KeyError::SealFailed)?;

        let ciphertext = XChaCha20Poly1305::new(Key::from_slice(key.as_slice()))
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| KeyError::SealFailed)?;

        let mut sealed = Vec::with_capacity(HEADER_LENGTH + ciphertext.len());
        sealed.push(VERSION);
        sealed.extend_from_slice(ephemeral.as_bytes());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }
}

impl KeyPair {
    /// Open a box sealed to this pair's public key.
    ///
    /// # Errors
    ///
    /// [`KeyError::MalformedSealedBox`] when the layout is wrong, and
    /// [`KeyError::OpenFailed`] when the box was sealed to another key or
    /// has been altered.
    pub fn open(&self, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        if sealed.len() < HEADER_LENGTH {
            return Err(KeyError::MalformedSealedBox(format!(
                "expected at least {HEADER_LENGTH} bytes, got {}",
                sealed.len()
            )));
        }
        let (version, rest) = sealed.split_at(1);
        if version[0] != VERSION {
            return Err(KeyError::MalformedSealedBox(format!(
                "unsupported version {}",
                version[0]
            )));
        }
        let (ephemeral, rest) = rest.split_at(POINT_LENGTH);
        let (nonce, ciphertext) = rest.split_at(NONCE_LENGTH);

        let ephemeral_bytes: [u8; POINT_LENGTH] = ephemeral
            .try_into()
            .map_err(|_| KeyError::MalformedSealedBox("truncated ephemeral key".into()))?;
        let ephemeral = MontgomeryPoint(ephemeral_bytes);
        let recipient = self.public_key().verifying_key().to_montgomery();
        let shared = ephemeral.mul_clamped(*self.scalar_bytes());
        let key = box_key(&shared, &ephemeral, &recipient)?;

        XChaCha20Poly1305::new(Key::from_slice(key.as_slice()))
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| KeyError::OpenFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SEED_LENGTH;

    #[test]
    fn it_opens_boxes_sealed_to_its_public_key() -> anyhow::Result<()> {
        let pair = KeyPair::generate()?;
        let sealed = pair.public_key().seal(b"caveat payload")?;

        assert_eq!(sealed.len(), HEADER_LENGTH + b"caveat payload".len() + 16);
        assert_eq!(pair.open(&sealed)?.as_slice(), b"caveat payload");
        Ok(())
    }

    #[test]
    fn it_uses_a_fresh_ephemeral_key_per_box() -> anyhow::Result<()> {
        let public_key = KeyPair::from_seed(&[5; SEED_LENGTH]).public_key();
        assert_ne!(public_key.seal(b"same")?, public_key.seal(b"same")?);
        Ok(())
    }

    #[test]
    fn it_refuses_boxes_for_other_keys() -> anyhow::Result<()> {
        let intended = KeyPair::from_seed(&[1; SEED_LENGTH]);
        let other = KeyPair::from_seed(&[2; SEED_LENGTH]);
        let sealed = intended.public_key().seal(b"secret")?;

        assert!(matches!(other.open(&sealed), Err(KeyError::OpenFailed)));
        Ok(())
    }

    #[test]
    fn it_refuses_altered_or_truncated_boxes() -> anyhow::Result<()> {
        let pair = KeyPair::from_seed(&[3; SEED_LENGTH]);
        let sealed = pair.public_key().seal(b"secret")?;

        let mut altered = sealed.clone();
        let last = altered.len() - 1;
        altered[last] ^= 0x01;
        assert!(matches!(pair.open(&altered), Err(KeyError::OpenFailed)));

        let mut versioned = sealed.clone();
        versioned[0] = 9;
        assert!(matches!(
            pair.open(&versioned),
            Err(KeyError::MalformedSealedBox(_))
        ));

        assert!(matches!(
            pair.open(&sealed[..HEADER_LENGTH - 1]),
            Err(KeyError::MalformedSealedBox(_))
        ));
        Ok(())
    }
}
