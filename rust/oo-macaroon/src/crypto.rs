//! Keyed hash chaining and caveat key sealing.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use zeroize::Zeroizing;

use crate::MacaroonError;

/// Length in bytes of a token signature.
pub const SIGNATURE_LENGTH: usize = 32;

/// Length in bytes of the root key that guards a third-party caveat.
pub const CAVEAT_KEY_LENGTH: usize = 32;

const NONCE_LENGTH: usize = 24;

const ROOT_KEY_CONTEXT: &str = "oo-macaroon 2015-09-08 root key";
const BIND_CONTEXT: &str = "oo-macaroon 2015-09-08 discharge binding";

pub(crate) type Signature = [u8; SIGNATURE_LENGTH];

/// Stretch an arbitrary-length root key into the initial chaining key.
pub(crate) fn derive_root_key(root_key: &[u8]) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(blake3::derive_key(ROOT_KEY_CONTEXT, root_key))
}

/// Advance the signature chain by one link.
///
/// Each part is length-prefixed so that `[a, bc]` and `[ab, c]` hash
/// differently.
pub(crate) fn chain(key: &[u8; 32], parts: &[&[u8]]) -> Signature {
    let mut hasher = blake3::Hasher::new_keyed(key);
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Signature of a discharge once bound to a primary token.
pub(crate) fn bind(primary: &Signature, discharge: &Signature) -> Signature {
    let mut hasher = blake3::Hasher::new_derive_key(BIND_CONTEXT);
    hasher.update(primary);
    hasher.update(discharge);
    *hasher.finalize().as_bytes()
}

/// Constant-time signature comparison.
pub(crate) fn signatures_match(left: &Signature, right: &Signature) -> bool {
    blake3::Hash::from(*left) == blake3::Hash::from(*right)
}

/// Seal a caveat root key under the current signature, producing the
/// verification id (`nonce || ciphertext`).
pub(crate) fn seal_key(
    signature: &Signature,
    caveat_key: &[u8; CAVEAT_KEY_LENGTH],
) -> Result<Vec<u8>, MacaroonError> {
    let mut nonce = [0u8; NONCE_LENGTH];
    getrandom::getrandom(&mut nonce).map_err(|error| MacaroonError::Entropy(error.to_string()))?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(signature));
    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), caveat_key.as_slice())
        .map_err(|error| MacaroonError::Seal(error.to_string()))?;

    let mut verification_id = Vec::with_capacity(NONCE_LENGTH + sealed.len());
    verification_id.extend_from_slice(&nonce);
    verification_id.extend_from_slice(&sealed);
    Ok(verification_id)
}

/// Recover a caveat root key from its verification id. Returns `None` when
/// the id was not sealed under `signature` or has been altered.
pub(crate) fn open_key(
    signature: &Signature,
    verification_id: &[u8],
) -> Option<Zeroizing<[u8; CAVEAT_KEY_LENGTH]>> {
    if verification_id.len() <= NONCE_LENGTH {
        return None;
    }
    let (nonce, sealed) = verification_id.split_at(NONCE_LENGTH);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(signature));
    let opened = Zeroizing::new(cipher.decrypt(XNonce::from_slice(nonce), sealed).ok()?);

    let key: [u8; CAVEAT_KEY_LENGTH] = opened.as_slice().try_into().ok()?;
    Some(Zeroizing::new(key))
}
