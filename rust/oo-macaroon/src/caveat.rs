use std::fmt::{Debug, Formatter};

use base64::Engine;

/// Whether a caveat is checked by the verifier itself or by a named authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaveatKind {
    /// The condition is evaluated directly by whoever verifies the chain.
    FirstParty,
    /// The condition is vouched for by the authority at the caveat location,
    /// in the form of a discharge token.
    ThirdParty,
}

/// A restriction attached to a [`crate::Macaroon`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Caveat {
    id: Vec<u8>,
    verification_id: Option<Vec<u8>>,
    location: Option<String>,
}

impl Caveat {
    pub(crate) fn first_party(condition: &str) -> Self {
        Self {
            id: condition.as_bytes().to_vec(),
            verification_id: None,
            location: None,
        }
    }

    pub(crate) fn third_party(id: Vec<u8>, verification_id: Vec<u8>, location: String) -> Self {
        Self {
            id,
            verification_id: Some(verification_id),
            location: Some(location),
        }
    }

    pub(crate) fn from_parts(
        id: Vec<u8>,
        verification_id: Option<Vec<u8>>,
        location: Option<String>,
    ) -> Self {
        Self {
            id,
            verification_id,
            location,
        }
    }

    /// The caveat identifier. For a first-party caveat this is the UTF-8
    /// condition; for a third-party caveat it is the opaque blob the
    /// authority decodes, and the identifier of the discharge that satisfies
    /// it.
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// The sealed caveat root key, present only on third-party caveats.
    pub fn verification_id(&self) -> Option<&[u8]> {
        self.verification_id.as_deref()
    }

    /// The discharging authority, present only on third-party caveats.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// The kind of this caveat.
    pub fn kind(&self) -> CaveatKind {
        if self.verification_id.is_some() {
            CaveatKind::ThirdParty
        } else {
            CaveatKind::FirstParty
        }
    }

    /// Shorthand for `kind() == CaveatKind::ThirdParty`.
    pub fn is_third_party(&self) -> bool {
        self.kind() == CaveatKind::ThirdParty
    }

    /// The condition of a first-party caveat.
    ///
    /// Returns `None` for third-party caveats, whose condition is only
    /// readable by the authority.
    pub fn condition(&self) -> Option<&str> {
        match self.kind() {
            CaveatKind::FirstParty => std::str::from_utf8(&self.id).ok(),
            CaveatKind::ThirdParty => None,
        }
    }
}

impl Debug for Caveat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            CaveatKind::FirstParty => f
                .debug_tuple("FirstParty")
                .field(&printable(&self.id))
                .finish(),
            CaveatKind::ThirdParty => f
                .debug_struct("ThirdParty")
                .field("id", &printable(&self.id))
                .field("location", &self.location)
                .finish_non_exhaustive(),
        }
    }
}

/// Human-readable rendering of an identifier: the text itself when it is
/// UTF-8, base64url otherwise.
pub(crate) fn printable(id: &[u8]) -> String {
    match std::str::from_utf8(id) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(id),
    }
}
