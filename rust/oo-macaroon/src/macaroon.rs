use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

use crate::{
    Caveat, MacaroonError, VerificationError,
    caveat::printable,
    crypto::{self, CAVEAT_KEY_LENGTH, Signature},
    verify::Verification,
    wire::MacaroonWire,
};

/// A signed, caveat-bearing capability token.
///
/// Tokens are immutable: every `add_*` method returns a new token whose
/// caveats are a superset of the original's.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MacaroonWire", into = "MacaroonWire")]
pub struct Macaroon {
    location: String,
    identifier: Vec<u8>,
    caveats: Vec<Caveat>,
    signature: Signature,
}

impl Macaroon {
    /// Mint a new token under `root_key`.
    pub fn new(
        root_key: &[u8],
        identifier: impl Into<Vec<u8>>,
        location: impl Into<String>,
    ) -> Self {
        let identifier = identifier.into();
        let key = crypto::derive_root_key(root_key);
        let signature = crypto::chain(&key, &[&identifier]);

        Self {
            location: location.into(),
            identifier,
            caveats: Vec::new(),
            signature,
        }
    }

    pub(crate) fn from_parts(
        location: String,
        identifier: Vec<u8>,
        caveats: Vec<Caveat>,
        signature: Signature,
    ) -> Self {
        Self {
            location,
            identifier,
            caveats,
            signature,
        }
    }

    /// Where the token was minted.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The token identifier. For a discharge, this equals the id of the
    /// caveat it discharges.
    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    /// Caveats in the order they were added.
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    /// The current chain signature.
    pub fn signature(&self) -> &[u8; crypto::SIGNATURE_LENGTH] {
        &self.signature
    }

    /// Conditions of every first-party caveat.
    pub fn first_party_conditions(&self) -> impl Iterator<Item = &str> {
        self.caveats.iter().filter_map(Caveat::condition)
    }

    /// Every third-party caveat.
    pub fn third_party_caveats(&self) -> impl Iterator<Item = &Caveat> {
        self.caveats.iter().filter(|caveat| caveat.is_third_party())
    }

    /// Return a copy of this token restricted by a first-party `condition`.
    pub fn add_first_party_caveat(&self, condition: &str) -> Self {
        let caveat = Caveat::first_party(condition);
        let signature = crypto::chain(&self.signature, &[caveat.id()]);

        let mut next = self.clone();
        next.caveats.push(caveat);
        next.signature = signature;
        next
    }

    /// Return a copy of this token that additionally requires a discharge
    /// from the authority at `location`.
    ///
    /// `caveat_key` is the root key the authority will mint the discharge
    /// under; it must be recoverable by that authority from `caveat_id`.
    ///
    /// # Errors
    ///
    /// Fails if randomness for sealing `caveat_key` is unavailable.
    pub fn add_third_party_caveat(
        &self,
        caveat_key: &[u8; CAVEAT_KEY_LENGTH],
        caveat_id: impl Into<Vec<u8>>,
        location: impl Into<String>,
    ) -> Result<Self, MacaroonError> {
        let caveat_id = caveat_id.into();
        let verification_id = crypto::seal_key(&self.signature, caveat_key)?;
        let signature = crypto::chain(&self.signature, &[&verification_id, &caveat_id]);

        let mut next = self.clone();
        next.caveats
            .push(Caveat::third_party(caveat_id, verification_id, location.into()));
        next.signature = signature;
        Ok(next)
    }

    /// Bind `discharge` to this token so it can only be used alongside it.
    pub fn bind(&self, discharge: &Macaroon) -> Macaroon {
        let mut bound = discharge.clone();
        bound.signature = crypto::bind(&self.signature, &discharge.signature);
        bound
    }

    /// Verify this token as the primary of a chain.
    ///
    /// `checker` is consulted for every first-party condition, of this token
    /// and of every discharge. Each third-party caveat must be satisfied by
    /// exactly one of `discharges`, bound to this token; every discharge must
    /// be used.
    ///
    /// # Errors
    ///
    /// Returns the first [`VerificationError`] encountered.
    pub fn verify<C>(
        &self,
        root_key: &[u8],
        checker: C,
        discharges: &[Macaroon],
    ) -> Result<(), VerificationError>
    where
        C: Fn(&str) -> Result<(), String>,
    {
        Verification::new(self, &checker, discharges).run(root_key)
    }
}

impl Debug for Macaroon {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Macaroon")
            .field("location", &self.location)
            .field("identifier", &printable(&self.identifier))
            .field("caveats", &self.caveats)
            .finish_non_exhaustive()
    }
}
