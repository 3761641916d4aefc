use nonempty::NonEmpty;

use crate::{Caveat, Macaroon, MacaroonError, ObjectIdError, VerificationError, condition};

/// A primary token followed by the discharges bound to it.
///
/// This is the unit a capability holder stores and hands on; its wire form is
/// a JSON array of tokens, primary first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain(NonEmpty<Macaroon>);

impl Chain {
    /// A chain holding only `primary`.
    pub fn new(primary: Macaroon) -> Self {
        Self(NonEmpty::new(primary))
    }

    /// Build a chain from tokens in wire order.
    ///
    /// # Errors
    ///
    /// Fails with [`MacaroonError::EmptyChain`] when `tokens` is empty.
    pub fn from_tokens(tokens: Vec<Macaroon>) -> Result<Self, MacaroonError> {
        NonEmpty::from_vec(tokens)
            .map(Self)
            .ok_or(MacaroonError::EmptyChain)
    }

    /// Decode the wire form of a chain.
    ///
    /// # Errors
    ///
    /// Fails when `bytes` is not a JSON array of well-formed tokens, or when
    /// the array is empty.
    pub fn parse(bytes: &[u8]) -> Result<Self, MacaroonError> {
        let tokens: Vec<Macaroon> = serde_json::from_slice(bytes)
            .map_err(|error| MacaroonError::Decode(error.to_string()))?;
        Self::from_tokens(tokens)
    }

    /// Encode this chain in its wire form. `parse(to_bytes(chain)) == chain`.
    ///
    /// # Errors
    ///
    /// Fails only if JSON serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MacaroonError> {
        let tokens: Vec<&Macaroon> = self.tokens().collect();
        serde_json::to_vec(&tokens).map_err(|error| MacaroonError::Encode(error.to_string()))
    }

    /// The token every discharge is bound to.
    pub fn primary(&self) -> &Macaroon {
        &self.0.head
    }

    /// Discharges carried with the primary.
    pub fn discharges(&self) -> &[Macaroon] {
        &self.0.tail
    }

    /// All tokens in wire order.
    pub fn tokens(&self) -> impl Iterator<Item = &Macaroon> {
        self.0.iter()
    }

    /// Number of tokens, primary included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; a chain holds at least its primary.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The single object this chain refers to.
    ///
    /// Every first-party caveat of every token is scanned; repeated `object`
    /// caveats are fine as long as they agree.
    ///
    /// # Errors
    ///
    /// [`ObjectIdError::NotFound`] when no token carries an `object` caveat,
    /// [`ObjectIdError::Conflicting`] when two of them differ.
    pub fn object_id(&self) -> Result<String, ObjectIdError> {
        let mut found: Option<&str> = None;

        for token in self.tokens() {
            for condition in token.first_party_conditions() {
                let Some((condition::OBJECT, object_id)) = condition::parse(condition) else {
                    continue;
                };
                if object_id.is_empty() {
                    continue;
                }
                match found {
                    None => found = Some(object_id),
                    Some(previous) if previous == object_id => {}
                    Some(previous) => {
                        return Err(ObjectIdError::Conflicting {
                            first: previous.to_string(),
                            second: object_id.to_string(),
                        });
                    }
                }
            }
        }

        found.map(str::to_string).ok_or(ObjectIdError::NotFound)
    }

    /// Third-party caveats, on any token, that no discharge in this chain
    /// answers yet.
    pub fn undischarged(&self) -> Vec<&Caveat> {
        self.tokens()
            .flat_map(Macaroon::third_party_caveats)
            .filter(|caveat| {
                !self
                    .discharges()
                    .iter()
                    .any(|discharge| discharge.identifier() == caveat.id())
            })
            .collect()
    }

    /// `true` when every third-party caveat has a discharge.
    pub fn is_discharged(&self) -> bool {
        self.undischarged().is_empty()
    }

    /// A new chain with `discharges` bound to the primary and appended.
    pub fn with_discharges(&self, discharges: impl IntoIterator<Item = Macaroon>) -> Self {
        let mut next = self.clone();
        for discharge in discharges {
            let bound = self.primary().bind(&discharge);
            next.0.push(bound);
        }
        next
    }

    /// A new chain whose primary is `primary`.
    ///
    /// Discharges bound to the previous primary would no longer verify, so
    /// they are not carried over.
    pub fn with_primary(&self, primary: Macaroon) -> Self {
        Self::new(primary)
    }

    /// Verify the whole chain against the primary's root key.
    ///
    /// # Errors
    ///
    /// See [`Macaroon::verify`].
    pub fn verify<C>(&self, root_key: &[u8], checker: C) -> Result<(), VerificationError>
    where
        C: Fn(&str) -> Result<(), String>,
    {
        self.primary().verify(root_key, checker, self.discharges())
    }
}

impl From<Macaroon> for Chain {
    fn from(primary: Macaroon) -> Self {
        Self::new(primary)
    }
}
