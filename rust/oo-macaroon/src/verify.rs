use crate::{
    Macaroon, VerificationError,
    caveat::printable,
    crypto::{self, Signature},
};

/// State of one chain verification: which discharges have been consumed.
pub(crate) struct Verification<'a, C> {
    primary: &'a Macaroon,
    checker: &'a C,
    discharges: &'a [Macaroon],
    used: Vec<bool>,
}

impl<'a, C> Verification<'a, C>
where
    C: Fn(&str) -> Result<(), String>,
{
    pub(crate) fn new(primary: &'a Macaroon, checker: &'a C, discharges: &'a [Macaroon]) -> Self {
        Self {
            primary,
            checker,
            discharges,
            used: vec![false; discharges.len()],
        }
    }

    pub(crate) fn run(mut self, root_key: &[u8]) -> Result<(), VerificationError> {
        let primary = self.primary;
        self.verify_token(primary, root_key, true)?;

        if let Some(index) = self.used.iter().position(|used| !used) {
            return Err(VerificationError::UnusedDischarge {
                identifier: printable(self.discharges[index].identifier()),
            });
        }

        Ok(())
    }

    fn verify_token(
        &mut self,
        token: &Macaroon,
        root_key: &[u8],
        is_primary: bool,
    ) -> Result<(), VerificationError> {
        let key = crypto::derive_root_key(root_key);
        let mut signature: Signature = crypto::chain(&key, &[token.identifier()]);

        for caveat in token.caveats() {
            match caveat.verification_id() {
                None => {
                    let condition = caveat.condition().ok_or_else(|| {
                        VerificationError::CaveatNotSatisfied {
                            condition: printable(caveat.id()),
                            reason: "condition is not valid UTF-8".into(),
                        }
                    })?;
                    (self.checker)(condition).map_err(|reason| {
                        VerificationError::CaveatNotSatisfied {
                            condition: condition.to_string(),
                            reason,
                        }
                    })?;
                    signature = crypto::chain(&signature, &[caveat.id()]);
                }
                Some(verification_id) => {
                    let location = caveat.location().unwrap_or_default().to_string();
                    let caveat_key = crypto::open_key(&signature, verification_id).ok_or_else(
                        || VerificationError::InvalidVerificationId {
                            location: location.clone(),
                        },
                    )?;

                    let discharges = self.discharges;
                    let index = discharges
                        .iter()
                        .enumerate()
                        .position(|(index, discharge)| {
                            !self.used[index] && discharge.identifier() == caveat.id()
                        })
                        .ok_or(VerificationError::MissingDischarge { location })?;
                    self.used[index] = true;

                    self.verify_token(&discharges[index], caveat_key.as_slice(), false)?;
                    signature = crypto::chain(&signature, &[verification_id, caveat.id()]);
                }
            }
        }

        let expected = if is_primary {
            signature
        } else {
            crypto::bind(self.primary.signature(), &signature)
        };

        if crypto::signatures_match(&expected, token.signature()) {
            Ok(())
        } else {
            Err(VerificationError::SignatureMismatch {
                identifier: printable(token.identifier()),
            })
        }
    }
}
