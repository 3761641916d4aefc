use oo_envelope::Envelope;
use oo_macaroon::Macaroon;

use super::Discharge;
use crate::OoClientError;

/// Collects discharges as they are produced.
///
/// This is the single merge point for a resolution. Sequential resolution
/// owns it directly; concurrent resolution wraps it in a mutex.
#[derive(Debug, Default)]
pub struct DischargeAccumulator {
    discharges: Vec<Macaroon>,
    envelope: Option<Envelope>,
}

impl DischargeAccumulator {
    /// Record `discharge`.
    ///
    /// # Errors
    ///
    /// [`OoClientError::SelfDischargeFailed`] when it carries an envelope
    /// that differs from one already recovered.
    pub fn merge(&mut self, discharge: Discharge) -> Result<(), OoClientError> {
        let Discharge { macaroon, envelope } = discharge;

        if let Some(envelope) = envelope {
            self.merge_envelope(envelope)?;
        }

        self.discharges.push(macaroon);
        Ok(())
    }

    /// Record an envelope recovered from a caveat the chain already carries
    /// a discharge for.
    ///
    /// # Errors
    ///
    /// [`OoClientError::SelfDischargeFailed`] when it differs from one
    /// already recovered.
    pub fn merge_envelope(&mut self, envelope: Envelope) -> Result<(), OoClientError> {
        match &self.envelope {
            None => self.envelope = Some(envelope),
            Some(existing) if *existing == envelope => {}
            Some(_) => {
                return Err(OoClientError::SelfDischargeFailed(
                    "capability carries more than one envelope".into(),
                ));
            }
        }
        Ok(())
    }

    /// Take the discharges merged since the last call.
    pub fn take_discharges(&mut self) -> Vec<Macaroon> {
        std::mem::take(&mut self.discharges)
    }

    /// The recovered envelope, if any.
    pub fn into_envelope(self) -> Option<Envelope> {
        self.envelope
    }
}
