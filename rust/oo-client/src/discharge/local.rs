use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use oo_credentials::{KeyManager, KeyPair};
use oo_envelope::Envelope;
use oo_macaroon::Caveat;
use tokio::sync::OnceCell;
use zeroize::Zeroizing;

use super::{Discharge, Discharger, SELF_LOCATION};
use crate::{OoClientError, ThirdPartyCaveatInfo};

/// Text form of an envelope inside a self-discharge caveat condition.
pub fn envelope_condition(envelope: &Envelope) -> Zeroizing<String> {
    Zeroizing::new(URL_SAFE_NO_PAD.encode(envelope.to_bytes().as_slice()))
}

fn envelope_from_condition(condition: &str) -> Result<Envelope, OoClientError> {
    let bytes = Zeroizing::new(URL_SAFE_NO_PAD.decode(condition).map_err(|error| {
        OoClientError::SelfDischargeFailed(format!("envelope is not base64url: {error}"))
    })?);
    Envelope::from_bytes(&bytes)
        .map_err(|error| OoClientError::SelfDischargeFailed(error.to_string()))
}

/// Discharges caveats sealed to the principal's own key pair.
///
/// The key pair is loaded from the [`KeyManager`] the first time a caveat
/// needs it.
pub struct SelfDischarger {
    keys: Option<KeyManager>,
    key_pair: OnceCell<KeyPair>,
}

impl SelfDischarger {
    /// A discharger that loads (or creates) its key pair through `keys`.
    pub fn new(keys: KeyManager) -> Self {
        Self {
            keys: Some(keys),
            key_pair: OnceCell::new(),
        }
    }

    /// A discharger for an already loaded key pair.
    pub fn with_key_pair(key_pair: KeyPair) -> Self {
        Self {
            keys: None,
            key_pair: OnceCell::from(key_pair),
        }
    }

    /// The principal's key pair.
    ///
    /// # Errors
    ///
    /// [`OoClientError::KeyPersistence`] when it cannot be loaded or created.
    pub async fn key_pair(&self) -> Result<&KeyPair, OoClientError> {
        self.key_pair
            .get_or_try_init(|| async {
                match &self.keys {
                    Some(keys) => keys.load_or_create().await.map_err(OoClientError::from),
                    None => Err(OoClientError::SelfDischargeFailed(
                        "no key pair available".into(),
                    )),
                }
            })
            .await
    }
}

#[async_trait]
impl Discharger for SelfDischarger {
    #[tracing::instrument(level = "debug", skip_all, fields(location = SELF_LOCATION))]
    async fn discharge(&self, caveat: &Caveat) -> Result<Discharge, OoClientError> {
        let key_pair = self.key_pair().await?;

        let info = ThirdPartyCaveatInfo::open(key_pair, caveat.id()).map_err(|error| {
            OoClientError::SelfDischargeFailed(format!("cannot open caveat: {error}"))
        })?;
        let envelope = envelope_from_condition(info.condition())?;

        Ok(Discharge {
            macaroon: info.discharge(caveat.id(), SELF_LOCATION),
            envelope: Some(envelope),
        })
    }
}
