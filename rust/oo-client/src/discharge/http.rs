//! Remote discharge over HTTP
//!
//! - POST `{location}/discharge` with `{"id": "<base64url caveat id>"}` -
//!   answers 200 with `{"macaroon": <token>}`

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use oo_macaroon::{Caveat, Macaroon};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Discharge, Discharger};
use crate::{ClientConfig, OoClientError};

#[derive(Serialize)]
struct DischargeRequest {
    id: String,
}

#[derive(Deserialize)]
struct DischargeResponse {
    macaroon: Macaroon,
}

/// Asks the authority at a caveat's location for its discharge.
#[derive(Clone)]
pub struct HttpDischarger {
    client: Client,
}

impl HttpDischarger {
    /// Create a discharger using the timeout in `config`
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: config.http_client(),
        }
    }

    /// The discharge endpoint of an authority
    fn url_for_location(location: &str) -> String {
        format!("{}/discharge", location.trim_end_matches('/'))
    }
}

impl Default for HttpDischarger {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

#[async_trait]
impl Discharger for HttpDischarger {
    #[tracing::instrument(level = "debug", skip_all, fields(location = caveat.location().unwrap_or_default()))]
    async fn discharge(&self, caveat: &Caveat) -> Result<Discharge, OoClientError> {
        let location = caveat.location().unwrap_or_default();
        let failed = |reason: String| OoClientError::RemoteDischargeFailed {
            location: location.to_string(),
            reason,
        };

        let response = self
            .client
            .post(Self::url_for_location(location))
            .json(&DischargeRequest {
                id: URL_SAFE_NO_PAD.encode(caveat.id()),
            })
            .send()
            .await
            .map_err(|error| failed(format!("HTTP request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!(
                "HTTP {} - {}",
                status.as_u16(),
                match body.trim() {
                    "" => status.canonical_reason().unwrap_or("Unknown"),
                    text => text,
                }
            )));
        }

        let DischargeResponse { macaroon } = response
            .json()
            .await
            .map_err(|error| failed(format!("invalid discharge response: {error}")))?;

        Ok(Discharge::from(macaroon))
    }
}
