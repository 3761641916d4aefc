//! JSON wire form of tokens.
//!
//! ```text
//! {
//!   "location": "https://store.example",
//!   "identifier": "<base64url>",
//!   "caveats": [
//!     { "cid": "object=01J9ZQ" },
//!     { "cid": "<base64url>", "vid": "<base64url>", "cl": "client:encrypt" }
//!   ],
//!   "signature": "<base64url>"
//! }
//! ```
//!
//! First-party caveat ids are written as plain text; everything else binary
//! is unpadded base64url.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::{Caveat, Macaroon, MacaroonError, crypto::SIGNATURE_LENGTH};

#[derive(Serialize, Deserialize)]
pub(crate) struct CaveatWire {
    cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cl: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct MacaroonWire {
    location: String,
    identifier: String,
    caveats: Vec<CaveatWire>,
    signature: String,
}

fn decode(field: &str, text: &str) -> Result<Vec<u8>, MacaroonError> {
    URL_SAFE_NO_PAD
        .decode(text)
        .map_err(|error| MacaroonError::Decode(format!("invalid {field}: {error}")))
}

impl From<Macaroon> for MacaroonWire {
    fn from(macaroon: Macaroon) -> Self {
        let caveats = macaroon
            .caveats()
            .iter()
            .map(|caveat| match (caveat.condition(), caveat.verification_id()) {
                (Some(condition), None) => CaveatWire {
                    cid: condition.to_string(),
                    vid: None,
                    cl: None,
                },
                (_, verification_id) => CaveatWire {
                    cid: URL_SAFE_NO_PAD.encode(caveat.id()),
                    vid: verification_id.map(|vid| URL_SAFE_NO_PAD.encode(vid)),
                    cl: caveat.location().map(str::to_string),
                },
            })
            .collect();

        Self {
            location: macaroon.location().to_string(),
            identifier: URL_SAFE_NO_PAD.encode(macaroon.identifier()),
            caveats,
            signature: URL_SAFE_NO_PAD.encode(macaroon.signature()),
        }
    }
}

impl TryFrom<MacaroonWire> for Macaroon {
    type Error = MacaroonError;

    fn try_from(wire: MacaroonWire) -> Result<Self, Self::Error> {
        let identifier = decode("identifier", &wire.identifier)?;

        let signature: [u8; SIGNATURE_LENGTH] = decode("signature", &wire.signature)?
            .try_into()
            .map_err(|bytes: Vec<u8>| {
                MacaroonError::Decode(format!(
                    "expected {SIGNATURE_LENGTH} signature bytes, got {}",
                    bytes.len()
                ))
            })?;

        let caveats = wire
            .caveats
            .into_iter()
            .map(|caveat| match caveat.vid {
                None if caveat.cl.is_none() => {
                    Ok(Caveat::from_parts(caveat.cid.into_bytes(), None, None))
                }
                None => Err(MacaroonError::Decode(
                    "caveat has a location but no verification id".into(),
                )),
                Some(vid) => {
                    let location = caveat.cl.ok_or_else(|| {
                        MacaroonError::Decode(
                            "third-party caveat is missing its location".into(),
                        )
                    })?;
                    Ok(Caveat::from_parts(
                        decode("caveat id", &caveat.cid)?,
                        Some(decode("verification id", &vid)?),
                        Some(location),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Macaroon::from_parts(
            wire.location,
            identifier,
            caveats,
            signature,
        ))
    }
}
