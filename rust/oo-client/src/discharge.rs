//! Turning third-party caveats into discharge tokens.
//!
//! Every third-party caveat names an authority by location. A
//! [`DischargeCoordinator`] routes each caveat to the [`Discharger`]
//! registered for its location: caveats at [`SELF_LOCATION`] are answered
//! locally by a [`SelfDischarger`], which also recovers the object's
//! [`Envelope`](oo_envelope::Envelope); everything else goes to a remote
//! authority such as an [`HttpDischarger`].

use async_trait::async_trait;
use oo_envelope::Envelope;
use oo_macaroon::{Caveat, Macaroon};

use crate::OoClientError;

mod accumulator;
pub use accumulator::*;

mod coordinator;
pub use coordinator::*;

mod http;
pub use http::*;

mod local;
pub use local::*;

/// Location of caveats that the principal discharges with its own key pair.
pub const SELF_LOCATION: &str = "client:encrypt";

/// A discharge token, plus the envelope recovered while producing it.
#[derive(Debug)]
pub struct Discharge {
    /// The (unbound) discharge token
    pub macaroon: Macaroon,
    /// Envelope carried by the caveat, for self-discharged caveats
    pub envelope: Option<Envelope>,
}

impl From<Macaroon> for Discharge {
    fn from(macaroon: Macaroon) -> Self {
        Self {
            macaroon,
            envelope: None,
        }
    }
}

/// An authority that can discharge third-party caveats.
#[async_trait]
pub trait Discharger: Send + Sync {
    /// Produce the discharge for `caveat`.
    ///
    /// The returned token's identifier must equal the caveat id.
    async fn discharge(&self, caveat: &Caveat) -> Result<Discharge, OoClientError>;
}

/// Progress of a chain through discharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DischargeState {
    /// Third-party caveats remain without a discharge
    Pending,
    /// Dischargers are being consulted
    Resolving,
    /// Every third-party caveat has a bound discharge
    Discharged,
    /// A discharger failed; the chain cannot be used
    Failed,
}

/// How independent caveats are discharged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionMode {
    /// One caveat after another
    #[default]
    Sequential,
    /// All pending caveats at once
    Concurrent,
}
