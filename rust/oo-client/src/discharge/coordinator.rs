use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use oo_envelope::Envelope;
use oo_macaroon::{Caveat, Chain, Macaroon};
use parking_lot::Mutex;

use super::{
    Discharge, DischargeAccumulator, DischargeState, Discharger, ResolutionMode, SELF_LOCATION,
};
use crate::OoClientError;

/// Discharges may carry third-party caveats of their own; resolution gives
/// up after this many rounds.
const MAX_ROUNDS: usize = 8;

/// A fully discharged chain and the envelope recovered on the way.
#[derive(Debug)]
pub struct Resolution {
    /// The chain with every third-party caveat discharged
    pub chain: Chain,
    /// The object's envelope, when the chain carried a self-discharged caveat
    pub envelope: Option<Envelope>,
}

/// Routes third-party caveats to their dischargers and binds the results.
pub struct DischargeCoordinator {
    routes: HashMap<String, Arc<dyn Discharger>>,
    fallback: Arc<dyn Discharger>,
    mode: ResolutionMode,
}

impl DischargeCoordinator {
    /// Caveats at [`SELF_LOCATION`] go to `self_discharger`, every other
    /// location to `fallback`.
    pub fn new(self_discharger: Arc<dyn Discharger>, fallback: Arc<dyn Discharger>) -> Self {
        let mut routes = HashMap::new();
        routes.insert(SELF_LOCATION.to_string(), self_discharger);
        Self {
            routes,
            fallback,
            mode: ResolutionMode::default(),
        }
    }

    /// Send caveats at `location` to `discharger`.
    pub fn with_discharger(
        mut self,
        location: impl Into<String>,
        discharger: Arc<dyn Discharger>,
    ) -> Self {
        self.routes.insert(location.into(), discharger);
        self
    }

    /// Set how the caveats of one round are discharged.
    pub fn with_mode(mut self, mode: ResolutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// The configured resolution mode.
    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    fn discharger_for(&self, location: &str) -> &Arc<dyn Discharger> {
        self.routes.get(location).unwrap_or(&self.fallback)
    }

    async fn discharge(&self, caveat: &Caveat) -> Result<Discharge, OoClientError> {
        let location = caveat.location().unwrap_or_default();
        let discharge = self.discharger_for(location).discharge(caveat).await?;

        if discharge.macaroon.identifier() != caveat.id() {
            let reason = "discharge identifier does not match the caveat".to_string();
            return Err(if location == SELF_LOCATION {
                OoClientError::SelfDischargeFailed(reason)
            } else {
                OoClientError::RemoteDischargeFailed {
                    location: location.to_string(),
                    reason,
                }
            });
        }
        Ok(discharge)
    }

    fn exhausted(location: &str) -> OoClientError {
        let reason = format!("caveats still pending after {MAX_ROUNDS} rounds");
        if location == SELF_LOCATION {
            OoClientError::SelfDischargeFailed(reason)
        } else {
            OoClientError::RemoteDischargeFailed {
                location: location.to_string(),
                reason,
            }
        }
    }

    /// Recover the envelopes behind [`SELF_LOCATION`] caveats that `chain`
    /// already carries discharges for.
    async fn recover_discharged(
        &self,
        chain: &Chain,
        accumulator: &mut DischargeAccumulator,
    ) -> Result<(), OoClientError> {
        let pending = chain.undischarged();
        let discharged: Vec<&Caveat> = chain
            .tokens()
            .flat_map(Macaroon::third_party_caveats)
            .filter(|caveat| caveat.location() == Some(SELF_LOCATION))
            .filter(|caveat| !pending.iter().any(|other| other.id() == caveat.id()))
            .collect();

        for caveat in discharged {
            if let Some(envelope) = self.discharge(caveat).await?.envelope {
                accumulator.merge_envelope(envelope)?;
            }
        }
        Ok(())
    }

    /// Discharge every third-party caveat in `chain`.
    ///
    /// Each round collects the caveats still lacking a discharge, asks their
    /// dischargers, then binds the new discharges to the primary. Rounds
    /// repeat until nothing is pending, so caveats introduced by discharges
    /// are answered too.
    ///
    /// Caveats at [`SELF_LOCATION`] that are already discharged are opened
    /// again so their envelope is still recovered.
    ///
    /// # Errors
    ///
    /// The first discharger failure, or [`OoClientError::SelfDischargeFailed`]
    /// when the chain carries conflicting envelopes.
    pub async fn resolve(&self, chain: &Chain) -> Result<Resolution, OoClientError> {
        self.resolve_rounds(chain).await.inspect_err(|error| {
            tracing::warn!(state = ?DischargeState::Failed, %error, "discharge failed");
        })
    }

    async fn resolve_rounds(&self, chain: &Chain) -> Result<Resolution, OoClientError> {
        let mut chain = chain.clone();
        let mut accumulator = DischargeAccumulator::default();
        self.recover_discharged(&chain, &mut accumulator).await?;

        for round in 0..MAX_ROUNDS {
            let pending: Vec<Caveat> = chain.undischarged().into_iter().cloned().collect();
            if pending.is_empty() {
                tracing::debug!(state = ?DischargeState::Discharged, tokens = chain.len());
                return Ok(Resolution {
                    chain,
                    envelope: accumulator.into_envelope(),
                });
            }

            tracing::debug!(state = ?DischargeState::Pending, round, pending = pending.len());
            tracing::debug!(state = ?DischargeState::Resolving, mode = ?self.mode);

            match self.mode {
                ResolutionMode::Sequential => {
                    for caveat in &pending {
                        accumulator.merge(self.discharge(caveat).await?)?;
                    }
                }
                ResolutionMode::Concurrent => {
                    let shared = Mutex::new(std::mem::take(&mut accumulator));
                    try_join_all(pending.iter().map(|caveat| {
                        let shared = &shared;
                        async move {
                            let discharge = self.discharge(caveat).await?;
                            shared.lock().merge(discharge)
                        }
                    }))
                    .await?;
                    accumulator = shared.into_inner();
                }
            }

            chain = chain.with_discharges(accumulator.take_discharges());
        }

        let undischarged = chain.undischarged();
        let location = undischarged
            .first()
            .and_then(|caveat| caveat.location())
            .unwrap_or_default();
        Err(Self::exhausted(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SelfDischarger, ThirdPartyCaveatInfo, envelope_condition};
    use async_trait::async_trait;
    use oo_credentials::KeyPair;
    use oo_macaroon::Macaroon;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ROOT_KEY: &[u8] = b"store root key";

    /// An authority that discharges whatever is sealed to it, optionally
    /// adding a caveat of its own.
    struct Authority {
        key_pair: KeyPair,
        location: String,
        calls: AtomicUsize,
        adds: Option<(KeyPair, String)>,
    }

    impl Authority {
        fn new(seed: u8, location: &str) -> Self {
            Self {
                key_pair: KeyPair::from_seed(&[seed; 32]),
                location: location.to_string(),
                calls: AtomicUsize::new(0),
                adds: None,
            }
        }
    }

    #[async_trait]
    impl Discharger for Authority {
        async fn discharge(&self, caveat: &Caveat) -> Result<Discharge, OoClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let info = ThirdPartyCaveatInfo::open(&self.key_pair, caveat.id()).map_err(|error| {
                OoClientError::RemoteDischargeFailed {
                    location: self.location.clone(),
                    reason: error.to_string(),
                }
            })?;
            let mut discharge = info.discharge(caveat.id(), &self.location);
            if let Some((next, location)) = &self.adds {
                discharge = ThirdPartyCaveatInfo::new("again")?.add_to(
                    &discharge,
                    &next.public_key(),
                    location,
                )?;
            }
            Ok(Discharge::from(discharge))
        }
    }

    /// Answers every caveat with an unrelated token.
    struct Impostor;

    #[async_trait]
    impl Discharger for Impostor {
        async fn discharge(&self, _caveat: &Caveat) -> Result<Discharge, OoClientError> {
            Ok(Discharge::from(Macaroon::new(b"other", "other", "other")))
        }
    }

    fn primary() -> Macaroon {
        Macaroon::new(ROOT_KEY, "01J9ZQ", "memory:").add_first_party_caveat("object=01J9ZQ")
    }

    #[tokio::test]
    async fn it_leaves_chains_without_caveats_alone() -> anyhow::Result<()> {
        let fallback = Arc::new(Authority::new(1, "https://auth.example"));
        let coordinator = DischargeCoordinator::new(fallback.clone(), fallback.clone());

        let chain = Chain::new(primary());
        let resolution = coordinator.resolve(&chain).await?;

        assert_eq!(resolution.chain, chain);
        assert!(resolution.envelope.is_none());
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn it_discharges_self_and_remote_caveats_in_either_mode() -> anyhow::Result<()> {
        let owner = KeyPair::from_seed(&[9; 32]);
        let authority = Arc::new(Authority::new(2, "https://auth.example"));

        let mut envelope = Envelope::generate()?;
        let ciphertext = envelope.seal(b"hello world")?;
        let token = ThirdPartyCaveatInfo::new(envelope_condition(&envelope).as_str())?.add_to(
            &primary(),
            &owner.public_key(),
            SELF_LOCATION,
        )?;
        let token = ThirdPartyCaveatInfo::new("user-is alice")?.add_to(
            &token,
            &authority.key_pair.public_key(),
            "https://auth.example",
        )?;
        let chain = Chain::new(token);

        for mode in [ResolutionMode::Sequential, ResolutionMode::Concurrent] {
            let coordinator = DischargeCoordinator::new(
                Arc::new(SelfDischarger::with_key_pair(owner.clone())),
                Arc::new(Impostor),
            )
            .with_discharger("https://auth.example", authority.clone())
            .with_mode(mode);

            let resolution = coordinator.resolve(&chain).await?;

            assert_eq!(resolution.chain.len(), 3);
            assert!(resolution.chain.is_discharged());
            resolution.chain.verify(ROOT_KEY, |_| Ok(()))?;
            let recovered = resolution.envelope.expect("envelope recovered");
            assert_eq!(recovered.open(&ciphertext)?, b"hello world");
        }
        Ok(())
    }

    #[tokio::test]
    async fn it_recovers_envelopes_from_discharged_chains() -> anyhow::Result<()> {
        let owner = KeyPair::from_seed(&[9; 32]);
        let mut envelope = Envelope::generate()?;
        let ciphertext = envelope.seal(b"hello world")?;
        let token = ThirdPartyCaveatInfo::new(envelope_condition(&envelope).as_str())?.add_to(
            &primary(),
            &owner.public_key(),
            SELF_LOCATION,
        )?;

        for mode in [ResolutionMode::Sequential, ResolutionMode::Concurrent] {
            let coordinator = DischargeCoordinator::new(
                Arc::new(SelfDischarger::with_key_pair(owner.clone())),
                Arc::new(Impostor),
            )
            .with_mode(mode);

            let resolved = coordinator.resolve(&Chain::new(token.clone())).await?.chain;
            let reparsed = Chain::parse(&resolved.to_bytes()?)?;
            let again = coordinator.resolve(&reparsed).await?;

            assert_eq!(again.chain, reparsed);
            let recovered = again.envelope.expect("envelope recovered");
            assert_eq!(recovered.open(&ciphertext)?, b"hello world");
        }
        Ok(())
    }

    #[tokio::test]
    async fn it_refuses_discharged_chains_sealed_to_someone_else() -> anyhow::Result<()> {
        let owner = KeyPair::from_seed(&[9; 32]);
        let envelope = Envelope::generate()?;
        let token = ThirdPartyCaveatInfo::new(envelope_condition(&envelope).as_str())?.add_to(
            &primary(),
            &owner.public_key(),
            SELF_LOCATION,
        )?;
        let resolved = DischargeCoordinator::new(
            Arc::new(SelfDischarger::with_key_pair(owner)),
            Arc::new(Impostor),
        )
        .resolve(&Chain::new(token))
        .await?
        .chain;

        let stranger = DischargeCoordinator::new(
            Arc::new(SelfDischarger::with_key_pair(KeyPair::from_seed(&[10; 32]))),
            Arc::new(Impostor),
        );

        assert!(matches!(
            stranger.resolve(&resolved).await,
            Err(OoClientError::SelfDischargeFailed(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn it_gives_up_on_endless_self_caveats() -> anyhow::Result<()> {
        let mut looping = Authority::new(11, SELF_LOCATION);
        looping.adds = Some((looping.key_pair.clone(), SELF_LOCATION.to_string()));
        let looping = Arc::new(looping);

        let token = ThirdPartyCaveatInfo::new("again")?.add_to(
            &primary(),
            &looping.key_pair.public_key(),
            SELF_LOCATION,
        )?;
        let coordinator = DischargeCoordinator::new(looping.clone(), Arc::new(Impostor));

        assert!(matches!(
            coordinator.resolve(&Chain::new(token)).await,
            Err(OoClientError::SelfDischargeFailed(_))
        ));
        assert_eq!(looping.calls.load(Ordering::SeqCst), MAX_ROUNDS);
        Ok(())
    }

    #[tokio::test]
    async fn it_gives_up_on_endless_remote_caveats() -> anyhow::Result<()> {
        let mut looping = Authority::new(12, "https://auth.example");
        looping.adds = Some((looping.key_pair.clone(), "https://auth.example".to_string()));
        let looping = Arc::new(looping);

        let token = ThirdPartyCaveatInfo::new("again")?.add_to(
            &primary(),
            &looping.key_pair.public_key(),
            "https://auth.example",
        )?;
        let coordinator = DischargeCoordinator::new(Arc::new(Impostor), looping);

        assert!(matches!(
            coordinator.resolve(&Chain::new(token)).await,
            Err(OoClientError::RemoteDischargeFailed { location, .. })
                if location == "https://auth.example"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn it_discharges_caveats_added_by_discharges() -> anyhow::Result<()> {
        let second = Arc::new(Authority::new(4, "https://second.example"));
        let mut first = Authority::new(3, "https://first.example");
        first.adds = Some((second.key_pair.clone(), "https://second.example".into()));
        let first = Arc::new(first);

        let token = ThirdPartyCaveatInfo::new("user-is alice")?.add_to(
            &primary(),
            &first.key_pair.public_key(),
            "https://first.example",
        )?;

        let coordinator = DischargeCoordinator::new(Arc::new(Impostor), Arc::new(Impostor))
            .with_discharger("https://first.example", first.clone())
            .with_discharger("https://second.example", second.clone());
        let resolution = coordinator.resolve(&Chain::new(token)).await?;

        assert_eq!(resolution.chain.len(), 3);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        resolution.chain.verify(ROOT_KEY, |_| Ok(()))?;
        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_discharges_for_other_caveats() -> anyhow::Result<()> {
        let authority = KeyPair::from_seed(&[5; 32]);
        let token = ThirdPartyCaveatInfo::new("user-is alice")?.add_to(
            &primary(),
            &authority.public_key(),
            "https://auth.example",
        )?;

        let coordinator = DischargeCoordinator::new(Arc::new(Impostor), Arc::new(Impostor));
        let result = coordinator.resolve(&Chain::new(token)).await;

        assert!(matches!(
            result,
            Err(OoClientError::RemoteDischargeFailed { location, .. })
                if location == "https://auth.example"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn it_propagates_discharger_failures() -> anyhow::Result<()> {
        let token = ThirdPartyCaveatInfo::new("user-is alice")?.add_to(
            &primary(),
            &KeyPair::from_seed(&[6; 32]).public_key(),
            "https://auth.example",
        )?;

        // Sealed to seed 6, so an authority holding seed 7 cannot open it.
        let wrong = Arc::new(Authority::new(7, "https://auth.example"));
        let coordinator = DischargeCoordinator::new(Arc::new(Impostor), wrong)
            .with_mode(ResolutionMode::Concurrent);

        assert!(matches!(
            coordinator.resolve(&Chain::new(token)).await,
            Err(OoClientError::RemoteDischargeFailed { .. })
        ));
        Ok(())
    }
}
