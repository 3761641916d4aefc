//! Capabilities that third-party authorities must vouch for before the store
//! accepts them.

use std::sync::Arc;

use async_trait::async_trait;
use oo_client::{
    Client, Discharge, Discharger, MemoryObjectStore, OoClientError, ResolutionMode,
    ThirdPartyCaveatInfo,
};
use oo_credentials::{KeyManager, KeyPair};
use oo_macaroon::Caveat;
use pretty_assertions::assert_eq;

/// Discharges caveats sealed to it whose condition it agrees with.
struct Authority {
    location: &'static str,
    key_pair: KeyPair,
    accepts: &'static str,
}

impl Authority {
    fn new(location: &'static str, seed: u8, accepts: &'static str) -> Arc<Self> {
        Arc::new(Self {
            location,
            key_pair: KeyPair::from_seed(&[seed; 32]),
            accepts,
        })
    }

    fn denied(&self, reason: impl Into<String>) -> OoClientError {
        OoClientError::RemoteDischargeFailed {
            location: self.location.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Discharger for Authority {
    async fn discharge(&self, caveat: &Caveat) -> Result<Discharge, OoClientError> {
        let info = ThirdPartyCaveatInfo::open(&self.key_pair, caveat.id())
            .map_err(|error| self.denied(error.to_string()))?;
        if info.condition() != self.accepts {
            return Err(self.denied(format!("{:?} does not hold", info.condition())));
        }
        Ok(Discharge::from(info.discharge(caveat.id(), self.location)))
    }
}

const AUTH: &str = "https://auth.example";
const AUDIT: &str = "https://audit.example";

fn client(home: &std::path::Path, mode: ResolutionMode) -> Client<MemoryObjectStore> {
    Client::new(MemoryObjectStore::default(), KeyManager::new(home))
        .with_discharger(AUTH, Authority::new(AUTH, 1, "user-is alice"))
        .with_discharger(AUDIT, Authority::new(AUDIT, 2, "logged"))
        .with_resolution(mode)
}

#[tokio::test]
async fn it_resolves_independent_caveats_in_any_order() -> anyhow::Result<()> {
    let auth = KeyPair::from_seed(&[1; 32]).public_key();
    let audit = KeyPair::from_seed(&[2; 32]).public_key();

    for mode in [ResolutionMode::Sequential, ResolutionMode::Concurrent] {
        let home = tempfile::tempdir()?;
        let client = client(home.path(), mode);
        let issued = client.issue(b"hello world", None).await?;

        let auth_first = client.attenuate(&issued.chain, "user-is alice", Some(AUTH), Some(&auth))?;
        let auth_first = client.attenuate(&auth_first, "logged", Some(AUDIT), Some(&audit))?;

        let audit_first = client.attenuate(&issued.chain, "logged", Some(AUDIT), Some(&audit))?;
        let audit_first =
            client.attenuate(&audit_first, "user-is alice", Some(AUTH), Some(&auth))?;

        for chain in [&auth_first, &audit_first] {
            assert_eq!(chain.undischarged().len(), 3);

            let resolution = client.resolve(chain).await?;
            assert!(resolution.chain.is_discharged());
            assert_eq!(resolution.chain.discharges().len(), 3);
            assert!(resolution.envelope.is_some());

            assert_eq!(client.resolve_and_fetch(chain).await?, b"hello world");
        }
    }
    Ok(())
}

#[tokio::test]
async fn it_surfaces_a_denied_discharge() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let client = client(home.path(), ResolutionMode::Sequential);
    let auth = KeyPair::from_seed(&[1; 32]).public_key();

    let issued = client.issue(b"hello world", None).await?;
    let chain = client.attenuate(&issued.chain, "user-is mallory", Some(AUTH), Some(&auth))?;

    match client.resolve_and_fetch(&chain).await {
        Err(OoClientError::RemoteDischargeFailed { location, .. }) => assert_eq!(location, AUTH),
        other => panic!("expected a denied discharge, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn it_requires_the_authority_key_for_third_party_caveats() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let client = client(home.path(), ResolutionMode::Sequential);
    let issued = client.issue(b"hello world", None).await?;

    let result = client.attenuate(&issued.chain, "user-is alice", Some(AUTH), None);
    assert!(matches!(
        result,
        Err(OoClientError::MissingAuthorityKey(location)) if location == AUTH
    ));
    Ok(())
}

#[tokio::test]
async fn it_skips_discharge_for_plain_capabilities() -> anyhow::Result<()> {
    use oo_client::ObjectStore;

    let home = tempfile::tempdir()?;
    let client = client(home.path(), ResolutionMode::Concurrent);
    let chain = client.store().create(b"plain".to_vec(), None).await?;

    let resolution = client.resolve(&chain).await?;
    assert_eq!(resolution.chain, chain);
    assert!(resolution.envelope.is_none());

    // No self-discharge was needed, so no key pair was created either.
    assert!(KeyManager::new(home.path()).load().await?.is_none());
    Ok(())
}
