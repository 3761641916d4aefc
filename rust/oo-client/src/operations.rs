use std::sync::Arc;

use oo_credentials::{KeyManager, PublicKey};
use oo_envelope::Envelope;
use oo_macaroon::Chain;

use crate::{
    ClientConfig, DischargeCoordinator, Discharger, HttpDischarger, HttpObjectStore,
    ObjectStore, OoClientError, Resolution, ResolutionMode, SELF_LOCATION, SelfDischarger,
    ThirdPartyCaveatInfo, envelope_condition,
};

/// What [`Client::issue`] hands back.
#[derive(Debug)]
pub struct Issued {
    /// Capability for the new object, carrying its envelope caveat
    pub chain: Chain,
    /// The ciphertext the store persisted
    pub ciphertext: Vec<u8>,
}

/// A principal's view of an object store.
///
/// Content is encrypted before it leaves the client; the key travels only
/// inside the capability, sealed to the principal's own key pair.
pub struct Client<S> {
    store: S,
    self_discharger: Arc<SelfDischarger>,
    coordinator: DischargeCoordinator,
}

impl Client<HttpObjectStore> {
    /// A client for the HTTP store and key home described by `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_fallback(
            HttpObjectStore::new(config),
            KeyManager::new(config.home.clone()),
            Arc::new(HttpDischarger::new(config)),
        )
        .with_resolution(config.resolution)
    }
}

impl<S> Client<S>
where
    S: ObjectStore,
{
    /// A client for `store` whose key pair is managed by `keys`.
    ///
    /// Caveats at locations other than [`SELF_LOCATION`] are discharged over
    /// HTTP unless a discharger is registered for them.
    pub fn new(store: S, keys: KeyManager) -> Self {
        Self::with_fallback(store, keys, Arc::new(HttpDischarger::default()))
    }

    fn with_fallback(store: S, keys: KeyManager, fallback: Arc<dyn Discharger>) -> Self {
        let self_discharger = Arc::new(SelfDischarger::new(keys));
        Self {
            store,
            coordinator: DischargeCoordinator::new(self_discharger.clone(), fallback),
            self_discharger,
        }
    }

    /// Discharge caveats at `location` with `discharger`.
    pub fn with_discharger(
        mut self,
        location: impl Into<String>,
        discharger: Arc<dyn Discharger>,
    ) -> Self {
        self.coordinator = self.coordinator.with_discharger(location, discharger);
        self
    }

    /// Discharge independent caveats as `mode` says.
    pub fn with_resolution(mut self, mode: ResolutionMode) -> Self {
        self.coordinator = self.coordinator.with_mode(mode);
        self
    }

    /// The underlying object store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The principal's public key, creating the key pair on first use.
    pub async fn public_key(&self) -> Result<PublicKey, OoClientError> {
        Ok(self.self_discharger.key_pair().await?.public_key())
    }

    /// Encrypt `plaintext`, store the ciphertext and return a capability for
    /// it.
    ///
    /// The store's capability is extended with a caveat at
    /// [`SELF_LOCATION`], addressed to this principal, whose condition is
    /// the envelope.
    #[tracing::instrument(skip_all, fields(size = plaintext.len()))]
    pub async fn issue(
        &self,
        plaintext: &[u8],
        content_type: Option<&str>,
    ) -> Result<Issued, OoClientError> {
        let public_key = self.public_key().await?;

        let mut envelope = Envelope::generate()?;
        let ciphertext = envelope.seal(plaintext)?;

        let chain = self.store.create(ciphertext.clone(), content_type).await?;
        let primary = ThirdPartyCaveatInfo::new(envelope_condition(&envelope).as_str())?
            .add_to(chain.primary(), &public_key, SELF_LOCATION)?;
        let chain = chain.with_primary(primary);

        tracing::info!(object_id = ?chain.object_id().ok(), "issued capability");
        Ok(Issued { chain, ciphertext })
    }

    /// Restrict `chain` with `condition`.
    ///
    /// Without a `location` the condition is a first-party caveat the store
    /// checks. With one, it becomes a third-party caveat that the authority
    /// at `location` must discharge; `authority_key` is that authority's
    /// public key.
    ///
    /// Discharges already in `chain` are bound to the old primary and are
    /// dropped from the result.
    ///
    /// # Errors
    ///
    /// [`OoClientError::MissingAuthorityKey`] when a location is given
    /// without `authority_key`.
    pub fn attenuate(
        &self,
        chain: &Chain,
        condition: &str,
        location: Option<&str>,
        authority_key: Option<&PublicKey>,
    ) -> Result<Chain, OoClientError> {
        if !chain.discharges().is_empty() {
            tracing::warn!(
                dropped = chain.discharges().len(),
                "attenuation drops discharges bound to the previous primary"
            );
        }

        let primary = match location.filter(|location| !location.is_empty()) {
            None => chain.primary().add_first_party_caveat(condition),
            Some(location) => {
                let authority_key = authority_key
                    .ok_or_else(|| OoClientError::MissingAuthorityKey(location.to_string()))?;
                ThirdPartyCaveatInfo::new(condition)?.add_to(
                    chain.primary(),
                    authority_key,
                    location,
                )?
            }
        };

        tracing::debug!(?location, "attenuated capability");
        Ok(chain.with_primary(primary))
    }

    /// Discharge every third-party caveat in `chain`.
    pub async fn resolve(&self, chain: &Chain) -> Result<Resolution, OoClientError> {
        self.coordinator.resolve(chain).await
    }

    /// Resolve `chain`, fetch its object and decrypt it.
    ///
    /// The envelope is recovered whether or not `chain` already carries the
    /// discharge for its envelope caveat. Content of a chain without an
    /// envelope caveat is returned as the store sent it.
    ///
    /// # Errors
    ///
    /// Discharge and store failures as they occur;
    /// [`OoClientError::DecryptionFailed`] when the content does not
    /// authenticate under the recovered envelope.
    #[tracing::instrument(skip_all)]
    pub async fn resolve_and_fetch(&self, chain: &Chain) -> Result<Vec<u8>, OoClientError> {
        let Resolution { chain, envelope } = self.resolve(chain).await?;
        let object_id = chain.object_id()?;

        let content = self.store.fetch(&object_id, &chain).await?;

        let Some(envelope) = envelope else {
            tracing::debug!(%object_id, "no envelope recovered; content is not end-to-end encrypted");
            return Ok(content);
        };

        let plaintext = envelope.open(&content)?;
        if !envelope.matches_digest(&plaintext) {
            tracing::warn!(%object_id, "plaintext digest differs from the envelope digest");
        }

        tracing::info!(%object_id, size = plaintext.len(), "fetched object");
        Ok(plaintext)
    }

    /// Resolve `chain` and delete its object.
    #[tracing::instrument(skip_all)]
    pub async fn resolve_and_delete(&self, chain: &Chain) -> Result<(), OoClientError> {
        let Resolution { chain, .. } = self.resolve(chain).await?;
        let object_id = chain.object_id()?;

        self.store.delete(&object_id, &chain).await?;

        tracing::info!(%object_id, "deleted object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryObjectStore;
    use pretty_assertions::assert_eq;

    fn client(home: &std::path::Path) -> Client<MemoryObjectStore> {
        Client::new(MemoryObjectStore::default(), KeyManager::new(home))
    }

    #[tokio::test]
    async fn it_stores_only_ciphertext() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let client = client(home.path());

        let issued = client.issue(b"hello world", Some("text/plain")).await?;
        let object_id = issued.chain.object_id()?;

        let stored = client.store().raw_content(&object_id).await;
        assert_eq!(stored.as_deref(), Some(issued.ciphertext.as_slice()));
        assert_ne!(issued.ciphertext.as_slice(), b"hello world");
        assert_eq!(
            client.store().content_type(&object_id).await.as_deref(),
            Some("text/plain")
        );
        Ok(())
    }

    #[tokio::test]
    async fn it_adds_one_self_caveat_on_issue() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let client = client(home.path());

        let issued = client.issue(b"hello world", None).await?;
        let caveats = issued.chain.undischarged();

        assert_eq!(issued.chain.len(), 1);
        assert_eq!(caveats.len(), 1);
        assert_eq!(caveats[0].location(), Some(SELF_LOCATION));
        Ok(())
    }

    #[tokio::test]
    async fn it_attenuates_with_first_party_caveats() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let client = client(home.path());
        let issued = client.issue(b"hello world", None).await?;

        let narrowed = client.attenuate(&issued.chain, "method=read", None, None)?;
        let conditions: Vec<&str> = narrowed.primary().first_party_conditions().collect();

        assert!(conditions.contains(&"method=read"));
        assert_eq!(client.resolve_and_fetch(&narrowed).await?, b"hello world");
        Ok(())
    }

    #[tokio::test]
    async fn it_treats_an_empty_location_as_first_party() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let client = client(home.path());
        let issued = client.issue(b"hello world", None).await?;

        let narrowed = client.attenuate(&issued.chain, "method=read", Some(""), None)?;
        assert_eq!(narrowed.undischarged().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn it_drops_discharges_when_attenuating() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let client = client(home.path());
        let issued = client.issue(b"hello world", None).await?;

        let resolved = client.resolve(&issued.chain).await?.chain;
        assert_eq!(resolved.len(), 2);

        let narrowed = client.attenuate(&resolved, "method=read", None, None)?;
        assert_eq!(narrowed.len(), 1);
        assert_eq!(client.resolve_and_fetch(&narrowed).await?, b"hello world");
        Ok(())
    }

    #[tokio::test]
    async fn it_decrypts_through_an_already_resolved_chain() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let client = client(home.path());
        let issued = client.issue(b"hello world", None).await?;

        let resolved = client.resolve(&issued.chain).await?.chain;
        let reparsed = Chain::parse(&resolved.to_bytes()?)?;
        assert!(reparsed.is_discharged());

        assert_eq!(client.resolve_and_fetch(&reparsed).await?, b"hello world");
        Ok(())
    }

    #[tokio::test]
    async fn it_returns_plain_content_without_an_envelope() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let client = client(home.path());

        let chain = client.store().create(b"plain".to_vec(), None).await?;
        assert_eq!(client.resolve_and_fetch(&chain).await?, b"plain");
        Ok(())
    }

    #[tokio::test]
    async fn it_detects_tampered_content() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let client = client(home.path());
        let issued = client.issue(b"hello world", None).await?;
        let object_id = issued.chain.object_id()?;

        let mut tampered = issued.ciphertext.clone();
        tampered[0] ^= 0x01;
        assert!(client.store().replace_content(&object_id, tampered).await);

        let result = client.resolve_and_fetch(&issued.chain).await;
        assert!(matches!(result, Err(OoClientError::DecryptionFailed)));
        Ok(())
    }
}
