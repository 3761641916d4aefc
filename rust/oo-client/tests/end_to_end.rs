//! Issue, fetch, attenuate and delete against an in-memory store, with the
//! principal's key pair persisted in a temporary home directory.

use oo_client::{Client, MemoryObjectStore, OoClientError, StoreError, FORBIDDEN};
use oo_credentials::KeyManager;
use oo_macaroon::Chain;
use pretty_assertions::assert_eq;

fn client(store: &MemoryObjectStore, home: &std::path::Path) -> Client<MemoryObjectStore> {
    Client::new(store.clone(), KeyManager::new(home))
}

#[tokio::test]
async fn it_fetches_what_it_issued_from_a_fresh_process() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let store = MemoryObjectStore::default();

    let wire = {
        let issuer = client(&store, home.path());
        let issued = issuer.issue(b"hello world", None).await?;
        issued.chain.to_bytes()?
    };

    // Nothing but the persisted key pair and the serialized chain survive.
    let reader = client(&store, home.path());
    let chain = Chain::parse(&wire)?;

    assert_eq!(reader.resolve_and_fetch(&chain).await?, b"hello world");
    Ok(())
}

#[tokio::test]
async fn it_reports_not_found_after_delete() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let store = MemoryObjectStore::default();
    let client = client(&store, home.path());

    let issued = client.issue(b"hello world", None).await?;
    client.resolve_and_delete(&issued.chain).await?;
    assert!(store.is_empty().await);

    let fetched = client.resolve_and_fetch(&issued.chain).await;
    assert!(fetched.is_err_and(|error| error.is_not_found()));

    let deleted_again = client.resolve_and_delete(&issued.chain).await;
    assert!(deleted_again.is_err_and(|error| error.is_not_found()));
    Ok(())
}

#[tokio::test]
async fn it_is_denied_once_a_deadline_has_passed() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let store = MemoryObjectStore::default();
    let client = client(&store, home.path());

    let issued = client.issue(b"hello world", None).await?;
    let expired = client.attenuate(&issued.chain, "before 2020-01-01T00:00:00Z", None, None)?;

    match client.resolve_and_fetch(&expired).await {
        Err(OoClientError::Store(StoreError::Status { status, .. })) => {
            assert_eq!(status, FORBIDDEN);
        }
        other => panic!("expected the store to refuse, got {other:?}"),
    }

    // The object itself is untouched.
    let object_id = issued.chain.object_id()?;
    assert_eq!(store.raw_content(&object_id).await, Some(issued.ciphertext));
    assert_eq!(client.resolve_and_fetch(&issued.chain).await?, b"hello world");
    Ok(())
}

#[tokio::test]
async fn it_honors_deadlines_in_the_future() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let store = MemoryObjectStore::default();
    let client = client(&store, home.path());

    let issued = client.issue(b"hello world", None).await?;
    let narrowed = client.attenuate(&issued.chain, "before 2999-01-01T00:00:00Z", None, None)?;

    assert_eq!(client.resolve_and_fetch(&narrowed).await?, b"hello world");
    Ok(())
}

#[tokio::test]
async fn it_cannot_delete_with_a_read_only_capability() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let store = MemoryObjectStore::default();
    let client = client(&store, home.path());

    let issued = client.issue(b"hello world", None).await?;
    let read_only = client.attenuate(&issued.chain, "method=read", None, None)?;

    assert!(client.resolve_and_delete(&read_only).await.is_err());
    assert_eq!(store.len().await, 1);
    client.resolve_and_delete(&issued.chain).await?;
    Ok(())
}

#[tokio::test]
async fn it_needs_the_issuing_key_pair_to_decrypt() -> anyhow::Result<()> {
    let store = MemoryObjectStore::default();
    let owner_home = tempfile::tempdir()?;
    let stranger_home = tempfile::tempdir()?;

    let issued = client(&store, owner_home.path())
        .issue(b"hello world", None)
        .await?;

    let result = client(&store, stranger_home.path())
        .resolve_and_fetch(&issued.chain)
        .await;
    assert!(matches!(result, Err(OoClientError::SelfDischargeFailed(_))));
    Ok(())
}

#[tokio::test]
async fn it_rejects_garbage_capabilities() -> anyhow::Result<()> {
    assert!(Chain::parse(b"not a capability").is_err());
    assert!(Chain::parse(b"[]").is_err());
    Ok(())
}
