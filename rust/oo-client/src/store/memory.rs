//! In-memory object store for testing and embedding

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oo_macaroon::{Chain, Macaroon, condition};
use tokio::sync::RwLock;
use ulid::Ulid;
use zeroize::Zeroizing;

use super::{FORBIDDEN, ObjectStore, StoreError};

/// The operation a capability is presented for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Fetching content
    Read,
    /// Deleting the object
    Delete,
}

impl Method {
    /// The argument a `method` caveat uses for this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Read => "read",
            Method::Delete => "delete",
        }
    }
}

struct StoredObject {
    content: Vec<u8>,
    content_type: Option<String>,
    root_key: Zeroizing<[u8; 32]>,
}

/// An [`ObjectStore`] that keeps everything in memory.
///
/// Every object gets its own random root key. The chain minted on create
/// carries an `object=<id>` caveat; presented chains are verified with
/// first-party checkers for `object`, `before <RFC 3339 time>` and
/// `method=<read|delete>`. Any other first-party condition is denied.
///
/// Clones share the same objects.
#[derive(Clone)]
pub struct MemoryObjectStore {
    location: String,
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    /// Create an empty store whose tokens name `location`
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of objects currently stored
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// `true` when no objects are stored
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// The stored (opaque) content of `object_id`, bypassing authorization
    pub async fn raw_content(&self, object_id: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(object_id)
            .map(|object| object.content.clone())
    }

    /// Overwrite the stored content of `object_id`, bypassing authorization.
    ///
    /// Returns `false` when there is no such object.
    pub async fn replace_content(&self, object_id: &str, content: Vec<u8>) -> bool {
        match self.objects.write().await.get_mut(object_id) {
            Some(object) => {
                object.content = content;
                true
            }
            None => false,
        }
    }

    /// The content type given when `object_id` was created
    pub async fn content_type(&self, object_id: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(object_id)
            .and_then(|object| object.content_type.clone())
    }

    fn authorize(
        root_key: &[u8; 32],
        object_id: &str,
        chain: &Chain,
        method: Method,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        chain
            .verify(root_key, |condition| {
                check_condition(condition, object_id, method, now)
            })
            .map_err(|error| {
                tracing::debug!(object_id, %error, "capability refused");
                StoreError::Status {
                    status: FORBIDDEN,
                    message: format!("verification failed: {error}"),
                }
            })
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory:")
    }
}

fn check_condition(
    text: &str,
    object_id: &str,
    method: Method,
    now: DateTime<Utc>,
) -> Result<(), String> {
    match condition::parse(text) {
        Some((condition::OBJECT, id)) if id == object_id => Ok(()),
        Some((condition::OBJECT, id)) => Err(format!("capability is for object {id}")),
        Some((condition::BEFORE, deadline)) => {
            let deadline = DateTime::parse_from_rfc3339(deadline)
                .map_err(|error| format!("invalid deadline {deadline:?}: {error}"))?;
            if now < deadline {
                Ok(())
            } else {
                Err(format!("capability expired at {deadline}"))
            }
        }
        Some((condition::METHOD, allowed)) if allowed == method.as_str() => Ok(()),
        Some((condition::METHOD, allowed)) => {
            Err(format!("capability only allows method {allowed}"))
        }
        _ => Err("caveat not recognized".to_string()),
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create(
        &self,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<Chain, StoreError> {
        let object_id = Ulid::new().to_string();
        let mut root_key = Zeroizing::new([0u8; 32]);
        getrandom::getrandom(root_key.as_mut_slice())
            .map_err(|error| StoreError::Status {
                status: 500,
                message: format!("failed to create object key: {error}"),
            })?;

        let token = Macaroon::new(root_key.as_slice(), object_id.as_str(), self.location.as_str())
            .add_first_party_caveat(&condition::object(&object_id));

        self.objects.write().await.insert(
            object_id.clone(),
            StoredObject {
                content,
                content_type: content_type.map(str::to_string),
                root_key,
            },
        );
        tracing::debug!(%object_id, "created object");

        Ok(Chain::new(token))
    }

    async fn fetch(&self, object_id: &str, chain: &Chain) -> Result<Vec<u8>, StoreError> {
        let objects = self.objects.read().await;
        let object = objects
            .get(object_id)
            .ok_or_else(|| StoreError::not_found("Not Found"))?;

        Self::authorize(&object.root_key, object_id, chain, Method::Read)?;
        Ok(object.content.clone())
    }

    async fn delete(&self, object_id: &str, chain: &Chain) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        let object = objects
            .get(object_id)
            .ok_or_else(|| StoreError::not_found("Not Found"))?;

        Self::authorize(&object.root_key, object_id, chain, Method::Delete)?;
        objects.remove(object_id);
        tracing::debug!(object_id, "deleted object");
        Ok(())
    }
}
