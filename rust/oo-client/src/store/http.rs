//! Object store reached over HTTP
//!
//! - POST `{endpoint}` with the content as body - create, answers 200 with
//!   the capability chain as JSON
//! - POST `{endpoint}/{id}` with the chain as JSON body - fetch, answers 200
//!   with the content
//! - DELETE `{endpoint}/{id}` with the chain as JSON body - delete, answers
//!   204

use async_trait::async_trait;
use oo_macaroon::Chain;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, header::CONTENT_TYPE};

use super::{ObjectStore, StoreError};
use crate::ClientConfig;

const JSON: &str = "application/json";

/// An [`ObjectStore`] behind an HTTP endpoint.
#[derive(Clone)]
pub struct HttpObjectStore {
    endpoint: String,
    headers: Vec<(String, String)>,
    client: Client,
}

impl HttpObjectStore {
    /// Create a store client from `config`
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.endpoint().to_string(),
            headers: config.headers.clone(),
            client: config.http_client(),
        }
    }

    /// The URL of one object, with the id percent-encoded as a single path
    /// segment
    fn url_for_object(&self, object_id: &str) -> Result<Url, StoreError> {
        if matches!(object_id, "" | "." | "..") {
            return Err(StoreError::InvalidRequest(format!(
                "object id {object_id:?} is not a path segment"
            )));
        }

        let mut url = Url::parse(&self.endpoint)
            .map_err(|error| StoreError::InvalidRequest(format!("{}: {error}", self.endpoint)))?;
        url.path_segments_mut()
            .map_err(|_| {
                StoreError::InvalidRequest(format!("{} cannot be a base URL", self.endpoint))
            })?
            .pop_if_empty()
            .push(object_id);
        Ok(url)
    }

    /// Add the configured custom headers
    fn build_request(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder;
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }
        builder
    }

    fn chain_body(chain: &Chain) -> Result<Vec<u8>, StoreError> {
        chain
            .to_bytes()
            .map_err(|error| StoreError::InvalidRequest(error.to_string()))
    }
}

/// Turn a non-success response into a [`StoreError::Status`] carrying the
/// response body as message
async fn status_error(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = match body.trim() {
        "" => status.canonical_reason().unwrap_or("Unknown").to_string(),
        text => text.to_string(),
    };
    StoreError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    #[tracing::instrument(level = "debug", skip(self, content), fields(endpoint = %self.endpoint, size = content.len()))]
    async fn create(
        &self,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<Chain, StoreError> {
        let mut request = self.client.post(&self.endpoint).body(content);
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        let response = self.build_request(request).send().await?;

        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }

        let body = response.bytes().await?;
        Chain::parse(&body).map_err(|error| StoreError::InvalidResponse(error.to_string()))
    }

    #[tracing::instrument(level = "debug", skip(self, chain))]
    async fn fetch(&self, object_id: &str, chain: &Chain) -> Result<Vec<u8>, StoreError> {
        let request = self
            .client
            .post(self.url_for_object(object_id)?)
            .header(CONTENT_TYPE, JSON)
            .body(Self::chain_body(chain)?);
        let response = self.build_request(request).send().await?;

        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }

    #[tracing::instrument(level = "debug", skip(self, chain))]
    async fn delete(&self, object_id: &str, chain: &Chain) -> Result<(), StoreError> {
        let request = self
            .client
            .delete(self.url_for_object(object_id)?)
            .header(CONTENT_TYPE, JSON)
            .body(Self::chain_body(chain)?);
        let response = self.build_request(request).send().await?;

        if response.status() != StatusCode::NO_CONTENT {
            return Err(status_error(response).await);
        }

        Ok(())
    }
}
