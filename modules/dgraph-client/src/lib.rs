pub mod error;
pub mod types;

pub use error::{DgraphError, Result};
pub use types::{ApiError, Assigned, Envelope, MutationRequest, QueryRequest};

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// ACL token header for self-hosted clusters.
const ACCESS_TOKEN_HEADER: &str = "X-Dgraph-AccessToken";

/// API key header for hosted clusters.
const API_KEY_HEADER: &str = "X-Auth-Token";

/// Client for the Dgraph alpha HTTP API.
///
/// Every call is one request and one transaction: queries run read-only,
/// mutations commit immediately.
#[derive(Debug, Clone)]
pub struct DgraphClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    api_key: Option<String>,
}

impl DgraphClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DgraphError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: None,
            api_key: None,
        })
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a read-only DQL query. Returns the `data` object of the response.
    pub async fn query(
        &self,
        query: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<serde_json::Value> {
        let body = QueryRequest { query, variables };
        self.post_json("/query?ro=true", &body).await
    }

    /// Submit a JSON set-mutation and commit it in the same request.
    pub async fn mutate_set(&self, set: &serde_json::Value) -> Result<Assigned> {
        let body = MutationRequest { set };
        self.post_json("/mutate?commitNow=true", &body).await
    }

    /// Apply a DQL schema. Re-applying an identical schema is a no-op on the server.
    pub async fn alter(&self, schema: &str) -> Result<()> {
        let url = format!("{}/alter", self.base_url);
        let resp = self
            .authorize(self.client.post(&url))
            .body(schema.to_string())
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        decode_envelope::<serde_json::Value>(status, &text)?;
        Ok(())
    }

    /// Liveness probe against `/health`.
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let resp = self.authorize(self.client.get(&url)).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(DgraphError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "Dgraph request");

        let resp = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        decode_envelope(status, &text)
    }

    fn authorize(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref token) = self.access_token {
            req = req.header(ACCESS_TOKEN_HEADER, token);
        }
        if let Some(ref key) = self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }
        req
    }
}

/// Unwrap a response envelope. Store-reported errors win over the HTTP status,
/// since Dgraph reports most query failures with a 200.
fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    let success = (200..300).contains(&status);
    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => {
            if let Some(err) = envelope.errors.into_iter().next() {
                return Err(err.into_error());
            }
            if !success {
                return Err(DgraphError::Api {
                    status,
                    message: body.to_string(),
                });
            }
            envelope
                .data
                .ok_or_else(|| DgraphError::Parse("response has no data".to_string()))
        }
        Err(_) if !success => Err(DgraphError::Api {
            status,
            message: body.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}
