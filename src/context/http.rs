//! Retrieval over HTTP
//!
//! POSTs `{"query": ..., "scope_id": ...}` to the configured endpoint and
//! expects `{"context": "..."}` back.

use std::time::Duration;

use async_trait::async_trait;

use super::ContextProvider;
use crate::{Error, Result};

#[derive(serde::Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope_id: Option<&'a str>,
}

#[derive(serde::Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    context: String,
}

/// Context provider backed by a retrieval service
pub struct HttpContextProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpContextProvider {
    /// Create a provider for `url` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl ContextProvider for HttpContextProvider {
    async fn retrieve(&self, query: &str, scope_id: Option<&str>) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&RetrieveRequest { query, scope_id })
            .send()
            .await
            .map_err(|e| Error::Retrieval(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Retrieval(format!(
                "retrieval service error {status}: {body}"
            )));
        }

        let result: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| Error::Retrieval(e.to_string()))?;
        Ok(result.context)
    }
}
