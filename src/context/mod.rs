//! Context retrieval for grounding answers in course material
//!
//! Retrieval is an external collaborator: the pipeline only needs a context
//! string for the question. An empty string is a valid (degraded) answer.

mod http;

use async_trait::async_trait;

pub use http::HttpContextProvider;

use crate::Result;

/// Returns context relevant to a question
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Retrieve context for `query`, optionally scoped to one content item
    ///
    /// # Errors
    ///
    /// Returns `Error::Retrieval` on provider failure; callers treat this as
    /// recoverable and substitute an empty context
    async fn retrieve(&self, query: &str, scope_id: Option<&str>) -> Result<String>;
}

/// Stand-in provider used when no retrieval service is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderContextProvider;

#[async_trait]
impl ContextProvider for PlaceholderContextProvider {
    async fn retrieve(&self, query: &str, scope_id: Option<&str>) -> Result<String> {
        Ok(format!(
            "Context for query: '{query}' (video: {})",
            scope_id.unwrap_or("all")
        ))
    }
}
