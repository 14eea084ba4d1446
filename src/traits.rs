use crate::model::{Query, SearchPage};
use async_trait::async_trait;
use thiserror::Error;

/// Closed classification of provider failures, decided at the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// One call failed; the next unit of work may succeed.
    Transient,
    /// The provider is throttling this credential; the run must stop.
    RateLimited,
    /// Retrying cannot help (rejected credentials, bad partner tag).
    Fatal,
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Provider throttled the request ({code}): {message}")]
    RateLimited { code: String, message: String },
    #[error("Provider rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },
    #[error("Request outside provider limits: {0}")]
    InvalidRequest(String),
    #[error("Provider error (HTTP {status}, {code}): {message}")]
    Provider {
        status: u16,
        code: String,
        message: String,
    },
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::RateLimited { .. } => ErrorKind::RateLimited,
            SearchError::Rejected { .. } | SearchError::InvalidRequest(_) => ErrorKind::Fatal,
            SearchError::Transport(_)
            | SearchError::Timeout(_)
            | SearchError::MalformedResponse(_)
            | SearchError::Provider { .. } => ErrorKind::Transient,
        }
    }
}

#[async_trait]
pub trait ProductSearch: Send + Sync {
    /// Returns the provider id used in logs (e.g., "paapi5").
    fn provider_id(&self) -> &str;

    /// Highest page number the provider serves, if bounded.
    fn max_page(&self) -> Option<u32> {
        None
    }

    /// Largest page the provider serves, if bounded.
    fn max_item_count(&self) -> Option<u32> {
        None
    }

    /// Fetches one page of results for `query`.
    ///
    /// A successful call with no matches returns an empty page, not an error.
    async fn search(
        &self,
        query: &Query,
        page: u32,
        item_count: u32,
    ) -> Result<SearchPage, SearchError>;
}
