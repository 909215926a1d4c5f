//! Bibliographic lookup: fuzzy title/author/ISBN resolution.
//!
//! The catalog only matches exact titles and authors, so free-text queries are
//! first resolved into `{title, author}` [`Candidate`]s by an external
//! bibliographic service. Failures here are never fatal: a lookup that cannot
//! be answered yields no candidates.

mod mock;
mod openlibrary;

pub use mock::MockLookup;
pub use openlibrary::{OpenLibraryClient, DEFAULT_LANGUAGE, OPEN_LIBRARY_BASE_URL};

use async_trait::async_trait;

use crate::models::Candidate;

/// Errors raised by a bibliographic service
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Transport failure or non-success status
    #[error("Bibliographic service unavailable: {0}")]
    LookupServiceUnavailable(String),

    /// Response body was not the expected JSON
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid lookup URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LookupError::Parse(err.to_string())
        } else {
            LookupError::LookupServiceUnavailable(err.to_string())
        }
    }
}

impl From<url::ParseError> for LookupError {
    fn from(err: url::ParseError) -> Self {
        LookupError::InvalidUrl(err.to_string())
    }
}

/// A source of `{title, author}` candidates.
///
/// Implementations swallow their own errors: an unavailable service or a
/// malformed reply produces an empty list (or `None`), never an error.
#[async_trait]
pub trait BibliographicLookup: Send + Sync + std::fmt::Debug {
    /// Candidates matching free text, deduplicated, in service order
    async fn search_by_text(&self, query: &str) -> Vec<Candidate>;

    /// The single book registered under `isbn`, if any
    async fn search_by_isbn(&self, isbn: &str) -> Option<Candidate>;
}
