//! Client for the form-driven reading catalog.
//!
//! The catalog has no API: every search is a simulated browser session.
//! This module is split along the path a search takes:
//!
//! - [`transport`]: the [`Transport`]/[`Connector`] seam over HTTP (one cookie jar per session)
//! - [`form`]: parsing and filling HTML forms, including hidden state fields
//! - [`session`]: the [`SessionManager`], owning one authenticated session per [`SearchMode`]
//! - [`executor`]: the [`SearchExecutor`], which submits a query and retries once after a reset
//! - [`extract`]: turning result pages into [`BookRecord`](crate::models::BookRecord)s
//!
//! [`mock`] provides an in-memory catalog for tests.

pub mod executor;
pub mod extract;
pub mod form;
pub mod mock;
pub mod session;
pub mod transport;

pub use executor::{filler_for, AdvancedFormFiller, BasicFormFiller, FormFiller, SearchExecutor};
pub use extract::Extractor;
pub use form::HtmlForm;
pub use mock::MockCatalog;
pub use session::{SessionHandle, SessionManager};
pub use transport::{Connector, HttpConnector, HttpTransport, Page, Transport};

use crate::models::SearchMode;

/// Errors raised while talking to the catalog site
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The user-type handshake could not be completed
    #[error("Session setup failed for {mode} search: {reason}")]
    SessionSetupFailed { mode: SearchMode, reason: String },

    /// Transport error or stale session detected mid-search
    #[error("Transient search fault: {0}")]
    TransientSearchFault(String),

    /// A search failed again after its session was rebuilt
    #[error("Search execution failed for {mode} search: {reason}")]
    SearchExecutionFailed { mode: SearchMode, reason: String },

    /// A page lacked the structure the parser expects
    #[error("Malformed result page: {0}")]
    MalformedResultPage(String),

    /// Catalog URL could not be built
    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),
}

impl CatalogError {
    /// Whether a session reset may cure this error
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::TransientSearchFault(_))
    }

    pub(crate) fn setup(mode: SearchMode, reason: impl Into<String>) -> Self {
        CatalogError::SessionSetupFailed {
            mode,
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::TransientSearchFault(err.to_string())
    }
}

impl From<url::ParseError> for CatalogError {
    fn from(err: url::ParseError) -> Self {
        CatalogError::InvalidUrl(err.to_string())
    }
}
