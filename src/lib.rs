//! # bookfind
//!
//! Finds reading levels for children's books by combining a bibliographic
//! search API with a form-driven reading catalog that has no API of its own.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (BookRecord, Candidate, SearchQuery)
//! - [`catalog`]: Simulated browser sessions against the catalog site
//! - [`lookup`]: Bibliographic service client (title/author/ISBN resolution)
//! - [`rerank`]: Optional reordering of candidates by a chat model
//! - [`aggregator`]: The search operations tying the above together
//! - [`utils`]: HTTP client, ISBN validation, and deduplication
//! - [`config`]: Configuration management

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod lookup;
pub mod models;
pub mod rerank;
pub mod utils;

// Re-export commonly used types
pub use aggregator::Aggregator;
pub use catalog::CatalogError;
pub use models::{BookRecord, Candidate, SearchQuery};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
