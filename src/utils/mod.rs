//! Utility modules supporting book searches.
//!
//! - [`dedup_candidates`]: Remove repeated `{title, author}` pairs, first-seen order preserved
//! - [`HttpClient`]: reqwest client with timeouts and an optional cookie store
//! - [`is_valid_isbn`]: ISBN-13 check used by the scanner flow
//!
//! # ISBN validation
//!
//! ```rust
//! use bookfind::utils::{is_valid_isbn, normalize_isbn};
//!
//! assert!(is_valid_isbn("978-0-06-440055-8"));
//! assert_eq!(normalize_isbn("ISBN 978-0-06-440055-8").unwrap(), "9780064400558");
//! ```

mod dedup;
mod http;
mod validate;

pub use dedup::{count_duplicates, dedup_candidates};
pub use http::{HttpClient, HttpSettings, DEFAULT_USER_AGENT};
pub use validate::{
    is_valid_isbn, normalize_isbn, validate_isbn10, validate_isbn13, ValidationError,
};
