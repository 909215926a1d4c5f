//! Core data models for books and catalog searches.

mod book;
mod search;

pub use book::{
    interest_codes, interest_label, BookRecord, BookRecordBuilder, Candidate, UNKNOWN_AUTHOR,
    UNKNOWN_INTEREST,
};
pub use search::{QuizType, ScannedItem, SearchMode, SearchQuery, SortOrder};
