//! Mock bibliographic lookup for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::BibliographicLookup;
use crate::models::Candidate;
use crate::utils::dedup_candidates;

/// A lookup answering from predefined tables and counting its calls
#[derive(Debug, Default)]
pub struct MockLookup {
    by_text: Mutex<HashMap<String, Vec<Candidate>>>,
    by_isbn: Mutex<HashMap<String, Candidate>>,
    calls: Mutex<Vec<String>>,
}

impl MockLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with `candidates` (deduplicated like a real client)
    pub fn with_text(self, query: &str, candidates: Vec<Candidate>) -> Self {
        self.by_text
            .lock()
            .unwrap()
            .insert(query.to_string(), dedup_candidates(candidates));
        self
    }

    pub fn with_isbn(self, isbn: &str, candidate: Candidate) -> Self {
        self.by_isbn.lock().unwrap().insert(isbn.to_string(), candidate);
        self
    }

    /// Every query or ISBN received, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BibliographicLookup for MockLookup {
    async fn search_by_text(&self, query: &str) -> Vec<Candidate> {
        self.calls.lock().unwrap().push(query.to_string());
        self.by_text
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default()
    }

    async fn search_by_isbn(&self, isbn: &str) -> Option<Candidate> {
        self.calls.lock().unwrap().push(isbn.to_string());
        self.by_isbn.lock().unwrap().get(isbn).cloned()
    }
}
