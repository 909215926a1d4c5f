//! Deduplication of bibliographic candidates.

use std::collections::HashSet;

use crate::models::Candidate;

/// Remove repeated `{title, author}` pairs, keeping the first occurrence.
///
/// Comparison is exact; the bibliographic service already returns one
/// spelling per edition and the catalog probe is exact-match anyway.
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(candidates.len());
    candidates
        .into_iter()
        .filter(|c| seen.insert((c.title.clone(), c.author.clone())))
        .collect()
}

/// Count how many entries `dedup_candidates` would drop
pub fn count_duplicates(candidates: &[Candidate]) -> usize {
    let unique: HashSet<(&str, &str)> = candidates
        .iter()
        .map(|c| (c.title.as_str(), c.author.as_str()))
        .collect();
    candidates.len() - unique.len()
}
