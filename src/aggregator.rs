//! Fan-out from user queries to catalog probes.
//!
//! The [`Aggregator`] is the crate's inbound surface. Free-text and ISBN
//! searches are first resolved into `{title, author}` candidates by the
//! bibliographic service; each candidate is then probed against the catalog's
//! advanced search. Candidates the catalog does not know come back as
//! placeholder records so the caller still sees every book the lookup found.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::catalog::{
    CatalogError, Extractor, HttpConnector, SearchExecutor, SessionManager,
};
use crate::config::Config;
use crate::lookup::{BibliographicLookup, LookupError, OpenLibraryClient};
use crate::models::{BookRecord, Candidate, ScannedItem, SearchMode, SearchQuery};
use crate::rerank::{rerank_or_fallback, ChatReranker, RerankError, Reranker};
use crate::utils::{is_valid_isbn, normalize_isbn};

/// Errors raised while wiring an [`Aggregator`] from configuration
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Rerank(#[from] RerankError),
}

/// Normalize a free-text query for the bibliographic lookup.
///
/// Curly quotes become straight ones. With `quote` set the query is wrapped
/// in double quotes so the service treats it as a phrase. Returns `None` for
/// blank input.
pub fn normalize_query(query: &str, quote: bool) -> Option<String> {
    let straight: String = query
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();
    let trimmed = straight.trim();

    if trimmed.trim_matches('"').trim().is_empty() {
        return None;
    }

    let already_quoted = trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"');
    if quote && !already_quoted {
        Some(format!("\"{}\"", trimmed))
    } else {
        Some(trimmed.to_string())
    }
}

/// Combines the bibliographic lookup, optional reranking and catalog probes
#[derive(Debug, Clone)]
pub struct Aggregator {
    lookup: Arc<dyn BibliographicLookup>,
    executor: SearchExecutor,
    reranker: Option<Arc<dyn Reranker>>,
    max_concurrent_probes: usize,
    quote_queries: bool,
}

impl Aggregator {
    pub fn new(lookup: Arc<dyn BibliographicLookup>, executor: SearchExecutor) -> Self {
        Self {
            lookup,
            executor,
            reranker: None,
            max_concurrent_probes: 4,
            quote_queries: true,
        }
    }

    /// Build the production stack described by `config`
    pub fn from_config(config: &Config) -> Result<Self, AggregatorError> {
        let catalog_url = Url::parse(&config.catalog.base_url).map_err(CatalogError::from)?;
        let connector = HttpConnector::new(config.catalog.http_settings());
        let sessions = SessionManager::new(Arc::new(connector), catalog_url)
            .with_user_type(&config.catalog.user_type);
        let executor = SearchExecutor::new(Arc::new(sessions))
            .with_extractor(Extractor::new(config.catalog.fetch_details));

        let lookup_url = Url::parse(&config.lookup.base_url).map_err(LookupError::from)?;
        let lookup = OpenLibraryClient::with_settings(lookup_url, &config.lookup.http_settings())?
            .with_language(&config.lookup.language);

        let mut aggregator = Self::new(Arc::new(lookup), executor)
            .with_max_concurrent_probes(config.aggregator.max_concurrent_probes)
            .with_quote_queries(config.aggregator.quote_queries);

        let rerank = &config.rerank;
        if rerank.enabled {
            match rerank.api_key.as_deref() {
                Some(key) => {
                    let reranker = ChatReranker::with_settings(key, &rerank.http_settings())?
                        .with_endpoint(&rerank.endpoint)
                        .with_model(&rerank.model)
                        .with_temperature(rerank.temperature);
                    aggregator = aggregator.with_reranker(Arc::new(reranker));
                }
                None => tracing::warn!("Reranking enabled but no API key configured; skipping"),
            }
        }

        Ok(aggregator)
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Bound on candidate probes in flight (at least one)
    pub fn with_max_concurrent_probes(mut self, n: usize) -> Self {
        self.max_concurrent_probes = n.max(1);
        self
    }

    pub fn with_quote_queries(mut self, quote: bool) -> Self {
        self.quote_queries = quote;
        self
    }

    pub fn executor(&self) -> &SearchExecutor {
        &self.executor
    }

    /// Candidates for free text, after normalization and optional reranking
    pub async fn lookup_candidates(&self, query: &str) -> Vec<Candidate> {
        let Some(lookup_query) = normalize_query(query, self.quote_queries) else {
            return Vec::new();
        };

        tracing::info!(query = %lookup_query, "Looking up candidates");
        let candidates = self.lookup.search_by_text(&lookup_query).await;
        if candidates.is_empty() {
            return candidates;
        }

        match &self.reranker {
            Some(reranker) => {
                let plain = normalize_query(query, false).unwrap_or_default();
                rerank_or_fallback(reranker.as_ref(), &plain, candidates).await
            }
            None => candidates,
        }
    }

    /// Resolve free text into candidates and probe each against the catalog.
    ///
    /// Blank input returns an empty list without any outbound call.
    pub async fn search_by_text(&self, query: &str) -> Result<Vec<BookRecord>, CatalogError> {
        let candidates = self.lookup_candidates(query).await;
        if candidates.is_empty() {
            tracing::info!("No candidates found");
            return Ok(Vec::new());
        }
        self.search_candidates(&candidates).await
    }

    /// Resolve an ISBN and probe the resulting book.
    ///
    /// Input that is not shaped like an ISBN returns an empty list without a lookup.
    pub async fn search_by_isbn(&self, isbn: &str) -> Result<Vec<BookRecord>, CatalogError> {
        let isbn = match normalize_isbn(isbn) {
            Ok(isbn) => isbn,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping ISBN search");
                return Ok(Vec::new());
            }
        };

        match self.lookup.search_by_isbn(&isbn).await {
            Some(candidate) => self.probe(&candidate).await,
            None => {
                tracing::info!(%isbn, "ISBN not known to bibliographic service");
                Ok(Vec::new())
            }
        }
    }

    /// Submit text directly to the catalog's quick search
    pub async fn search_free_text(&self, text: &str) -> Result<Vec<BookRecord>, CatalogError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        self.executor
            .search(SearchMode::Basic, &SearchQuery::keywords(text))
            .await
    }

    /// Submit loosely-named fields to the advanced search.
    ///
    /// Unrecognized names are ignored; if nothing usable remains no request is made.
    pub async fn search_by_fields(
        &self,
        fields: &HashMap<String, String>,
    ) -> Result<Vec<BookRecord>, CatalogError> {
        self.search_advanced(&SearchQuery::from_fields(fields)).await
    }

    /// Submit a structured query to the advanced search
    pub async fn search_advanced(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<BookRecord>, CatalogError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.executor.search(SearchMode::Advanced, query).await
    }

    /// Probe each pair; output is grouped per candidate in input order
    pub async fn search_candidates(
        &self,
        candidates: &[Candidate],
    ) -> Result<Vec<BookRecord>, CatalogError> {
        let groups: Vec<Vec<BookRecord>> = stream::iter(candidates)
            .map(|candidate| self.probe(candidate))
            .buffered(self.max_concurrent_probes)
            .try_collect()
            .await?;
        Ok(groups.into_iter().flatten().collect())
    }

    /// Resolve scanner output: ISBNs through the lookup, pairs directly
    pub async fn search_scanned(
        &self,
        items: &[ScannedItem],
    ) -> Result<Vec<BookRecord>, CatalogError> {
        let groups: Vec<Vec<BookRecord>> = stream::iter(items)
            .map(|item| async move {
                match item {
                    ScannedItem::Isbn(isbn) if is_valid_isbn(isbn) => {
                        self.search_by_isbn(isbn).await
                    }
                    ScannedItem::Isbn(isbn) => {
                        tracing::warn!(%isbn, "Skipping invalid scanned ISBN");
                        Ok(Vec::new())
                    }
                    ScannedItem::Pair(candidate) => self.probe(candidate).await,
                }
            })
            .buffered(self.max_concurrent_probes)
            .try_collect()
            .await?;
        Ok(groups.into_iter().flatten().collect())
    }

    /// Advanced search for one candidate; a placeholder when nothing matches
    async fn probe(&self, candidate: &Candidate) -> Result<Vec<BookRecord>, CatalogError> {
        let query = SearchQuery::for_candidate(candidate);
        match self.executor.search(SearchMode::Advanced, &query).await {
            Ok(records) if !records.is_empty() => Ok(records),
            Ok(_) => {
                tracing::debug!(title = %candidate.title, "Not in catalog");
                Ok(vec![BookRecord::placeholder(candidate)])
            }
            Err(e @ CatalogError::SearchExecutionFailed { .. }) => {
                tracing::warn!(title = %candidate.title, error = %e, "Probe failed, using placeholder");
                Ok(vec![BookRecord::placeholder(candidate)])
            }
            Err(e) => Err(e),
        }
    }
}
