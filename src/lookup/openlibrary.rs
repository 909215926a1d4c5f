//! Open Library client.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

use super::{BibliographicLookup, LookupError};
use crate::models::{Candidate, UNKNOWN_AUTHOR};
use crate::utils::{count_duplicates, dedup_candidates, HttpClient, HttpSettings};

/// Public Open Library endpoint
pub const OPEN_LIBRARY_BASE_URL: &str = "https://openlibrary.org/";

/// Language filter applied to text searches
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Client for the Open Library search and books APIs
#[derive(Debug, Clone)]
pub struct OpenLibraryClient {
    client: HttpClient,
    base_url: Url,
    language: String,
}

impl OpenLibraryClient {
    /// Create a client for the public service
    pub fn new() -> Result<Self, LookupError> {
        let base_url = Url::parse(OPEN_LIBRARY_BASE_URL)?;
        Self::with_settings(base_url, &HttpSettings::default())
    }

    /// Create a client for a compatible service at `base_url`
    pub fn with_settings(base_url: Url, settings: &HttpSettings) -> Result<Self, LookupError> {
        Ok(Self {
            client: HttpClient::with_settings(settings)?,
            base_url: ensure_trailing_slash(base_url),
            language: DEFAULT_LANGUAGE.to_string(),
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Text search returning errors instead of swallowing them
    pub async fn try_search_by_text(&self, query: &str) -> Result<Vec<Candidate>, LookupError> {
        let mut url = self.base_url.join("search.json")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("language", &self.language);

        tracing::debug!(%url, "Searching bibliographic service");
        let data: SearchResponse = self.get_json(url).await?;

        let candidates = data
            .docs
            .into_iter()
            .filter_map(|doc| {
                let title = doc.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
                Some(Candidate::new(title, first_author(doc.author_name.first())))
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            count = candidates.len(),
            duplicates = count_duplicates(&candidates),
            "Bibliographic search returned"
        );
        Ok(dedup_candidates(candidates))
    }

    /// ISBN lookup returning errors instead of swallowing them
    pub async fn try_search_by_isbn(&self, isbn: &str) -> Result<Option<Candidate>, LookupError> {
        let key = format!("ISBN:{}", isbn);
        let mut url = self.base_url.join("api/books")?;
        url.query_pairs_mut()
            .append_pair("bibkeys", &key)
            .append_pair("format", "json")
            .append_pair("jscmd", "data");

        tracing::debug!(%url, "Looking up ISBN");
        let mut data: HashMap<String, BookData> = self.get_json(url).await?;

        Ok(data.remove(&key).and_then(|book| {
            let title = book.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            let author = book.authors.into_iter().next().and_then(|a| a.name);
            Some(Candidate::new(title, first_author(author.as_ref())))
        }))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, LookupError> {
        let response = self
            .client
            .client()
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LookupError::LookupServiceUnavailable(format!(
                "service returned status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| LookupError::Parse(format!("Failed to parse JSON: {}", e)))
    }
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn first_author(name: Option<&String>) -> String {
    name.map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR)
        .to_string()
}

#[async_trait]
impl BibliographicLookup for OpenLibraryClient {
    async fn search_by_text(&self, query: &str) -> Vec<Candidate> {
        match self.try_search_by_text(query).await {
            Ok(candidates) => {
                tracing::info!(query, count = candidates.len(), "Bibliographic search complete");
                candidates
            }
            Err(e) => {
                tracing::warn!(query, error = %e, "Bibliographic search failed");
                Vec::new()
            }
        }
    }

    async fn search_by_isbn(&self, isbn: &str) -> Option<Candidate> {
        self.try_search_by_isbn(isbn).await.unwrap_or_else(|e| {
            tracing::warn!(isbn, error = %e, "ISBN lookup failed");
            None
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    title: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BookData {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<AuthorRef>,
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_parsing() {
        let json = r#"{
            "numFound": 3,
            "docs": [
                {"title": "Charlotte's Web", "author_name": ["E. B. White", "Garth Williams"]},
                {"author_name": ["Nobody"]},
                {"title": "Anonymous Tales"}
            ]
        }"#;
        let data: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(data.docs.len(), 3);
        assert_eq!(data.docs[0].author_name[0], "E. B. White");
        assert!(data.docs[1].title.is_none());
        assert!(data.docs[2].author_name.is_empty());
    }

    #[test]
    fn test_first_author_defaults() {
        assert_eq!(first_author(None), "Unknown Author");
        assert_eq!(first_author(Some(&"  ".to_string())), "Unknown Author");
        assert_eq!(first_author(Some(&"Roald Dahl".to_string())), "Roald Dahl");
    }

    #[test]
    fn test_trailing_slash() {
        let url = ensure_trailing_slash(Url::parse("http://127.0.0.1:1234/ol").unwrap());
        assert_eq!(url.join("search.json").unwrap().path(), "/ol/search.json");
        let url = ensure_trailing_slash(Url::parse("http://127.0.0.1:1234").unwrap());
        assert_eq!(url.join("search.json").unwrap().path(), "/search.json");
    }

    #[test]
    fn test_default_client() {
        let client = OpenLibraryClient::new().unwrap().with_language("fre");
        assert_eq!(client.base_url().as_str(), "https://openlibrary.org/");
        assert_eq!(client.language, "fre");
    }
}
