//! Optional reordering of bibliographic candidates.
//!
//! A [`Reranker`] receives the user's query and the candidate list and
//! returns the same books in a better order (series in publication order,
//! duplicate regional titles merged). [`ChatReranker`] asks an
//! OpenAI-compatible chat model to do this.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Candidate;
use crate::utils::{dedup_candidates, HttpClient, HttpSettings};

/// Default chat-completions endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

const SYSTEM_PROMPT: &str = "\
You will be passed a search_query string describing what the user is looking for \
(a title, author or series) and search_results, a list of children's books as objects \
with title and author fields.

Re-order these books by published date so books in a series appear in the correct order. \
Use UK titles, and do not return separate items for UK and US titles of the same book. \
Watch for bad data.

Return only a JSON array of objects with the keys \"title\" and \"author\", with no extra commentary.";

/// Reranking errors
#[derive(Debug, thiserror::Error)]
pub enum RerankError {
    #[error("Reranker request failed: {0}")]
    Network(String),

    #[error("Reranker API error: {0}")]
    Api(String),

    #[error("Unparseable reranker reply: {0}")]
    Parse(String),

    #[error("Reranker not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for RerankError {
    fn from(err: reqwest::Error) -> Self {
        RerankError::Network(err.to_string())
    }
}

/// Reorders candidates for a query
#[async_trait]
pub trait Reranker: Send + Sync + std::fmt::Debug {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[Candidate],
    ) -> Result<Vec<Candidate>, RerankError>;
}

/// Rerank, falling back to the original order on any error or empty reply
pub async fn rerank_or_fallback(
    reranker: &dyn Reranker,
    query: &str,
    candidates: Vec<Candidate>,
) -> Vec<Candidate> {
    match reranker.rerank(query, &candidates).await {
        Ok(reranked) if !reranked.is_empty() => {
            tracing::debug!(
                before = candidates.len(),
                after = reranked.len(),
                "Candidates reranked"
            );
            dedup_candidates(reranked)
        }
        Ok(_) => {
            tracing::warn!("Reranker returned no candidates, keeping original order");
            candidates
        }
        Err(e) => {
            tracing::warn!(error = %e, "Reranking failed, keeping original order");
            candidates
        }
    }
}

/// Strip a surrounding markdown code fence and parse a `[{title, author}]` array
pub fn parse_reranked(content: &str) -> Result<Vec<Candidate>, RerankError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let unfenced = unfenced.trim().strip_suffix("```").unwrap_or(unfenced).trim();

    let items: Vec<RerankedItem> =
        serde_json::from_str(unfenced).map_err(|e| RerankError::Parse(e.to_string()))?;

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let title = item.title.trim().to_string();
            (!title.is_empty()).then(|| {
                let author = item
                    .author
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| crate::models::UNKNOWN_AUTHOR.to_string());
                Candidate::new(title, author)
            })
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct RerankedItem {
    title: String,
    author: Option<String>,
}

/// Reranker backed by an OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct ChatReranker {
    client: HttpClient,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatReranker {
    pub fn new(api_key: impl Into<String>) -> Result<Self, RerankError> {
        Self::with_settings(api_key, &HttpSettings::default())
    }

    pub fn with_settings(
        api_key: impl Into<String>,
        settings: &HttpSettings,
    ) -> Result<Self, RerankError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RerankError::NotConfigured("missing API key".to_string()));
        }
        Ok(Self {
            client: HttpClient::with_settings(settings)?,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn user_prompt(query: &str, candidates: &[Candidate]) -> String {
        let results = serde_json::to_string(candidates).unwrap_or_else(|_| "[]".to_string());
        format!("search_query: {}\nsearch_results: {}\n", query, results)
    }
}

#[async_trait]
impl Reranker for ChatReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[Candidate],
    ) -> Result<Vec<Candidate>, RerankError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::user_prompt(query, candidates),
                },
            ],
        };

        tracing::debug!(model = %self.model, count = candidates.len(), "Requesting rerank");
        let response = self
            .client
            .client()
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RerankError::Api(format!("status {}: {}", status, body)));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| RerankError::Parse(e.to_string()))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RerankError::Parse("reply has no message content".to_string()))?;

        parse_reranked(&content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Reranker returning a fixed list or a fixed failure; for tests
#[derive(Debug, Clone)]
pub struct StaticReranker {
    reply: Option<Vec<Candidate>>,
}

impl StaticReranker {
    /// Always answer with `reply`
    pub fn replying(reply: Vec<Candidate>) -> Self {
        Self { reply: Some(reply) }
    }

    /// Always fail
    pub fn failing() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl Reranker for StaticReranker {
    async fn rerank(
        &self,
        _query: &str,
        _candidates: &[Candidate],
    ) -> Result<Vec<Candidate>, RerankError> {
        self.reply
            .clone()
            .ok_or_else(|| RerankError::Api("static failure".to_string()))
    }
}
