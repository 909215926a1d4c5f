//! HTTP seam between the catalog logic and the network.
//!
//! A [`Transport`] is one browsing agent: it keeps its own cookies, so the
//! server-side state built by a handshake lives exactly as long as the
//! transport. A [`Connector`] creates fresh agents; a session reset throws
//! the old one away.

use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;
use url::Url;

use super::CatalogError;
use crate::utils::{HttpClient, HttpSettings};

/// A fetched HTML page and the URL it was finally served from
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

impl Page {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }

    /// Parse the body. `Html` is not `Send`; keep it out of `.await` points.
    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// One stateful browsing agent
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn get(&self, url: &Url) -> Result<Page, CatalogError>;

    /// POST `fields` as `application/x-www-form-urlencoded`
    async fn post_form(&self, url: &Url, fields: &[(String, String)])
        -> Result<Page, CatalogError>;
}

/// Factory for fresh browsing agents
pub trait Connector: Send + Sync + std::fmt::Debug {
    fn connect(&self) -> Result<Arc<dyn Transport>, CatalogError>;
}

/// reqwest-backed transport with its own cookie store
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self, CatalogError> {
        let settings = settings.clone().with_cookies();
        Ok(Self {
            client: HttpClient::with_settings(&settings)?,
        })
    }

    async fn read_page(response: reqwest::Response) -> Result<Page, CatalogError> {
        let status = response.status();
        let url = response.url().clone();

        if !status.is_success() {
            return Err(CatalogError::TransientSearchFault(format!(
                "catalog returned status {} for {}",
                status, url
            )));
        }

        let body = response.text().await?;
        Ok(Page::new(url, body))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<Page, CatalogError> {
        tracing::debug!(%url, "GET catalog page");
        let response = self
            .client
            .client()
            .get(url.clone())
            .header("Accept", "text/html")
            .send()
            .await?;
        Self::read_page(response).await
    }

    async fn post_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<Page, CatalogError> {
        tracing::debug!(%url, fields = fields.len(), "POST catalog form");
        let response = self
            .client
            .client()
            .post(url.clone())
            .header("Accept", "text/html")
            .form(fields)
            .send()
            .await?;
        Self::read_page(response).await
    }
}

/// Creates a new [`HttpTransport`] (and cookie jar) per session
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    settings: HttpSettings,
}

impl HttpConnector {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }
}

impl Connector for HttpConnector {
    fn connect(&self) -> Result<Arc<dyn Transport>, CatalogError> {
        Ok(Arc::new(HttpTransport::new(&self.settings)?))
    }
}
