//! In-memory catalog for testing purposes.
//!
//! [`MockCatalog`] answers requests from a route table instead of the
//! network, records every request it sees, and can be told to fail a number
//! of form posts to simulate stale sessions.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use url::Url;

use super::transport::{Connector, Page, Transport};
use super::CatalogError;

/// Base URL the mock catalog pretends to be served from
pub const MOCK_BASE_URL: &str = "http://catalog.test/";

/// Parsed [`MOCK_BASE_URL`]
pub fn base_url() -> Url {
    Url::parse(MOCK_BASE_URL).unwrap()
}

/// A request the mock has received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string
    pub target: String,
    /// Form fields as unencoded `name=value` pairs joined with `&`
    pub body: String,
}

#[derive(Debug)]
struct Route {
    method: String,
    target: String,
    body_contains: Option<String>,
    response: String,
}

#[derive(Debug)]
struct Failure {
    needle: String,
    remaining: usize,
}

#[derive(Debug, Default)]
struct MockState {
    routes: Vec<Route>,
    failures: Vec<Failure>,
    connects: usize,
    requests: Vec<RecordedRequest>,
}

/// A fake catalog site. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockCatalog {
    state: Arc<Mutex<MockState>>,
}

impl MockCatalog {
    /// Create a mock with no routes; every request fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock serving both entry pages, the handshake and an empty search.
    pub fn standard() -> Self {
        let catalog = Self::new();
        for page in ["default.aspx", "advanced.aspx"] {
            let target = format!("/{}", page);
            catalog.route("GET", &target, None, &user_type_page(page));
            catalog.route("POST", &target, Some("btnSubmitUserType"), &search_form_page(page));
            catalog.route("POST", &target, Some("btnDoIt"), &no_results_page());
        }
        catalog
    }

    /// Serve `response` for `method` on `target` (a path, optionally with query).
    ///
    /// Later routes take precedence, so tests can override the defaults.
    pub fn route(&self, method: &str, target: &str, body_contains: Option<&str>, response: &str) {
        let mut state = self.state.lock().unwrap();
        state.routes.push(Route {
            method: method.to_uppercase(),
            target: target.to_string(),
            body_contains: body_contains.map(str::to_string),
            response: response.to_string(),
        });
    }

    /// Answer any search post mentioning `needle` with `response`
    pub fn on_search(&self, needle: &str, response: &str) {
        for page in ["default.aspx", "advanced.aspx"] {
            self.route("POST", &format!("/{}", page), Some(needle), response);
        }
    }

    /// Fail the next `times` posts whose body contains `needle`
    pub fn fail_posts_containing(&self, needle: &str, times: usize) {
        let mut state = self.state.lock().unwrap();
        state.failures.push(Failure {
            needle: needle.to_string(),
            remaining: times,
        });
    }

    /// Number of transports handed out
    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// `(target, body)` of every POST, in order
    pub fn posts(&self) -> Vec<(String, String)> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "POST")
            .map(|r| (r.target, r.body))
            .collect()
    }

    /// Number of search submissions seen
    pub fn search_count(&self) -> usize {
        self.posts()
            .iter()
            .filter(|(_, body)| body.contains("btnDoIt"))
            .count()
    }

    fn respond(&self, method: &str, url: &Url, body: String) -> Result<Page, CatalogError> {
        let target = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };

        let mut state = self.state.lock().unwrap();
        state.requests.push(RecordedRequest {
            method: method.to_string(),
            target: target.clone(),
            body: body.clone(),
        });

        if method == "POST" {
            if let Some(failure) = state
                .failures
                .iter_mut()
                .find(|f| f.remaining > 0 && body.contains(&f.needle))
            {
                failure.remaining -= 1;
                return Err(CatalogError::TransientSearchFault(
                    "connection reset by peer".to_string(),
                ));
            }
        }

        let route = state.routes.iter().rev().find(|r| {
            r.method == method
                && (r.target == target || r.target == url.path())
                && r.body_contains
                    .as_deref()
                    .map_or(true, |needle| body.contains(needle))
        });

        match route {
            Some(route) => Ok(Page::new(url.clone(), route.response.clone())),
            None => Err(CatalogError::TransientSearchFault(format!(
                "catalog returned status 404 Not Found for {}",
                url
            ))),
        }
    }
}

impl Connector for MockCatalog {
    fn connect(&self) -> Result<Arc<dyn Transport>, CatalogError> {
        self.state.lock().unwrap().connects += 1;
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl Transport for MockCatalog {
    async fn get(&self, url: &Url) -> Result<Page, CatalogError> {
        self.respond("GET", url, String::new())
    }

    async fn post_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<Page, CatalogError> {
        let body = fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");
        self.respond("POST", url, body)
    }
}

/// Entry page with the user-type form
pub fn user_type_page(action: &str) -> String {
    format!(
        r#"<html><body>
<form name="form1" method="post" action="{action}" id="form1">
  <input type="hidden" name="__VIEWSTATE" value="ut-state">
  <input type="radio" name="radUserType" value="radStudent" checked>
  <input type="radio" name="radUserType" value="radTeacher">
  <input type="radio" name="radUserType" value="radParent">
  <input type="radio" name="radUserType" value="radLibrarian">
  <input type="submit" name="btnSubmitUserType" value="Submit">
</form>
</body></html>"#
    )
}

/// Page served after the handshake, carrying the search form
pub fn search_form_page(action: &str) -> String {
    format!(
        r#"<html><body>
<form name="aspnetForm" method="post" action="{action}" id="aspnetForm">
  <input type="hidden" name="__VIEWSTATE" value="search-state">
  <input type="hidden" name="__EVENTVALIDATION" value="search-validation">
  <input type="text" name="ctl00$ContentPlaceHolder1$txtKeyWords">
  <input type="text" name="ctl00$ContentPlaceHolder1$txtTitle">
  <input type="text" name="ctl00$ContentPlaceHolder1$txtAuthor">
  <select name="ctl00$ContentPlaceHolder1$ddlSortOrder">
    <option value="Relevance" selected>Relevance</option>
    <option value="Title">Title</option>
  </select>
  <input type="submit" name="ctl00$ContentPlaceHolder1$btnDoIt" value="Search">
</form>
</body></html>"#
    )
}

/// Page with a populated "no results" marker
pub fn no_results_page() -> String {
    r#"<html><body>
<span id="ctl00_ContentPlaceHolder1_lblNoResults">No books found matching your search.</span>
</body></html>"#
        .to_string()
}

/// One `table.book-result` block
pub fn result_block(title: &str, author: &str, detail_href: &str, meta: &str) -> String {
    format!(
        r#"<table class="book-result"><tr>
  <td class="book-image"><img src="cover.jpg"></td>
  <td class="book-detail">
    <a href="{detail_href}">{title}</a>
    <p>{author}<br>
    {meta}</p>
  </td>
</tr></table>"#
    )
}

/// Result page holding `blocks` plus an empty "no results" marker
pub fn results_page(blocks: &[String]) -> String {
    format!(
        r#"<html><body>
<span id="ctl00_ContentPlaceHolder1_lblNoResults"></span>
{}
</body></html>"#,
        blocks.join("\n")
    )
}

/// Book detail sub-page
pub fn detail_page(series: &[&str], word_count: &str, year: &str, isbn: &str) -> String {
    let series: String = series
        .iter()
        .map(|s| {
            format!(
                r#"<span id="ctl00_ContentPlaceHolder1_ucBookDetail_lblSeriesLabel">{s};</span>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="book-detail">
{series}
<span id="ctl00_ContentPlaceHolder1_ucBookDetail_lblWordCount">{word_count}</span>
<span id="ctl00_ContentPlaceHolder1_ucBookDetail_lblPublicationYear">{year}</span>
<span id="ctl00_ContentPlaceHolder1_ucBookDetail_lblISBN">{isbn}</span>
</div></body></html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_and_recording() {
        let catalog = MockCatalog::standard();
        let url = base_url().join("default.aspx").unwrap();

        let page = catalog.get(&url).await.unwrap();
        assert!(page.body.contains("btnSubmitUserType"));

        let fields = vec![("btnSubmitUserType".to_string(), "Submit".to_string())];
        let page = catalog.post_form(&url, &fields).await.unwrap();
        assert!(page.body.contains("aspnetForm"));

        assert_eq!(catalog.request_count(), 2);
        assert_eq!(catalog.posts()[0].1, "btnSubmitUserType=Submit");
    }

    #[tokio::test]
    async fn test_later_routes_win() {
        let catalog = MockCatalog::standard();
        catalog.on_search("Holes", &results_page(&[]));
        let url = base_url().join("advanced.aspx").unwrap();

        let fields = vec![
            ("txtTitle".to_string(), "Holes".to_string()),
            ("btnDoIt".to_string(), "Search".to_string()),
        ];
        let page = catalog.post_form(&url, &fields).await.unwrap();
        assert!(!page.body.contains("No books found"));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let catalog = MockCatalog::standard();
        catalog.fail_posts_containing("btnDoIt", 1);
        let url = base_url().join("default.aspx").unwrap();
        let fields = vec![("btnDoIt".to_string(), "Search".to_string())];

        let err = catalog.post_form(&url, &fields).await.unwrap_err();
        assert!(err.is_transient());
        assert!(catalog.post_form(&url, &fields).await.is_ok());
        assert_eq!(catalog.search_count(), 2);
    }

    #[tokio::test]
    async fn test_unrouted_request_fails() {
        let catalog = MockCatalog::new();
        let url = base_url().join("bookdetail.aspx?q=1").unwrap();
        assert!(catalog.get(&url).await.unwrap_err().is_transient());
    }

    #[test]
    fn test_connect_counts() {
        let catalog = MockCatalog::new();
        let a = catalog.connect().unwrap();
        let b = catalog.connect().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(catalog.connect_count(), 2);
    }
}
