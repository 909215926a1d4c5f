//! Integration tests for bookfind
//!
//! These tests run the real HTTP clients against local mock servers standing
//! in for the bibliographic service, the catalog site and the reranker.

use bookfind::catalog::mock as fixtures;
use bookfind::catalog::{CatalogError, HttpConnector, SearchExecutor, SessionManager};
use bookfind::config::Config;
use bookfind::lookup::{BibliographicLookup, OpenLibraryClient};
use bookfind::models::{Candidate, ScannedItem, SearchMode, SearchQuery};
use bookfind::rerank::{rerank_or_fallback, ChatReranker, Reranker};
use bookfind::utils::HttpSettings;
use bookfind::Aggregator;
use mockito::{Matcher, Server, ServerGuard};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

fn base_url(server: &ServerGuard) -> Url {
    Url::parse(&format!("{}/", server.url())).unwrap()
}

fn test_settings() -> HttpSettings {
    HttpSettings::default().with_timeout(Duration::from_secs(5))
}

fn lookup_client(server: &ServerGuard) -> OpenLibraryClient {
    OpenLibraryClient::with_settings(base_url(server), &test_settings()).unwrap()
}

fn test_config(server: &ServerGuard) -> Config {
    let mut config = Config::default();
    config.catalog.base_url = base_url(server).to_string();
    config.catalog.timeout_secs = 5;
    config.lookup.base_url = base_url(server).to_string();
    config.lookup.timeout_secs = 5;
    config.rerank.enabled = false;
    config
}

/// Mount the entry page and handshake for one catalog mode
async fn mount_handshake(server: &mut ServerGuard, page: &str) -> (mockito::Mock, mockito::Mock) {
    let path = format!("/{}", page);
    let entry = server
        .mock("GET", path.as_str())
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_header("set-cookie", "ASP.NET_SessionId=abc123; path=/")
        .with_body(fixtures::user_type_page(page))
        .create_async()
        .await;
    let handshake = server
        .mock("POST", path.as_str())
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("btnSubmitUserType".to_string()),
            Matcher::Regex("radParent".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(fixtures::search_form_page(page))
        .create_async()
        .await;
    (entry, handshake)
}

#[tokio::test]
async fn test_lookup_search_parses_and_dedups() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/search.json")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "charlotte's web".into()),
            Matcher::UrlEncoded("language".into(), "eng".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"numFound": 4, "docs": [
                {"title": "Charlotte's Web", "author_name": ["E. B. White"]},
                {"title": "Charlotte's Web", "author_name": ["E. B. White"]},
                {"title": "Charlotte's Web Activity Book"},
                {"author_name": ["No Title"]}
            ]}"#,
        )
        .create_async()
        .await;

    let candidates = lookup_client(&server).search_by_text("charlotte's web").await;

    mock.assert_async().await;
    assert_eq!(
        candidates,
        vec![
            Candidate::new("Charlotte's Web", "E. B. White"),
            Candidate::new("Charlotte's Web Activity Book", "Unknown Author"),
        ]
    );
}

#[tokio::test]
async fn test_lookup_failures_yield_nothing() {
    let mut server = Server::new_async().await;
    let _error = server
        .mock("GET", "/search.json")
        .match_query(Matcher::UrlEncoded("q".into(), "broken".into()))
        .with_status(503)
        .create_async()
        .await;
    let _garbage = server
        .mock("GET", "/search.json")
        .match_query(Matcher::UrlEncoded("q".into(), "garbage".into()))
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let client = lookup_client(&server);
    assert!(client.search_by_text("broken").await.is_empty());
    assert!(client.search_by_text("garbage").await.is_empty());
    assert!(client.try_search_by_text("broken").await.is_err());
}

#[tokio::test]
async fn test_lookup_by_isbn() {
    let mut server = Server::new_async().await;
    let found = server
        .mock("GET", "/api/books")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("bibkeys".into(), "ISBN:9780064400558".into()),
            Matcher::UrlEncoded("format".into(), "json".into()),
            Matcher::UrlEncoded("jscmd".into(), "data".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"ISBN:9780064400558": {
                "title": "Charlotte's Web",
                "authors": [{"name": "E. B. White", "url": "https://openlibrary.org/authors/OL1A"}]
            }}"#,
        )
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/api/books")
        .match_query(Matcher::UrlEncoded("bibkeys".into(), "ISBN:9780000000002".into()))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = lookup_client(&server);
    assert_eq!(
        client.search_by_isbn("9780064400558").await,
        Some(Candidate::new("Charlotte's Web", "E. B. White"))
    );
    assert_eq!(client.search_by_isbn("9780000000002").await, None);
    found.assert_async().await;
}

#[tokio::test]
async fn test_chat_reranker_parses_fenced_reply() {
    let mut server = Server::new_async().await;
    let reply = serde_json::json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": "```json\n[{\"title\": \"The Philosopher's Stone\", \"author\": \"J. K. Rowling\"}, {\"title\": \"The Chamber of Secrets\", \"author\": \"J. K. Rowling\"}]\n```"
            }
        }]
    });
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "gpt-4o-mini"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(reply.to_string())
        .create_async()
        .await;

    let reranker = ChatReranker::with_settings("sk-test", &test_settings())
        .unwrap()
        .with_endpoint(format!("{}/v1/chat/completions", server.url()));
    let input = vec![
        Candidate::new("The Chamber of Secrets", "J. K. Rowling"),
        Candidate::new("The Philosopher's Stone", "J. K. Rowling"),
    ];

    let output = reranker.rerank("harry potter", &input).await.unwrap();
    mock.assert_async().await;
    assert_eq!(output[0].title, "The Philosopher's Stone");
    assert_eq!(output[1].title, "The Chamber of Secrets");
}

#[tokio::test]
async fn test_chat_reranker_error_falls_back() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_body(r#"{"error": {"message": "rate limited"}}"#)
        .create_async()
        .await;

    let reranker = ChatReranker::with_settings("sk-test", &test_settings())
        .unwrap()
        .with_endpoint(format!("{}/v1/chat/completions", server.url()));
    let input = vec![Candidate::new("Holes", "Louis Sachar")];

    assert!(reranker.rerank("holes", &input).await.is_err());
    let output = rerank_or_fallback(&reranker, "holes", input.clone()).await;
    assert_eq!(output, input);
}

#[tokio::test]
async fn test_catalog_session_and_search_over_http() {
    let mut server = Server::new_async().await;
    let (entry, handshake) = mount_handshake(&mut server, "advanced.aspx").await;

    let search = server
        .mock("POST", "/advanced.aspx")
        .match_header("cookie", Matcher::Regex("ASP.NET_SessionId=abc123".to_string()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("btnDoIt".to_string()),
            Matcher::Regex("__VIEWSTATE=search-state".to_string()),
            Matcher::Regex("Matilda".to_string()),
        ]))
        .with_status(200)
        .with_body(fixtures::results_page(&[fixtures::result_block(
            "Matilda",
            "Roald Dahl",
            "bookdetail.aspx?q=42",
            "BL: 5.0 IL: MY AR Pts: 10.0",
        )]))
        .expect(2)
        .create_async()
        .await;
    let detail = server
        .mock("GET", "/bookdetail.aspx")
        .match_query(Matcher::UrlEncoded("q".into(), "42".into()))
        .with_status(200)
        .with_body(fixtures::detail_page(&["Dahl Classics"], "40,090", "1988", "978-0-14-241037-0"))
        .expect(2)
        .create_async()
        .await;

    let connector = HttpConnector::new(test_settings());
    let sessions = Arc::new(SessionManager::new(Arc::new(connector), base_url(&server)));
    let executor = SearchExecutor::new(sessions.clone());
    let query = SearchQuery::new().title("Matilda").author("Roald Dahl");

    for _ in 0..2 {
        let records = executor.search(SearchMode::Advanced, &query).await.unwrap();
        assert_eq!(records.len(), 1);
        let matilda = &records[0];
        assert!(matilda.in_catalog);
        assert_eq!(matilda.reading_level, 5.0);
        assert_eq!(matilda.interest_level, "9y-13y");
        assert_eq!(matilda.point_value, 10.0);
        assert_eq!(matilda.word_count, 40_090);
        assert_eq!(matilda.published_year, 1988);
        assert_eq!(matilda.series.as_deref(), Some("Dahl Classics"));
        assert_eq!(matilda.isbn.as_deref(), Some("9780142410370"));
    }

    // One handshake serves both searches
    assert_eq!(sessions.handshake_count(), 1);
    entry.assert_async().await;
    handshake.assert_async().await;
    search.assert_async().await;
    detail.assert_async().await;
}

#[tokio::test]
async fn test_catalog_server_error_resets_once() {
    let mut server = Server::new_async().await;
    let _handshake = mount_handshake(&mut server, "default.aspx").await;
    let failing = server
        .mock("POST", "/default.aspx")
        .match_body(Matcher::Regex("btnDoIt".to_string()))
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let connector = HttpConnector::new(test_settings());
    let sessions = Arc::new(SessionManager::new(Arc::new(connector), base_url(&server)));
    let executor = SearchExecutor::new(sessions.clone());

    let err = executor
        .search(SearchMode::Basic, &SearchQuery::keywords("holes"))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::SearchExecutionFailed { .. }));
    assert_eq!(sessions.handshake_count(), 2);

    failing.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_catalog_is_setup_failure() {
    let mut server = Server::new_async().await;
    let _entry = server
        .mock("GET", "/advanced.aspx")
        .with_status(503)
        .create_async()
        .await;

    let connector = HttpConnector::new(test_settings());
    let sessions = SessionManager::new(Arc::new(connector), base_url(&server));
    let err = sessions.get(SearchMode::Advanced).await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::SessionSetupFailed {
            mode: SearchMode::Advanced,
            ..
        }
    ));
}

#[tokio::test]
async fn test_blank_query_makes_no_requests() {
    let mut server = Server::new_async().await;
    let any_get = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let any_post = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let aggregator = Aggregator::from_config(&test_config(&server)).unwrap();
    assert!(aggregator.search_by_text("   ").await.unwrap().is_empty());
    assert!(aggregator.search_by_text("\u{201C}\u{201D}").await.unwrap().is_empty());

    any_get.assert_async().await;
    any_post.assert_async().await;
}

#[tokio::test]
async fn test_charlottes_web_end_to_end() {
    let mut server = Server::new_async().await;
    let lookup = server
        .mock("GET", "/search.json")
        .match_query(Matcher::UrlEncoded("q".into(), "\"Charlotte's Web\"".into()))
        .with_status(200)
        .with_body(
            r#"{"docs": [
                {"title": "Charlotte's Web", "author_name": ["E. B. White"]},
                {"title": "Charlotte's Web", "author_name": ["E. B. White"]}
            ]}"#,
        )
        .expect(1)
        .create_async()
        .await;
    let _handshake = mount_handshake(&mut server, "advanced.aspx").await;
    let search = server
        .mock("POST", "/advanced.aspx")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("btnDoIt".to_string()),
            Matcher::Regex("Charlotte".to_string()),
        ]))
        .with_status(200)
        .with_body(fixtures::results_page(&[fixtures::result_block(
            "Charlotte's Web",
            "E. B. White",
            "bookdetail.aspx?q=7",
            "BL: 4.4 IL: MY AR Pts: 5.0",
        )]))
        .expect(1)
        .create_async()
        .await;
    let _detail = server
        .mock("GET", "/bookdetail.aspx")
        .match_query(Matcher::UrlEncoded("q".into(), "7".into()))
        .with_status(200)
        .with_body(fixtures::detail_page(&[], "32,000", "1952", "9780064400558"))
        .create_async()
        .await;

    let aggregator = Aggregator::from_config(&test_config(&server)).unwrap();
    let records = aggregator.search_by_text("Charlotte\u{2019}s Web").await.unwrap();

    lookup.assert_async().await;
    search.assert_async().await;
    assert_eq!(records.len(), 1);
    assert!(records[0].in_catalog);
    assert_eq!(records[0].title, "Charlotte's Web");
    assert_eq!(records[0].author, "E. B. White");
    assert_eq!(records[0].reading_level, 4.4);
    assert_eq!(records[0].word_count, 32_000);
}

#[tokio::test]
async fn test_scanned_isbn_not_in_catalog_becomes_placeholder() {
    let mut server = Server::new_async().await;
    let _isbn = server
        .mock("GET", "/api/books")
        .match_query(Matcher::UrlEncoded("bibkeys".into(), "ISBN:9780142410370".into()))
        .with_status(200)
        .with_body(r#"{"ISBN:9780142410370": {"title": "Matilda", "authors": [{"name": "Roald Dahl"}]}}"#)
        .create_async()
        .await;
    let _handshake = mount_handshake(&mut server, "advanced.aspx").await;
    let _search = server
        .mock("POST", "/advanced.aspx")
        .match_body(Matcher::Regex("btnDoIt".to_string()))
        .with_status(200)
        .with_body(fixtures::no_results_page())
        .create_async()
        .await;

    let aggregator = Aggregator::from_config(&test_config(&server)).unwrap();
    let items = vec![
        ScannedItem::Isbn("9780142410370".to_string()),
        ScannedItem::Isbn("1234567890123".to_string()),
    ];
    let records = aggregator.search_scanned(&items).await.unwrap();

    assert_eq!(records.len(), 1);
    assert!(records[0].is_placeholder());
    assert_eq!(records[0].title, "Matilda");
    assert_eq!(records[0].author, "Roald Dahl");
}
