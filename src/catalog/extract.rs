//! Result page extraction.
//!
//! A result page lists books as `table.book-result` blocks. Each block holds
//! a title link to the book's detail sub-page and a descriptive paragraph
//! whose first line is the author and whose remaining text carries
//! `BL:`, `IL:` and `AR Pts:` markers. Series, word count, year and ISBN
//! are only shown on the detail sub-page.
//!
//! Extraction never fails as a whole: a broken block is skipped and a broken
//! field keeps its default.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

use super::transport::{Page, Transport};
use super::CatalogError;
use crate::models::{interest_label, BookRecord, BookRecordBuilder, UNKNOWN_AUTHOR, UNKNOWN_INTEREST};
use crate::utils::normalize_isbn;

const NO_RESULTS_SELECTOR: &str = "span#ctl00_ContentPlaceHolder1_lblNoResults";
const DETAIL_PREFIX: &str = "ctl00_ContentPlaceHolder1_ucBookDetail_";

static LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"BL:\s*(\d+(?:\.\d+)?)").expect("level regex is valid"));
static POINTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"AR Pts:\s*(\d+(?:\.\d+)?)").expect("points regex is valid"));
static INTEREST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"IL:\s*([A-Za-z]+\+?)").expect("interest regex is valid"));
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("year regex is valid"));

/// Values read from a block's descriptive paragraph
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub reading_level: f32,
    pub point_value: f32,
    pub interest_level: String,
}

impl Default for Description {
    fn default() -> Self {
        Self {
            reading_level: 0.0,
            point_value: 0.0,
            interest_level: UNKNOWN_INTEREST.to_string(),
        }
    }
}

/// One `table.book-result` block, before its detail page is read
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBlock {
    pub title: String,
    pub author: String,
    pub detail_url: Option<Url>,
    pub description: Description,
}

/// Fields only shown on the detail sub-page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFields {
    pub series: Option<String>,
    pub word_count: u32,
    pub published_year: u32,
    pub isbn: Option<String>,
}

impl ResultBlock {
    pub fn into_record(self, details: DetailFields) -> BookRecord {
        let mut builder = BookRecordBuilder::new(self.title, self.author)
            .reading_level(self.description.reading_level)
            .point_value(self.description.point_value)
            .interest_level(self.description.interest_level)
            .word_count(details.word_count)
            .published_year(details.published_year);
        if let Some(series) = details.series {
            builder = builder.series(series);
        }
        if let Some(isbn) = details.isbn {
            builder = builder.isbn(isbn);
        }
        builder.build()
    }
}

/// Whether the page carries a non-empty "no results" message
pub fn has_no_results_marker(html: &Html) -> bool {
    let selector = Selector::parse(NO_RESULTS_SELECTOR).expect("static selector is valid");
    html.select(&selector)
        .next()
        .map(|marker| !marker.text().collect::<String>().trim().is_empty())
        .unwrap_or(false)
}

/// Read the `BL:`, `AR Pts:` and `IL:` markers out of descriptive text
pub fn parse_description(text: &str) -> Description {
    let number = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c[1].parse::<f32>().ok())
            .unwrap_or(0.0)
    };

    let interest_level = INTEREST_RE
        .captures(text)
        .map(|c| interest_label(&c[1]))
        .unwrap_or(UNKNOWN_INTEREST)
        .to_string();

    Description {
        reading_level: number(&LEVEL_RE),
        point_value: number(&POINTS_RE),
        interest_level,
    }
}

/// Parse every result block on a page, in document order.
///
/// Blocks without a detail cell or title link are skipped.
pub fn parse_result_blocks(html: &Html, page_url: &Url) -> Vec<ResultBlock> {
    let block_sel = Selector::parse("table.book-result").expect("static selector is valid");
    let cell_sel = Selector::parse("td.book-detail").expect("static selector is valid");
    let link_sel =
        Selector::parse(r#"a[href*="bookdetail.aspx"]"#).expect("static selector is valid");
    let para_sel = Selector::parse("p").expect("static selector is valid");

    let mut blocks = Vec::new();
    for block in html.select(&block_sel) {
        let Some(cell) = block.select(&cell_sel).next() else {
            tracing::debug!("Skipping result block without detail cell");
            continue;
        };
        let Some(link) = cell.select(&link_sel).next() else {
            tracing::debug!("Skipping result block without title link");
            continue;
        };

        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            tracing::debug!("Skipping result block with empty title");
            continue;
        }

        let detail_url = link.value().attr("href").and_then(|href| {
            page_url
                .join(href.trim())
                .map_err(|e| tracing::debug!(href, error = %e, "Unusable detail link"))
                .ok()
        });

        let paragraph = cell.select(&para_sel).next();
        let author = paragraph
            .and_then(first_line)
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        let description = paragraph
            .map(|p| parse_description(&p.text().collect::<Vec<_>>().join("\n")))
            .unwrap_or_default();

        blocks.push(ResultBlock {
            title,
            author,
            detail_url,
            description,
        });
    }
    blocks
}

fn first_line(element: ElementRef<'_>) -> Option<String> {
    element
        .text()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .and_then(|t| t.lines().next())
        .map(|line| line.trim().to_string())
}

fn detail_span_texts(html: &Html, label: &str) -> Vec<String> {
    let selector = Selector::parse(&format!("span#{}{}", DETAIL_PREFIX, label))
        .expect("detail selector is valid");
    html.select(&selector)
        .map(|span| span.text().collect::<String>().trim().to_string())
        .collect()
}

/// Read series, word count, year and ISBN from a detail page
pub fn parse_detail_page(html: &Html) -> Result<DetailFields, CatalogError> {
    let any_detail = Selector::parse(&format!(r#"span[id^="{}"]"#, DETAIL_PREFIX))
        .expect("detail selector is valid");
    if html.select(&any_detail).next().is_none() {
        return Err(CatalogError::MalformedResultPage(
            "detail page has no book detail labels".to_string(),
        ));
    }

    let series: Vec<String> = detail_span_texts(html, "lblSeriesLabel")
        .into_iter()
        .map(|s| s.trim_end_matches(';').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let word_count = detail_span_texts(html, "lblWordCount")
        .first()
        .map(|text| {
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .unwrap_or(0);

    let published_year = detail_span_texts(html, "lblPublicationYear")
        .first()
        .and_then(|text| YEAR_RE.captures(text).and_then(|c| c[1].parse().ok()))
        .unwrap_or(0);

    let isbn = detail_span_texts(html, "lblISBN")
        .into_iter()
        .next()
        .filter(|text| !text.is_empty())
        .map(|text| normalize_isbn(&text).unwrap_or(text));

    Ok(DetailFields {
        series: (!series.is_empty()).then(|| series.join(", ")),
        word_count,
        published_year,
        isbn,
    })
}

/// Turns result pages into [`BookRecord`]s
#[derive(Debug, Clone)]
pub struct Extractor {
    fetch_details: bool,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Extractor {
    /// `fetch_details = false` skips the per-book detail sub-page requests
    pub fn new(fetch_details: bool) -> Self {
        Self { fetch_details }
    }

    /// Extract every book on `page`, fetching detail pages through `transport`
    pub async fn extract(&self, transport: &dyn Transport, page: &Page) -> Vec<BookRecord> {
        let blocks = {
            let html = page.html();
            parse_result_blocks(&html, &page.url)
        };
        tracing::debug!(count = blocks.len(), "Parsed result blocks");

        let mut records = Vec::with_capacity(blocks.len());
        for block in blocks {
            let details = match (&block.detail_url, self.fetch_details) {
                (Some(url), true) => self.fetch_details(transport, url).await,
                _ => DetailFields::default(),
            };
            records.push(block.into_record(details));
        }
        records
    }

    async fn fetch_details(&self, transport: &dyn Transport, url: &Url) -> DetailFields {
        let page = match transport.get(url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Detail page unreachable");
                return DetailFields::default();
            }
        };

        let html = page.html();
        parse_detail_page(&html).unwrap_or_else(|e| {
            tracing::warn!(%url, error = %e, "Detail page unreadable");
            DetailFields::default()
        })
    }
}
