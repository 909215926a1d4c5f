//! Book record model shared by the catalog and the aggregator.

use serde::{Deserialize, Serialize};

/// Author used when a source omits one
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Interest label used when no band could be recovered
pub const UNKNOWN_INTEREST: &str = "Unknown";

/// Interest band codes printed by the catalog, with their age-range labels.
///
/// Codes outside this table map to [`UNKNOWN_INTEREST`].
const INTEREST_BANDS: &[(&str, &str)] = &[
    ("LY", "5y-8y"),
    ("MY", "9y-13y"),
    ("MY+", "12y+"),
    ("UY", "14y+"),
];

/// Map an interest band code (e.g. `"MY"`) to its age-range label
pub fn interest_label(code: &str) -> &'static str {
    let code = code.trim();
    INTEREST_BANDS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN_INTEREST)
}

/// All interest band codes the catalog's search form accepts
pub fn interest_codes() -> impl Iterator<Item = &'static str> {
    INTEREST_BANDS.iter().map(|(code, _)| *code)
}

/// A `{title, author}` pair as returned by the bibliographic service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub author: String,
}

impl Candidate {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }
}

/// A children's book with its reading metadata.
///
/// Records with `in_catalog == false` are placeholders built from
/// bibliographic data only; every catalog field on them is left at its
/// zero value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Book title
    pub title: String,

    /// Primary author
    pub author: String,

    /// Series name(s), comma-separated when the book belongs to several
    pub series: Option<String>,

    /// Year of publication (0 = unknown)
    pub published_year: u32,

    /// ISBN as printed on the catalog detail page
    pub isbn: Option<String>,

    /// Book level (0.0 = unknown)
    pub reading_level: f32,

    /// Age-band label, or "Unknown"
    pub interest_level: String,

    /// Quiz point value
    pub point_value: f32,

    /// Word count (0 = unknown)
    pub word_count: u32,

    /// Whether the record was read from the catalog site
    pub in_catalog: bool,
}

impl BookRecord {
    /// Create a catalog record with only title and author set
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            series: None,
            published_year: 0,
            isbn: None,
            reading_level: 0.0,
            interest_level: UNKNOWN_INTEREST.to_string(),
            point_value: 0.0,
            word_count: 0,
            in_catalog: true,
        }
    }

    /// Create a placeholder for a bibliographic hit the catalog does not know
    pub fn placeholder(candidate: &Candidate) -> Self {
        Self {
            in_catalog: false,
            interest_level: String::new(),
            ..Self::new(&candidate.title, &candidate.author)
        }
    }

    /// Whether this record is a placeholder
    pub fn is_placeholder(&self) -> bool {
        !self.in_catalog
    }

    /// The `{title, author}` pair identifying this record
    pub fn candidate(&self) -> Candidate {
        Candidate::new(&self.title, &self.author)
    }
}

/// Builder for catalog-sourced [`BookRecord`]s
#[derive(Debug, Clone)]
pub struct BookRecordBuilder {
    record: BookRecord,
}

impl BookRecordBuilder {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            record: BookRecord::new(title, author),
        }
    }

    pub fn series(mut self, series: impl Into<String>) -> Self {
        let series = series.into();
        if !series.is_empty() {
            self.record.series = Some(series);
        }
        self
    }

    pub fn published_year(mut self, year: u32) -> Self {
        self.record.published_year = year;
        self
    }

    pub fn isbn(mut self, isbn: impl Into<String>) -> Self {
        let isbn = isbn.into();
        if !isbn.is_empty() {
            self.record.isbn = Some(isbn);
        }
        self
    }

    pub fn reading_level(mut self, level: f32) -> Self {
        self.record.reading_level = level.max(0.0);
        self
    }

    pub fn interest_level(mut self, label: impl Into<String>) -> Self {
        self.record.interest_level = label.into();
        self
    }

    pub fn point_value(mut self, points: f32) -> Self {
        self.record.point_value = points.max(0.0);
        self
    }

    pub fn word_count(mut self, count: u32) -> Self {
        self.record.word_count = count;
        self
    }

    pub fn build(self) -> BookRecord {
        self.record
    }
}
