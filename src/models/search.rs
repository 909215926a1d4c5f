//! Search request models.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::book::{Candidate, UNKNOWN_AUTHOR};

/// Which catalog search form (and therefore which session) a query goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Quick search: free-text keywords or ISBN
    Basic,
    /// Advanced search: title, author, series and filters
    Advanced,
}

impl SearchMode {
    /// Entry page, relative to the catalog base URL
    pub fn entry_page(&self) -> &'static str {
        match self {
            SearchMode::Basic => "default.aspx",
            SearchMode::Advanced => "advanced.aspx",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Basic => "basic",
            SearchMode::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quiz type filter for the advanced form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    ReadingPractice,
    Vocabulary,
    LiteracySkills,
}

impl QuizType {
    /// Value posted in the quiz-type drop-down
    pub fn form_value(&self) -> &'static str {
        match self {
            QuizType::ReadingPractice => "RP",
            QuizType::Vocabulary => "VP",
            QuizType::LiteracySkills => "LS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rp" | "reading_practice" | "reading-practice" => Some(QuizType::ReadingPractice),
            "vp" | "vocabulary" => Some(QuizType::Vocabulary),
            "ls" | "literacy_skills" | "literacy-skills" => Some(QuizType::LiteracySkills),
            _ => None,
        }
    }
}

/// Result ordering requested from the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Relevance,
    Title,
    Author,
    Level,
    Points,
}

impl SortOrder {
    /// Value posted in the sort drop-down
    pub fn form_value(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "Relevance",
            SortOrder::Title => "Title",
            SortOrder::Author => "Author",
            SortOrder::Level => "BookLevel",
            SortOrder::Points => "Points",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "relevance" => Some(SortOrder::Relevance),
            "title" => Some(SortOrder::Title),
            "author" => Some(SortOrder::Author),
            "level" | "booklevel" => Some(SortOrder::Level),
            "points" => Some(SortOrder::Points),
            _ => None,
        }
    }
}

/// Structured catalog query.
///
/// Every parameter is optional; blank strings are treated as unset so they
/// never reach the remote form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text keywords (basic form)
    pub keywords: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub series: Option<String>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    /// Lower reading-level bound
    pub level_min: Option<f32>,
    /// Upper reading-level bound
    pub level_max: Option<f32>,
    /// Interest band code (e.g. "MY")
    pub interest_level: Option<String>,
    pub quiz_type: Option<QuizType>,
    /// Only books added within this many days
    pub recency_days: Option<u32>,
    pub sort: Option<SortOrder>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-text query for the basic form
    pub fn keywords(text: impl Into<String>) -> Self {
        Self {
            keywords: Some(text.into()),
            ..Default::default()
        }
    }

    /// Title/author probe for the advanced form; an unknown author is left unset
    pub fn for_candidate(candidate: &Candidate) -> Self {
        let author = Some(candidate.author.clone()).filter(|a| a != UNKNOWN_AUTHOR);
        Self {
            title: Some(candidate.title.clone()),
            author,
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn level_range(mut self, min: Option<f32>, max: Option<f32>) -> Self {
        self.level_min = min;
        self.level_max = max;
        self
    }

    pub fn interest_level(mut self, code: impl Into<String>) -> Self {
        self.interest_level = Some(code.into());
        self
    }

    pub fn quiz_type(mut self, quiz_type: QuizType) -> Self {
        self.quiz_type = Some(quiz_type);
        self
    }

    pub fn recency_days(mut self, days: u32) -> Self {
        self.recency_days = Some(days);
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Build a query from loosely-typed field names.
    ///
    /// Unrecognized names and unparseable values are ignored.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let mut query = Self::default();
        for (name, value) in fields {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match name.to_lowercase().as_str() {
                "keywords" | "q" | "query" => query.keywords = Some(value.to_string()),
                "title" => query.title = Some(value.to_string()),
                "author" => query.author = Some(value.to_string()),
                "series" => query.series = Some(value.to_string()),
                "publisher" => query.publisher = Some(value.to_string()),
                "isbn" => query.isbn = Some(value.to_string()),
                "level_min" | "bl_min" => query.level_min = value.parse().ok(),
                "level_max" | "bl_max" => query.level_max = value.parse().ok(),
                "interest_level" | "il" => query.interest_level = Some(value.to_uppercase()),
                "quiz_type" => query.quiz_type = QuizType::parse(value),
                "recency_days" | "recency" => query.recency_days = value.parse().ok(),
                "sort" => query.sort = SortOrder::parse(value),
                other => tracing::debug!(field = other, "Ignoring unrecognized search field"),
            }
        }
        query
    }

    /// Whether no parameter carries a value
    pub fn is_empty(&self) -> bool {
        let blank = |s: &Option<String>| s.as_deref().map_or(true, |v| v.trim().is_empty());
        blank(&self.keywords)
            && blank(&self.title)
            && blank(&self.author)
            && blank(&self.series)
            && blank(&self.publisher)
            && blank(&self.isbn)
            && blank(&self.interest_level)
            && self.level_min.is_none()
            && self.level_max.is_none()
            && self.quiz_type.is_none()
            && self.recency_days.is_none()
            && self.sort.is_none()
    }
}

/// An item produced by the barcode scanner: a bare ISBN or a resolved pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScannedItem {
    Isbn(String),
    Pair(Candidate),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_entry_pages() {
        assert_eq!(SearchMode::Basic.entry_page(), "default.aspx");
        assert_eq!(SearchMode::Advanced.entry_page(), "advanced.aspx");
        assert_eq!(SearchMode::Advanced.to_string(), "advanced");
    }

    #[test]
    fn test_for_candidate_leaves_unknown_author_unset() {
        let known = SearchQuery::for_candidate(&Candidate::new("Holes", "Louis Sachar"));
        assert_eq!(known.title.as_deref(), Some("Holes"));
        assert_eq!(known.author.as_deref(), Some("Louis Sachar"));

        let unknown = SearchQuery::for_candidate(&Candidate::new("Holes", UNKNOWN_AUTHOR));
        assert_eq!(unknown.title.as_deref(), Some("Holes"));
        assert_eq!(unknown.author, None);
    }

    #[test]
    fn test_from_fields_recognized_names() {
        let mut fields = HashMap::new();
        fields.insert("Title".to_string(), "Matilda".to_string());
        fields.insert("author".to_string(), "Roald Dahl".to_string());
        fields.insert("level_min".to_string(), "3.5".to_string());
        fields.insert("il".to_string(), "my".to_string());
        fields.insert("sort".to_string(), "points".to_string());
        fields.insert("color".to_string(), "blue".to_string());
        fields.insert("series".to_string(), "   ".to_string());

        let query = SearchQuery::from_fields(&fields);
        assert_eq!(query.title.as_deref(), Some("Matilda"));
        assert_eq!(query.author.as_deref(), Some("Roald Dahl"));
        assert_eq!(query.level_min, Some(3.5));
        assert_eq!(query.interest_level.as_deref(), Some("MY"));
        assert_eq!(query.sort, Some(SortOrder::Points));
        assert_eq!(query.series, None);
    }

    #[test]
    fn test_from_fields_bad_numbers_ignored() {
        let mut fields = HashMap::new();
        fields.insert("level_max".to_string(), "high".to_string());
        fields.insert("recency_days".to_string(), "-3".to_string());
        let query = SearchQuery::from_fields(&fields);
        assert!(query.is_empty());
    }

    #[test]
    fn test_is_empty_treats_blank_as_unset() {
        assert!(SearchQuery::new().is_empty());
        assert!(SearchQuery::new().title("  ").is_empty());
        assert!(!SearchQuery::keywords("gruffalo").is_empty());
        assert!(!SearchQuery::new().quiz_type(QuizType::Vocabulary).is_empty());
    }

    #[test]
    fn test_scanned_item_deserializes_both_shapes() {
        let items: Vec<ScannedItem> = serde_json::from_str(
            r#"["9780064400558", {"title": "Holes", "author": "Louis Sachar"}]"#,
        )
        .unwrap();
        assert_eq!(items[0], ScannedItem::Isbn("9780064400558".to_string()));
        assert_eq!(
            items[1],
            ScannedItem::Pair(Candidate::new("Holes", "Louis Sachar"))
        );
    }
}
