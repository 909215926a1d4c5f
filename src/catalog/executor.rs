//! Form submission against an established session.
//!
//! One [`SearchExecutor`] serves both modes; the mode-specific part is the
//! [`FormFiller`] that maps a [`SearchQuery`] onto the remote field names.

use std::sync::Arc;

use super::extract::{has_no_results_marker, Extractor};
use super::form::HtmlForm;
use super::session::{SessionHandle, SessionManager};
use super::CatalogError;
use crate::models::{BookRecord, SearchMode, SearchQuery};

/// Remote form and control names
pub mod fields {
    pub const SEARCH_FORM: &str = "aspnetForm";
    pub const SUBMIT: &str = "ctl00$ContentPlaceHolder1$btnDoIt";

    pub const KEYWORDS: &str = "ctl00$ContentPlaceHolder1$txtKeyWords";
    pub const ISBN: &str = "ctl00$ContentPlaceHolder1$txtISBN";
    pub const TITLE: &str = "ctl00$ContentPlaceHolder1$txtTitle";
    pub const AUTHOR: &str = "ctl00$ContentPlaceHolder1$txtAuthor";
    pub const SERIES: &str = "ctl00$ContentPlaceHolder1$txtSeries";
    pub const PUBLISHER: &str = "ctl00$ContentPlaceHolder1$txtPublisher";
    pub const LEVEL_MIN: &str = "ctl00$ContentPlaceHolder1$txtBLFrom";
    pub const LEVEL_MAX: &str = "ctl00$ContentPlaceHolder1$txtBLTo";
    pub const INTEREST: &str = "ctl00$ContentPlaceHolder1$ddlInterestLevel";
    pub const QUIZ_TYPE: &str = "ctl00$ContentPlaceHolder1$ddlQuizType";
    pub const RECENCY: &str = "ctl00$ContentPlaceHolder1$ddlDateAdded";
    pub const SORT: &str = "ctl00$ContentPlaceHolder1$ddlSortOrder";

    /// Controls a query may fill; left blank they are not submitted
    pub const QUERY: [&str; 12] = [
        KEYWORDS, ISBN, TITLE, AUTHOR, SERIES, PUBLISHER, LEVEL_MIN, LEVEL_MAX, INTEREST,
        QUIZ_TYPE, RECENCY, SORT,
    ];
}

/// Strategy mapping a query onto one mode's search form
pub trait FormFiller: Send + Sync {
    fn fill(&self, form: &mut HtmlForm, query: &SearchQuery);
}

fn set_text(form: &mut HtmlForm, field: &str, value: Option<&String>) {
    if let Some(value) = value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        form.set(field, value);
    }
}

/// Quick search: keywords and ISBN only
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicFormFiller;

impl FormFiller for BasicFormFiller {
    fn fill(&self, form: &mut HtmlForm, query: &SearchQuery) {
        set_text(form, fields::KEYWORDS, query.keywords.as_ref());
        set_text(form, fields::ISBN, query.isbn.as_ref());
    }
}

/// Advanced search: every structured field
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvancedFormFiller;

impl FormFiller for AdvancedFormFiller {
    fn fill(&self, form: &mut HtmlForm, query: &SearchQuery) {
        set_text(form, fields::KEYWORDS, query.keywords.as_ref());
        set_text(form, fields::TITLE, query.title.as_ref());
        set_text(form, fields::AUTHOR, query.author.as_ref());
        set_text(form, fields::SERIES, query.series.as_ref());
        set_text(form, fields::PUBLISHER, query.publisher.as_ref());
        set_text(form, fields::ISBN, query.isbn.as_ref());
        set_text(form, fields::INTEREST, query.interest_level.as_ref());

        if let Some(min) = query.level_min {
            form.set(fields::LEVEL_MIN, min.to_string());
        }
        if let Some(max) = query.level_max {
            form.set(fields::LEVEL_MAX, max.to_string());
        }
        if let Some(quiz) = query.quiz_type {
            form.set(fields::QUIZ_TYPE, quiz.form_value());
        }
        if let Some(days) = query.recency_days {
            form.set(fields::RECENCY, days.to_string());
        }
        if let Some(sort) = query.sort {
            form.set(fields::SORT, sort.form_value());
        }
    }
}

/// The filler matching `mode`'s form
pub fn filler_for(mode: SearchMode) -> &'static dyn FormFiller {
    match mode {
        SearchMode::Basic => &BasicFormFiller,
        SearchMode::Advanced => &AdvancedFormFiller,
    }
}

/// Submits queries through the session manager
#[derive(Debug, Clone)]
pub struct SearchExecutor {
    sessions: Arc<SessionManager>,
    extractor: Extractor,
}

impl SearchExecutor {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            extractor: Extractor::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Run `query` in `mode` with the mode's default filler
    pub async fn search(
        &self,
        mode: SearchMode,
        query: &SearchQuery,
    ) -> Result<Vec<BookRecord>, CatalogError> {
        self.execute(mode, query, filler_for(mode)).await
    }

    /// Submit `query` on `mode`'s session.
    ///
    /// A transient fault resets the session and retries exactly once; a
    /// second failure is reported as [`CatalogError::SearchExecutionFailed`].
    /// The mode's session stays locked for the whole call.
    pub async fn execute(
        &self,
        mode: SearchMode,
        query: &SearchQuery,
        filler: &dyn FormFiller,
    ) -> Result<Vec<BookRecord>, CatalogError> {
        tracing::info!(%mode, "Executing catalog search");
        let mut lease = self.sessions.lease(mode).await;

        let handle = lease.current().await?.clone();
        let first = match self.attempt(&handle, query, filler).await {
            Ok(records) => return Ok(records),
            Err(e) if e.is_transient() => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(%mode, error = %first, "Search failed, resetting session and retrying");
        let handle = lease.reset().await?.clone();

        self.attempt(&handle, query, filler).await.map_err(|e| {
            tracing::error!(%mode, error = %e, "Search failed after session reset");
            CatalogError::SearchExecutionFailed {
                mode,
                reason: e.to_string(),
            }
        })
    }

    async fn attempt(
        &self,
        handle: &SessionHandle,
        query: &SearchQuery,
        filler: &dyn FormFiller,
    ) -> Result<Vec<BookRecord>, CatalogError> {
        let base = handle.base_page();
        let (action, params) = {
            let html = base.html();
            let mut form = HtmlForm::find(&html, &base.url, fields::SEARCH_FORM).ok_or_else(|| {
                CatalogError::TransientSearchFault("search form not found on session page".into())
            })?;
            filler.fill(&mut form, query);
            form.omit_blank(&fields::QUERY);
            let params = form.submission(fields::SUBMIT).ok_or_else(|| {
                CatalogError::TransientSearchFault("search submit control not found".into())
            })?;
            (form.action().clone(), params)
        };

        let transport = handle.transport();
        let page = transport.post_form(&action, &params).await?;

        let empty = {
            let html = page.html();
            has_no_results_marker(&html)
        };
        if empty {
            tracing::debug!(mode = %handle.mode(), "Catalog reported no results");
            return Ok(Vec::new());
        }

        let records = self.extractor.extract(transport.as_ref(), &page).await;
        tracing::info!(mode = %handle.mode(), count = records.len(), "Catalog search complete");
        Ok(records)
    }
}
