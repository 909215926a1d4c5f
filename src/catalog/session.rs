//! Authenticated catalog sessions, one per search mode.
//!
//! The catalog refuses searches until a visitor has picked a user type on
//! the entry page. A [`SessionHandle`] is the result of that handshake: a
//! browsing agent holding the session cookies plus the page the site served
//! afterwards, which carries the search form.
//!
//! Each mode's handle sits behind its own async mutex. Searches hold the lock
//! for the whole submit-and-read cycle, and resets happen under the same lock,
//! so concurrent callers queue behind an in-flight reset instead of starting
//! their own.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use url::Url;

use super::form::HtmlForm;
use super::transport::{Connector, Page, Transport};
use super::CatalogError;
use crate::models::SearchMode;

/// Name of the user-type selection form on each entry page
pub const USER_TYPE_FORM: &str = "form1";

/// Button submitting the user-type selection
pub const USER_TYPE_BUTTON: &str = "btnSubmitUserType";

/// Radio value for the "parent" user type
pub const DEFAULT_USER_TYPE: &str = "radParent";

/// State of one established catalog session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    mode: SearchMode,
    transport: Arc<dyn Transport>,
    base_page: Page,
    authenticated: bool,
}

impl SessionHandle {
    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Agent carrying this session's cookies
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Page served after the handshake; holds the search form
    pub fn base_page(&self) -> &Page {
        &self.base_page
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// Owns the per-mode session slots
#[derive(Debug)]
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    base_url: Url,
    user_type: String,
    basic: Mutex<Option<SessionHandle>>,
    advanced: Mutex<Option<SessionHandle>>,
    handshakes: AtomicUsize,
}

impl SessionManager {
    /// `base_url` must be the directory holding the entry pages (trailing slash)
    pub fn new(connector: Arc<dyn Connector>, base_url: Url) -> Self {
        Self {
            connector,
            base_url,
            user_type: DEFAULT_USER_TYPE.to_string(),
            basic: Mutex::new(None),
            advanced: Mutex::new(None),
            handshakes: AtomicUsize::new(0),
        }
    }

    /// Override the radio value picked during the handshake
    pub fn with_user_type(mut self, user_type: impl Into<String>) -> Self {
        self.user_type = user_type.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Number of handshakes attempted so far, across both modes
    pub fn handshake_count(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    fn slot(&self, mode: SearchMode) -> &Mutex<Option<SessionHandle>> {
        match mode {
            SearchMode::Basic => &self.basic,
            SearchMode::Advanced => &self.advanced,
        }
    }

    /// Current handle for `mode`, establishing it on first use
    pub async fn get(&self, mode: SearchMode) -> Result<SessionHandle, CatalogError> {
        let mut lease = self.lease(mode).await;
        lease.current().await.cloned()
    }

    /// Discard the handle for `mode` and perform the handshake again
    pub async fn reset(&self, mode: SearchMode) -> Result<SessionHandle, CatalogError> {
        let mut lease = self.lease(mode).await;
        lease.reset().await.cloned()
    }

    /// Exclusive access to `mode`'s session until the lease is dropped
    pub async fn lease(&self, mode: SearchMode) -> SessionLease<'_> {
        SessionLease {
            manager: self,
            mode,
            slot: self.slot(mode).lock().await,
        }
    }

    async fn handshake(&self, mode: SearchMode) -> Result<SessionHandle, CatalogError> {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        tracing::info!(%mode, "Setting up catalog session");

        let entry_url = self
            .base_url
            .join(mode.entry_page())
            .map_err(|e| CatalogError::setup(mode, format!("bad entry URL: {}", e)))?;

        let transport = self
            .connector
            .connect()
            .map_err(|e| CatalogError::setup(mode, e.to_string()))?;

        let entry = transport
            .get(&entry_url)
            .await
            .map_err(|e| CatalogError::setup(mode, format!("entry page unreachable: {}", e)))?;

        // Parse before the next await point
        let (action, params) = {
            let html = entry.html();
            let mut form = HtmlForm::find(&html, &entry.url, USER_TYPE_FORM)
                .ok_or_else(|| CatalogError::setup(mode, "user-type form not found"))?;

            if !form.check_radio(&self.user_type) {
                return Err(CatalogError::setup(
                    mode,
                    format!("user-type option {} not found", self.user_type),
                ));
            }

            if !form.has_button(USER_TYPE_BUTTON) {
                return Err(CatalogError::setup(
                    mode,
                    format!("form {} has no {} button", form.name(), USER_TYPE_BUTTON),
                ));
            }
            let params = form
                .submission(USER_TYPE_BUTTON)
                .ok_or_else(|| CatalogError::setup(mode, "user-type submit button not found"))?;
            (form.action().clone(), params)
        };

        let base_page = transport
            .post_form(&action, &params)
            .await
            .map_err(|e| CatalogError::setup(mode, format!("user-type submission failed: {}", e)))?;

        tracing::info!(%mode, url = %base_page.url, "Catalog session established");

        Ok(SessionHandle {
            mode,
            transport,
            base_page,
            authenticated: true,
        })
    }
}

/// Locked access to one mode's session slot
pub struct SessionLease<'a> {
    manager: &'a SessionManager,
    mode: SearchMode,
    slot: MutexGuard<'a, Option<SessionHandle>>,
}

impl SessionLease<'_> {
    /// Borrow the current handle, running the handshake if there is none
    pub async fn current(&mut self) -> Result<&SessionHandle, CatalogError> {
        if self.slot.is_none() {
            let handle = self.manager.handshake(self.mode).await?;
            *self.slot = Some(handle);
        }
        self.slot
            .as_ref()
            .ok_or_else(|| CatalogError::setup(self.mode, "session slot empty"))
    }

    /// Replace the handle in place with a freshly established one.
    ///
    /// On failure the slot is left empty so the next caller starts clean.
    pub async fn reset(&mut self) -> Result<&SessionHandle, CatalogError> {
        tracing::warn!(mode = %self.mode, "Resetting catalog session");
        *self.slot = None;
        let handle = self.manager.handshake(self.mode).await?;
        *self.slot = Some(handle);
        self.slot
            .as_ref()
            .ok_or_else(|| CatalogError::setup(self.mode, "session slot empty"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::mock::{self, MockCatalog};

    fn manager(catalog: &MockCatalog) -> SessionManager {
        SessionManager::new(Arc::new(catalog.clone()), mock::base_url())
    }

    #[tokio::test]
    async fn test_get_establishes_lazily_and_reuses() {
        let catalog = MockCatalog::standard();
        let sessions = manager(&catalog);
        assert_eq!(sessions.handshake_count(), 0);

        let first = sessions.get(SearchMode::Advanced).await.unwrap();
        assert!(first.is_authenticated());
        assert_eq!(first.mode(), SearchMode::Advanced);
        assert!(first.base_page().body.contains("aspnetForm"));

        let second = sessions.get(SearchMode::Advanced).await.unwrap();
        assert!(Arc::ptr_eq(first.transport(), second.transport()));
        assert_eq!(sessions.handshake_count(), 1);
        assert_eq!(catalog.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_modes_are_independent() {
        let catalog = MockCatalog::standard();
        let sessions = manager(&catalog);

        let basic = sessions.get(SearchMode::Basic).await.unwrap();
        let advanced = sessions.get(SearchMode::Advanced).await.unwrap();
        assert!(!Arc::ptr_eq(basic.transport(), advanced.transport()));
        assert_eq!(basic.base_page().url.path(), "/default.aspx");
        assert_eq!(advanced.base_page().url.path(), "/advanced.aspx");
    }

    #[tokio::test]
    async fn test_handshake_posts_parent_user_type() {
        let catalog = MockCatalog::standard();
        let sessions = manager(&catalog);
        sessions.get(SearchMode::Basic).await.unwrap();

        let posts = catalog.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "/default.aspx");
        assert!(posts[0].1.contains("radParent"));
        assert!(posts[0].1.contains("btnSubmitUserType"));
    }

    #[tokio::test]
    async fn test_reset_replaces_handle() {
        let catalog = MockCatalog::standard();
        let sessions = manager(&catalog);

        let before = sessions.get(SearchMode::Basic).await.unwrap();
        let after = sessions.reset(SearchMode::Basic).await.unwrap();
        assert!(!Arc::ptr_eq(before.transport(), after.transport()));
        assert_eq!(sessions.handshake_count(), 2);

        let current = sessions.get(SearchMode::Basic).await.unwrap();
        assert!(Arc::ptr_eq(after.transport(), current.transport()));
    }

    #[tokio::test]
    async fn test_unreachable_entry_page() {
        let catalog = MockCatalog::new();
        let sessions = manager(&catalog);

        let err = sessions.get(SearchMode::Basic).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::SessionSetupFailed {
                mode: SearchMode::Basic,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_user_type_option() {
        let catalog = MockCatalog::new();
        catalog.route(
            "GET",
            "/default.aspx",
            None,
            r#"<form name="form1" action="default.aspx">
                 <input type="radio" name="ut" value="radStudent">
                 <input type="submit" name="btnSubmitUserType" value="Go">
               </form>"#,
        );
        let sessions = manager(&catalog);

        let err = sessions.get(SearchMode::Basic).await.unwrap_err();
        assert!(err.to_string().contains("radParent"));
        assert!(catalog.posts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_user_type_button() {
        let catalog = MockCatalog::new();
        catalog.route(
            "GET",
            "/advanced.aspx",
            None,
            r#"<form name="form1" action="advanced.aspx">
                 <input type="radio" name="ut" value="radParent">
               </form>"#,
        );
        let sessions = manager(&catalog);

        let err = sessions.get(SearchMode::Advanced).await.unwrap_err();
        assert!(matches!(err, CatalogError::SessionSetupFailed { .. }));
        assert!(err.to_string().contains("form form1 has no btnSubmitUserType button"));
        assert!(catalog.posts().is_empty());
    }

    #[tokio::test]
    async fn test_custom_user_type() {
        let catalog = MockCatalog::standard();
        let sessions = manager(&catalog).with_user_type("radStudent");
        sessions.get(SearchMode::Advanced).await.unwrap();
        assert!(catalog.posts()[0].1.contains("radStudent"));
    }
}
