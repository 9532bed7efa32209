//! Browser session management — acquisition, page reconciliation, and cleanup.
//!
//! [`BrowserSessionManager`] attaches to an already-running browser over its
//! remote debugging endpoint and maintains a single "current page" the rest of
//! the system operates on. The underlying driver/connection chain is acquired
//! lazily with bounded retry, the current page is re-derived from live browser
//! state on every use (the user may open tabs out-of-band), and teardown is
//! best-effort, ordered, and idempotent.

use crate::browser::cdp::{BrowserConnection, CdpDriver, DriverLauncher, PageHandle};
use crate::config::BrowserConfig;
use crate::error::{BrowserError, TabpilotError};
use crate::llm::TextSummarizer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Outcome of classifying the browser's open-tab state during acquisition.
///
/// Computed fresh on every pass; never cached. Anything other than "exactly
/// one blank page in the first context" is treated as polluted, so stale
/// navigation state from a previous logical session is never reused.
enum PageDisposition {
    /// The single pre-existing blank tab; safe to adopt as-is.
    Reusable(Arc<dyn PageHandle>),
    /// Ambiguous or foreign state; a fresh page must be created.
    Polluted,
}

/// Manages one logical browser session: driver, connection, and current page.
///
/// Not designed for concurrent callers; share an instance behind external
/// synchronization if multiple call sites need it.
pub struct BrowserSessionManager {
    config: BrowserConfig,
    launcher: Arc<dyn DriverLauncher>,
    summarizer: Option<Arc<dyn TextSummarizer>>,
    driver: Option<Arc<dyn CdpDriver>>,
    connection: Option<Arc<dyn BrowserConnection>>,
    current_page: Option<Arc<dyn PageHandle>>,
}

impl BrowserSessionManager {
    pub fn new(
        config: BrowserConfig,
        launcher: Arc<dyn DriverLauncher>,
        summarizer: Option<Arc<dyn TextSummarizer>>,
    ) -> Self {
        Self {
            config,
            launcher,
            summarizer,
            driver: None,
            connection: None,
            current_page: None,
        }
    }

    /// Whether a connection is held and the current page is usable.
    pub fn is_page_ready(&self) -> bool {
        self.connection.is_some()
            && self
                .current_page
                .as_ref()
                .is_some_and(|page| !page.is_closed())
    }

    /// Ensure a usable driver/connection/page chain exists, acquiring one if
    /// necessary. A healthy session makes this a no-op.
    pub async fn ensure_session(&mut self) -> Result<(), BrowserError> {
        if self.is_page_ready() {
            return Ok(());
        }
        self.acquire().await
    }

    /// Bounded-retry acquisition with exponential backoff. Every failed
    /// attempt tears down its partial state before the next one starts;
    /// the final attempt's error is reported as `AcquisitionFailed`.
    async fn acquire(&mut self) -> Result<(), BrowserError> {
        // A stale chain (e.g. the page was closed under us) is torn down
        // before a new one is acquired; only one may be live at a time.
        if self.driver.is_some() || self.connection.is_some() || self.current_page.is_some() {
            self.cleanup().await;
        }

        let max_attempts = self.config.max_connect_attempts.max(1);
        let mut backoff = self.config.initial_backoff();

        for attempt in 1..=max_attempts {
            match self.try_acquire_once().await {
                Ok(()) => {
                    info!(attempt, "browser session established");
                    return Ok(());
                }
                Err(err) => {
                    // No partial state may survive a failed attempt.
                    self.cleanup().await;

                    if attempt == max_attempts {
                        error!(
                            attempts = max_attempts,
                            error = %err,
                            "browser session acquisition failed"
                        );
                        return Err(BrowserError::AcquisitionFailed {
                            attempts: max_attempts,
                            message: err.to_string(),
                        });
                    }

                    warn!(
                        attempt,
                        backoff_secs = backoff.as_secs(),
                        error = %err,
                        "connect attempt failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.config.max_backoff());
                }
            }
        }

        // Unreachable with max_attempts >= 1; any fallthrough is a failure,
        // never silent success.
        Err(BrowserError::AcquisitionFailed {
            attempts: max_attempts,
            message: "no connection attempt was made".to_string(),
        })
    }

    /// One acquisition attempt: fresh driver, connection, and page selection.
    /// Handles are stored as soon as they exist so a failure mid-attempt
    /// still gets them torn down.
    async fn try_acquire_once(&mut self) -> Result<(), BrowserError> {
        let driver = self.launcher.launch().await?;
        self.driver = Some(driver.clone());

        let connection = driver.connect(&self.config.cdp_url).await?;
        self.connection = Some(connection.clone());

        let page = self.select_page(&connection).await?;
        self.current_page = Some(page);
        Ok(())
    }

    /// Pick the page to operate on. A lone blank tab is reused; anything else
    /// gets a freshly created page in the first (or a new) context.
    async fn select_page(
        &self,
        connection: &Arc<dyn BrowserConnection>,
    ) -> Result<Arc<dyn PageHandle>, BrowserError> {
        match self.classify_open_tabs(connection).await? {
            PageDisposition::Reusable(page) => {
                debug!(page = %page.id(), "reusing pre-existing blank tab");
                Ok(page)
            }
            PageDisposition::Polluted => {
                let contexts = connection.contexts().await?;
                let context = match contexts.into_iter().next() {
                    Some(context) => context,
                    None => connection.new_context().await?,
                };
                let page = context.new_page().await?;
                debug!(page = %page.id(), "created fresh page");
                Ok(page)
            }
        }
    }

    async fn classify_open_tabs(
        &self,
        connection: &Arc<dyn BrowserConnection>,
    ) -> Result<PageDisposition, BrowserError> {
        let contexts = connection.contexts().await?;
        let Some(first) = contexts.first() else {
            return Ok(PageDisposition::Polluted);
        };

        let pages = first.pages().await?;
        let [page] = pages.as_slice() else {
            return Ok(PageDisposition::Polluted);
        };

        let url = page.url().await?;
        if url.is_empty() || self.config.blank_urls.iter().any(|blank| *blank == url) {
            Ok(PageDisposition::Reusable(page.clone()))
        } else {
            Ok(PageDisposition::Polluted)
        }
    }

    /// Ensure the current page points at the tab the user is actually viewing.
    ///
    /// After establishing the session, re-reads the first context's page list
    /// and adopts its newest entry (pages append on creation, so the last one
    /// is the most recently opened tab).
    pub async fn ensure_page_ready(&mut self) -> Result<(), BrowserError> {
        self.ensure_session().await?;

        let connection = self
            .connection
            .clone()
            .ok_or_else(|| BrowserError::Session {
                message: "no connection after acquisition".to_string(),
            })?;

        if self.current_page.is_none() {
            let page = self.select_page(&connection).await?;
            self.current_page = Some(page);
        }

        let contexts = connection.contexts().await?;
        if let Some(first) = contexts.first() {
            let pages = first.pages().await?;
            if let Some(latest) = pages.last() {
                let current_id = self.current_page.as_ref().map(|page| page.id());
                if current_id != Some(latest.id()) {
                    debug!(page = %latest.id(), "adopting newest tab in first context");
                    self.current_page = Some(latest.clone());
                }
            }
        }

        Ok(())
    }

    /// Poll the current page until its document is fully loaded or the budget
    /// elapses. A timeout is a normal outcome, reported as `Ok(false)`.
    pub async fn wait_for_page_load(&mut self, timeout: Duration) -> Result<bool, BrowserError> {
        self.ensure_page_ready().await?;
        let page = self
            .current_page
            .clone()
            .ok_or_else(|| BrowserError::Session {
                message: "no current page".to_string(),
            })?;

        let start = tokio::time::Instant::now();
        while start.elapsed() < timeout {
            if page.is_load_complete().await? {
                return Ok(true);
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        debug!(timeout_secs = timeout.as_secs(), "page load wait timed out");
        Ok(false)
    }

    /// Navigate the current page.
    pub async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.ensure_page_ready().await?;
        let page = self
            .current_page
            .clone()
            .ok_or_else(|| BrowserError::Session {
                message: "no current page".to_string(),
            })?;
        info!(url, "navigating current page");
        page.navigate(url).await
    }

    /// Fetch the current page's content, summarized to markdown when a
    /// summarizer hook is configured.
    pub async fn page_markdown(&mut self) -> Result<String, TabpilotError> {
        self.ensure_page_ready().await?;
        let page = self
            .current_page
            .clone()
            .ok_or_else(|| BrowserError::Session {
                message: "no current page".to_string(),
            })?;

        let content = page.content().await?;
        match &self.summarizer {
            Some(summarizer) => Ok(summarizer.summarize(&content).await?),
            None => Ok(content),
        }
    }

    /// Best-effort, ordered teardown: every page in every context, then the
    /// current page (it may no longer be reachable from the context list),
    /// then the connection, then the driver. A failure at any step is logged
    /// and never blocks the remaining steps; afterwards all handles are unset
    /// so the manager is re-acquirable.
    pub async fn cleanup(&mut self) {
        if let Some(connection) = &self.connection {
            match connection.contexts().await {
                Ok(contexts) => {
                    for context in contexts {
                        match context.pages().await {
                            Ok(pages) => {
                                for page in pages {
                                    if !page.is_closed()
                                        && let Err(err) = page.close().await
                                    {
                                        warn!(page = %page.id(), error = %err, "failed to close page");
                                    }
                                }
                            }
                            Err(err) => warn!(error = %err, "failed to list pages during cleanup"),
                        }
                    }
                }
                Err(err) => warn!(error = %err, "failed to list contexts during cleanup"),
            }
        }

        if let Some(page) = &self.current_page
            && !page.is_closed()
            && let Err(err) = page.close().await
        {
            warn!(page = %page.id(), error = %err, "failed to close current page");
        }

        if let Some(connection) = &self.connection
            && let Err(err) = connection.close().await
        {
            warn!(error = %err, "failed to close browser connection");
        }

        if let Some(driver) = &self.driver
            && let Err(err) = driver.stop().await
        {
            warn!(error = %err, "failed to stop driver");
        }

        self.current_page = None;
        self.connection = None;
        self.driver = None;
    }
}
