//! Chromium backend implemented with chromiumoxide.
//!
//! Requires the `browser` feature flag:
//! ```toml
//! tabpilot-core = { path = "tabpilot-core", features = ["browser"] }
//! ```
//!
//! chromiumoxide presents a connected browser as a flat target list, so the
//! connection exposes a single default browsing context wrapping
//! `Browser::pages()`.

use crate::browser::cdp::{
    BrowserConnection, BrowsingContext, CdpDriver, DriverLauncher, PageHandle,
};
use crate::error::BrowserError;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

fn session_err<E: std::fmt::Display>(err: E) -> BrowserError {
    BrowserError::Session {
        message: err.to_string(),
    }
}

fn page_err<E: std::fmt::Display>(err: E) -> BrowserError {
    BrowserError::Page {
        message: err.to_string(),
    }
}

/// Launches [`ChromiumDriver`]s. Stateless; one driver per acquisition attempt.
pub struct ChromiumLauncher;

#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn CdpDriver>, BrowserError> {
        Ok(Arc::new(ChromiumDriver {
            handler_task: Mutex::new(None),
        }))
    }
}

/// Driver holding the background task that pumps CDP events.
pub struct ChromiumDriver {
    handler_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[async_trait]
impl CdpDriver for ChromiumDriver {
    async fn connect(&self, cdp_url: &str) -> Result<Arc<dyn BrowserConnection>, BrowserError> {
        let (browser, mut handler) =
            chromiumoxide::Browser::connect(cdp_url)
                .await
                .map_err(|e| BrowserError::Connect {
                    message: e.to_string(),
                })?;

        let task = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if let Err(err) = result {
                    debug!(error = %err, "CDP handler error");
                }
            }
        });
        *self.handler_task.lock().unwrap() = Some(task);

        Ok(Arc::new(ChromiumConnection {
            browser: Arc::new(browser),
        }))
    }

    async fn stop(&self) -> Result<(), BrowserError> {
        // Aborting the event pump drops the websocket and detaches from the
        // remote browser.
        if let Some(task) = self.handler_task.lock().unwrap().take() {
            task.abort();
        }
        Ok(())
    }
}

/// A link to an already-running browser over its debugging websocket.
pub struct ChromiumConnection {
    browser: Arc<chromiumoxide::Browser>,
}

#[async_trait]
impl BrowserConnection for ChromiumConnection {
    async fn contexts(&self) -> Result<Vec<Arc<dyn BrowsingContext>>, BrowserError> {
        Ok(vec![Arc::new(ChromiumContext {
            browser: self.browser.clone(),
        }) as Arc<dyn BrowsingContext>])
    }

    async fn new_context(&self) -> Result<Arc<dyn BrowsingContext>, BrowserError> {
        // The flat target list is always presented as one default context.
        Ok(Arc::new(ChromiumContext {
            browser: self.browser.clone(),
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        // Browser.close over CDP would terminate the user's external browser;
        // the link itself is dropped when the driver's event task stops.
        debug!("detaching from remote browser");
        Ok(())
    }
}

/// The connected browser's default context (its flat target list).
pub struct ChromiumContext {
    browser: Arc<chromiumoxide::Browser>,
}

#[async_trait]
impl BrowsingContext for ChromiumContext {
    async fn pages(&self) -> Result<Vec<Arc<dyn PageHandle>>, BrowserError> {
        let pages = self.browser.pages().await.map_err(session_err)?;
        Ok(pages
            .into_iter()
            .map(|page| Arc::new(ChromiumPage::new(page)) as Arc<dyn PageHandle>)
            .collect())
    }

    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(page_err)?;
        Ok(Arc::new(ChromiumPage::new(page)))
    }
}

/// One tab of the connected browser.
pub struct ChromiumPage {
    page: chromiumoxide::Page,
    closed: AtomicBool,
}

impl ChromiumPage {
    fn new(page: chromiumoxide::Page) -> Self {
        Self {
            page,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    fn id(&self) -> String {
        self.page.target_id().as_ref().to_string()
    }

    async fn url(&self) -> Result<String, BrowserError> {
        let url = self.page.url().await.map_err(page_err)?;
        Ok(url.unwrap_or_default())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page.clone().close().await.map_err(page_err)?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_load_complete(&self) -> Result<bool, BrowserError> {
        let result = self
            .page
            .evaluate("document.readyState === 'complete'")
            .await
            .map_err(|e| BrowserError::Evaluate {
                message: e.to_string(),
            })?;
        result.into_value::<bool>().map_err(|e| BrowserError::Evaluate {
            message: e.to_string(),
        })
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(page_err)
    }

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.page.goto(url).await.map_err(page_err)?;
        Ok(())
    }
}
