//! Control-protocol abstraction: driver, connection, context, and page traits,
//! plus scripted mock implementations.
//!
//! The traits mirror the object chain a remote-debugging client exposes:
//! a driver is started, connected to a browser endpoint, and the resulting
//! connection presents an ordered list of browsing contexts, each holding an
//! ordered list of pages (new pages are appended). Abstracting the chain lets
//! the session manager be tested against a fake that fails on demand, without
//! a running browser.

use crate::error::BrowserError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Starts fresh driver instances. The session manager launches one driver per
/// acquisition attempt and discards it if the attempt fails.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn CdpDriver>, BrowserError>;
}

/// A started control-protocol client.
#[async_trait]
pub trait CdpDriver: Send + Sync {
    /// Connect to the browser behind the given debugging URL.
    async fn connect(&self, cdp_url: &str) -> Result<Arc<dyn BrowserConnection>, BrowserError>;

    /// Stop the client and release everything it holds.
    async fn stop(&self) -> Result<(), BrowserError>;
}

/// A live link to a remote browser.
#[async_trait]
pub trait BrowserConnection: Send + Sync {
    /// Browsing contexts currently open in the browser, in creation order.
    async fn contexts(&self) -> Result<Vec<Arc<dyn BrowsingContext>>, BrowserError>;

    /// Create a new, empty browsing context.
    async fn new_context(&self) -> Result<Arc<dyn BrowsingContext>, BrowserError>;

    /// Close the connection.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// An isolated cookie/storage scope holding zero or more pages.
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    /// Pages in this context, oldest first. Newly created pages append.
    async fn pages(&self) -> Result<Vec<Arc<dyn PageHandle>>, BrowserError>;

    /// Create a blank page in this context.
    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, BrowserError>;
}

/// One browsable surface (tab).
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Stable identifier used to compare page identity across calls.
    fn id(&self) -> String;

    /// Current URL. Empty string for a tab that never navigated.
    async fn url(&self) -> Result<String, BrowserError>;

    /// Whether the page has been closed.
    fn is_closed(&self) -> bool;

    /// Close the page.
    async fn close(&self) -> Result<(), BrowserError>;

    /// Whether the document has finished loading
    /// (`document.readyState === 'complete'`).
    async fn is_load_complete(&self) -> Result<bool, BrowserError>;

    /// Full page content (HTML).
    async fn content(&self) -> Result<String, BrowserError>;

    /// Navigate the page to the given URL.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;
}

// --- Mock implementations -------------------------------------------------

/// A mock page with scripted state. All fields are public for test setup.
pub struct MockPage {
    id: String,
    pub url: Mutex<String>,
    pub closed: Mutex<bool>,
    pub load_complete: Mutex<bool>,
    /// Number of `is_load_complete` calls observed.
    pub load_checks: Mutex<u32>,
    pub content: Mutex<String>,
}

impl MockPage {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            url: Mutex::new(url.into()),
            closed: Mutex::new(false),
            load_complete: Mutex::new(false),
            load_checks: Mutex::new(0),
            content: Mutex::new(String::new()),
        })
    }

    pub fn set_load_complete(&self, complete: bool) {
        *self.load_complete.lock().unwrap() = complete;
    }
}

#[async_trait]
impl PageHandle for MockPage {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn url(&self) -> Result<String, BrowserError> {
        Ok(self.url.lock().unwrap().clone())
    }

    fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    async fn close(&self) -> Result<(), BrowserError> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }

    async fn is_load_complete(&self) -> Result<bool, BrowserError> {
        *self.load_checks.lock().unwrap() += 1;
        Ok(*self.load_complete.lock().unwrap())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.content.lock().unwrap().clone())
    }

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }
}

/// A mock browsing context. Created pages get ids `page-N` and append.
pub struct MockContext {
    pub pages: Mutex<Vec<Arc<MockPage>>>,
    pub created_pages: Mutex<u32>,
    next_page: Mutex<u32>,
}

impl MockContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(Vec::new()),
            created_pages: Mutex::new(0),
            next_page: Mutex::new(0),
        })
    }

    /// Append an existing page, simulating a tab opened out-of-band.
    pub fn push_page(&self, page: Arc<MockPage>) {
        self.pages.lock().unwrap().push(page);
    }
}

#[async_trait]
impl BrowsingContext for MockContext {
    async fn pages(&self) -> Result<Vec<Arc<dyn PageHandle>>, BrowserError> {
        // Closed tabs disappear from a real browser's target list.
        let pages = self.pages.lock().unwrap();
        Ok(pages
            .iter()
            .filter(|p| !p.is_closed())
            .map(|p| p.clone() as Arc<dyn PageHandle>)
            .collect())
    }

    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, BrowserError> {
        let n = {
            let mut next = self.next_page.lock().unwrap();
            *next += 1;
            *next
        };
        let page = MockPage::new(format!("page-{n}"), "");
        self.pages.lock().unwrap().push(page.clone());
        *self.created_pages.lock().unwrap() += 1;
        Ok(page)
    }
}

/// A mock connection holding scripted contexts.
pub struct MockConnection {
    pub contexts: Mutex<Vec<Arc<MockContext>>>,
    pub created_contexts: Mutex<u32>,
    pub closed: Mutex<bool>,
    /// When true, `close` returns an error (cleanup must still proceed).
    pub fail_close: Mutex<bool>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            contexts: Mutex::new(Vec::new()),
            created_contexts: Mutex::new(0),
            closed: Mutex::new(false),
            fail_close: Mutex::new(false),
        })
    }

    /// A connection with one context containing one page at the given URL.
    pub fn with_single_page(url: &str) -> (Arc<Self>, Arc<MockContext>, Arc<MockPage>) {
        let connection = Self::new();
        let context = MockContext::new();
        let page = MockPage::new("page-0", url);
        context.push_page(page.clone());
        connection.contexts.lock().unwrap().push(context.clone());
        (connection, context, page)
    }
}

#[async_trait]
impl BrowserConnection for MockConnection {
    async fn contexts(&self) -> Result<Vec<Arc<dyn BrowsingContext>>, BrowserError> {
        let contexts = self.contexts.lock().unwrap();
        Ok(contexts
            .iter()
            .map(|c| c.clone() as Arc<dyn BrowsingContext>)
            .collect())
    }

    async fn new_context(&self) -> Result<Arc<dyn BrowsingContext>, BrowserError> {
        let context = MockContext::new();
        self.contexts.lock().unwrap().push(context.clone());
        *self.created_contexts.lock().unwrap() += 1;
        Ok(context)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if *self.fail_close.lock().unwrap() {
            return Err(BrowserError::Session {
                message: "connection already torn down".to_string(),
            });
        }
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Shared scripted state for the mock driver stack. Tests keep a clone of the
/// `Arc` and assert against the counters after driving the session manager.
pub struct MockBrowserState {
    /// Connection handed out by successful connects.
    pub connection: Arc<MockConnection>,
    /// Number of connect calls that fail before connects start succeeding.
    pub connect_failures: Mutex<u32>,
    /// Total `launch` calls.
    pub launches: Mutex<u32>,
    /// Total `connect` calls (failed ones included).
    pub connects: Mutex<u32>,
    /// Total driver `stop` calls.
    pub stops: Mutex<u32>,
}

impl MockBrowserState {
    pub fn new(connection: Arc<MockConnection>) -> Arc<Self> {
        Arc::new(Self {
            connection,
            connect_failures: Mutex::new(0),
            launches: Mutex::new(0),
            connects: Mutex::new(0),
            stops: Mutex::new(0),
        })
    }

    pub fn fail_next_connects(&self, n: u32) {
        *self.connect_failures.lock().unwrap() = n;
    }
}

/// Mock [`DriverLauncher`] producing [`MockDriver`]s bound to shared state.
pub struct MockDriverLauncher {
    pub state: Arc<MockBrowserState>,
}

impl MockDriverLauncher {
    pub fn new(state: Arc<MockBrowserState>) -> Arc<Self> {
        Arc::new(Self { state })
    }
}

#[async_trait]
impl DriverLauncher for MockDriverLauncher {
    async fn launch(&self) -> Result<Arc<dyn CdpDriver>, BrowserError> {
        *self.state.launches.lock().unwrap() += 1;
        Ok(Arc::new(MockDriver {
            state: self.state.clone(),
        }))
    }
}

/// Mock [`CdpDriver`] that consumes the scripted failure budget.
pub struct MockDriver {
    state: Arc<MockBrowserState>,
}

#[async_trait]
impl CdpDriver for MockDriver {
    async fn connect(&self, _cdp_url: &str) -> Result<Arc<dyn BrowserConnection>, BrowserError> {
        *self.state.connects.lock().unwrap() += 1;
        {
            let mut failures = self.state.connect_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(BrowserError::Connect {
                    message: "connection refused".to_string(),
                });
            }
        }
        Ok(self.state.connection.clone() as Arc<dyn BrowserConnection>)
    }

    async fn stop(&self) -> Result<(), BrowserError> {
        *self.state.stops.lock().unwrap() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_context_appends_created_pages() {
        let context = MockContext::new();
        let first = context.new_page().await.unwrap();
        let second = context.new_page().await.unwrap();
        assert_ne!(first.id(), second.id());

        let pages = context.pages().await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.last().unwrap().id(), second.id());
    }

    #[tokio::test]
    async fn test_mock_driver_consumes_failure_budget() {
        let state = MockBrowserState::new(MockConnection::new());
        state.fail_next_connects(1);
        let launcher = MockDriverLauncher::new(state.clone());

        let driver = launcher.launch().await.unwrap();
        assert!(driver.connect("ws://mock").await.is_err());
        assert!(driver.connect("ws://mock").await.is_ok());
        assert_eq!(*state.connects.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mock_page_close_is_sticky() {
        let page = MockPage::new("page-0", "about:blank");
        assert!(!page.is_closed());
        page.close().await.unwrap();
        assert!(page.is_closed());
    }
}
