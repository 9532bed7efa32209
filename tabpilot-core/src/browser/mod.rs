//! Browser session management for tabpilot.
//!
//! Provides a trait-based abstraction over a remote-debugging protocol client
//! (driver, connection, contexts, pages) plus the session manager that
//! acquires, reconciles, and releases those resources against an
//! already-running browser.

pub mod cdp;
pub mod session;

#[cfg(feature = "browser")]
pub mod chromium;

pub use cdp::{
    BrowserConnection, BrowsingContext, CdpDriver, DriverLauncher, MockBrowserState,
    MockConnection, MockContext, MockDriver, MockDriverLauncher, MockPage, PageHandle,
};
pub use session::BrowserSessionManager;

#[cfg(feature = "browser")]
pub use chromium::ChromiumLauncher;
