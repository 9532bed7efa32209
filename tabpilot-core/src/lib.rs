//! # Tabpilot Core
//!
//! Core library for the tabpilot agent backend. Provides the browser session
//! manager (attaching to an already-running browser over CDP), configuration,
//! event models, and the optional LLM summarization hook.

pub mod browser;
pub mod config;
pub mod error;
pub mod events;
pub mod llm;

// Re-export commonly used types at the crate root.
pub use browser::{BrowserSessionManager, DriverLauncher};
pub use config::{AppConfig, BrowserConfig, LlmConfig, ServerConfig, load_config};
pub use error::{BrowserError, Result, TabpilotError};
pub use events::{Event, Plan, Step};
pub use llm::{ChatSummarizer, TextSummarizer};

#[cfg(feature = "browser")]
pub use browser::ChromiumLauncher;
