//! Configuration system for tabpilot.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment.
//! Configuration is loaded from `~/.config/tabpilot/config.toml` and/or an
//! explicit file passed on the command line.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the tabpilot backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub browser: BrowserConfig,
    pub server: ServerConfig,
}

/// LLM provider configuration (OpenAI-compatible chat completions endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the API, without the `/chat/completions` suffix.
    pub base_url: String,
    /// API key. Usually supplied via `TABPILOT_LLM__API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model_name: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum completion tokens.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            api_key: String::new(),
            model_name: "deepseek-chat".to_string(),
            temperature: 0.7,
            max_tokens: 8192,
        }
    }
}

/// General agent limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool-calling iterations per task.
    pub max_iterations: u32,
    /// Maximum LLM/tool retries.
    pub max_retries: u32,
    /// Maximum search results to surface.
    pub max_search_result: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_retries: 3,
            max_search_result: 10,
        }
    }
}

/// Configuration for the browser session manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// CDP debugging URL of the already-running browser (http or ws).
    pub cdp_url: String,
    /// Maximum session acquisition attempts before giving up.
    pub max_connect_attempts: u32,
    /// Backoff before the second acquisition attempt, in seconds.
    pub initial_backoff_secs: u64,
    /// Backoff ceiling, in seconds.
    pub max_backoff_secs: u64,
    /// Default budget for waiting on a page load, in seconds.
    pub load_timeout_secs: u64,
    /// Interval between readiness polls, in seconds.
    pub poll_interval_secs: u64,
    /// URLs treated as an empty tab that is safe to reuse.
    #[serde(default = "default_blank_urls")]
    pub blank_urls: Vec<String>,
}

fn default_blank_urls() -> Vec<String> {
    vec![
        "about:blank".to_string(),
        "chrome://newtab/".to_string(),
        "chrome://new-tab-page/".to_string(),
    ]
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            cdp_url: "http://127.0.0.1:9222".to_string(),
            max_connect_attempts: 3,
            initial_backoff_secs: 1,
            max_backoff_secs: 10,
            load_timeout_secs: 15,
            poll_interval_secs: 5,
            blank_urls: default_blank_urls(),
        }
    }
}

impl BrowserConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// HTTP server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8330,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `TABPILOT_`)
/// 3. Explicit config file (passed as argument)
/// 4. User config (`~/.config/tabpilot/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    config_file: Option<&Path>,
    overrides: Option<&AppConfig>,
) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "tabpilot", "tabpilot") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Explicit config file
    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (TABPILOT_LLM__API_KEY, TABPILOT_BROWSER__CDP_URL, etc.)
    figment = figment.merge(Env::prefixed("TABPILOT_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: AppConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;

    if config.browser.cdp_url.is_empty() {
        return Err(ConfigError::Invalid {
            message: "browser.cdp_url must not be empty".to_string(),
        });
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.browser.max_connect_attempts, 3);
        assert_eq!(config.browser.initial_backoff_secs, 1);
        assert_eq!(config.browser.max_backoff_secs, 10);
        assert_eq!(config.browser.poll_interval_secs, 5);
        assert_eq!(config.llm.model_name, "deepseek-chat");
        assert_eq!(config.server.port, 8330);
    }

    #[test]
    fn test_default_blank_urls() {
        let config = BrowserConfig::default();
        assert_eq!(
            config.blank_urls,
            vec!["about:blank", "chrome://newtab/", "chrome://new-tab-page/"]
        );
    }

    #[test]
    fn test_duration_accessors() {
        let config = BrowserConfig::default();
        assert_eq!(config.initial_backoff(), Duration::from_secs(1));
        assert_eq!(config.max_backoff(), Duration::from_secs(10));
        assert_eq!(config.load_timeout(), Duration::from_secs(15));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.browser.cdp_url, config.browser.cdp_url);
        assert_eq!(parsed.llm.max_tokens, config.llm.max_tokens);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = AppConfig {
            browser: BrowserConfig {
                cdp_url: "ws://10.0.0.5:9222/devtools/browser/abc".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(
            config.browser.cdp_url,
            "ws://10.0.0.5:9222/devtools/browser/abc"
        );
    }

    #[test]
    fn test_missing_explicit_file_errors() {
        let err = load_config(Some(Path::new("/nonexistent/tabpilot.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_empty_cdp_url_rejected() {
        let overrides = AppConfig {
            browser: BrowserConfig {
                cdp_url: String::new(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = load_config(None, Some(&overrides)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
