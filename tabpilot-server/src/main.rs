//! Tabpilot HTTP server entry point.

mod routes;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tabpilot_core::llm::TextSummarizer;
use tabpilot_core::{BrowserSessionManager, ChatSummarizer, ChromiumLauncher, load_config};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Parser)]
#[command(
    name = "tabpilot-server",
    version,
    about = "HTTP surface for the tabpilot browser session manager"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind host override.
    #[arg(long)]
    host: Option<String>,

    /// Bind port override.
    #[arg(long)]
    port: Option<u16>,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(cli: &Cli) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "tabpilot", "tabpilot")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "tabpilot.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_tracing(&cli);

    let mut config = load_config(cli.config.as_deref(), None)
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let summarizer: Option<Arc<dyn TextSummarizer>> = if config.llm.api_key.is_empty() {
        None
    } else {
        Some(Arc::new(ChatSummarizer::new(config.llm.clone())))
    };

    let manager = BrowserSessionManager::new(
        config.browser.clone(),
        Arc::new(ChromiumLauncher),
        summarizer,
    );
    let session = Arc::new(Mutex::new(manager));
    let app = routes::router(routes::AppState {
        session: session.clone(),
        load_timeout: config.browser.load_timeout(),
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, cdp_url = %config.browser.cdp_url, "tabpilot server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Release browser resources before exiting.
    info!("shutting down, releasing browser session");
    session.lock().await.cleanup().await;
    Ok(())
}
