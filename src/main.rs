use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// DevOps prompt catalog for Model Context Protocol
///
/// Serves MCP over SSE (`GET /sse` + `POST /message`) plus plain HTTP routes
/// for the same catalog. Every route except `/health` needs
/// `Authorization: Bearer <api key>`.
#[derive(Parser, Debug)]
#[command(name = "opsera-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind (overrides HOST and the config file)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (overrides PORT and the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file (TOML)
    ///
    /// If not specified, looks at $OPSERA_MCP_CONFIG, ./.opsera-mcp.toml and
    /// the user config directory, in that order.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log to file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn setup_logging(log_level: &str, log_file: Option<PathBuf>) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
        subscriber.with_ansi(false).with_writer(file).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM
fn spawn_shutdown_signal(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    warn!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }

        info!("Shutdown signal received");
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.log_file)?;

    info!("Starting opsera-mcp v{}", env!("CARGO_PKG_VERSION"));

    let config = opsera_mcp::ConfigLoader::new(args.config)
        .load()
        .context("Failed to load configuration")?
        .with_overrides(args.host, args.port);

    if config.uses_dev_api_key() {
        warn!("Using the built-in development API key; set VALID_API_KEY in production");
    }

    let catalog = Arc::new(opsera_mcp::Catalog::load().context("Failed to load prompt catalog")?);
    info!(
        "Catalog loaded: {} prompts, {} tools",
        catalog.list_prompts().len(),
        catalog.tools().len()
    );

    let shutdown = CancellationToken::new();
    spawn_shutdown_signal(shutdown.clone());

    opsera_mcp::run_server(config, catalog, shutdown).await?;

    info!("opsera-mcp shut down successfully");

    Ok(())
}
