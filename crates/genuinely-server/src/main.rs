//! HTTP entry point for the Genuinely banknote service.
//!
//! Loads the pretrained classifier and reference dataset once, then serves
//! the prediction and monitoring endpoints over axum. All per-request state
//! is read-only and shared; a failed request never affects another.

mod payload;
mod routes;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use genuinely_pipeline::AppContext;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    author = "Genuinely Team",
    version,
    about = "Counterfeit banknote inference and monitoring service",
    long_about = "Serves a pretrained banknote classifier over HTTP.\n\n\
                  ENDPOINTS:\n  \
                  POST /prediction/   score an uploaded CSV\n  \
                  POST /monitoring/   drift report against the reference dataset\n  \
                  GET  /health        liveness probe\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  RUST_LOG    overrides --log-level (also read from .env)\n\n\
                  EXAMPLES:\n  \
                  # Default paths, port 8000\n  \
                  genuinely-server\n\n  \
                  # Custom model and saved drift reports\n  \
                  genuinely-server --model model.json --report-dir reports/"
)]
struct Args {
    /// Address to bind the HTTP listener to
    #[arg(long, default_value = "0.0.0.0:8000")]
    bind: String,

    /// Path to the pretrained model artifact (JSON)
    #[arg(short, long, default_value = "data/model_detection_faux_billets.json")]
    model: PathBuf,

    /// Path to the reference dataset used as the drift baseline
    #[arg(short, long, default_value = "data/reference_data.csv")]
    reference: PathBuf,

    /// Directory to persist drift reports into (disabled when unset)
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Normalised mean-shift threshold above which a feature counts as drifted
    #[arg(long, default_value_t = genuinely_pipeline::DEFAULT_DRIFT_THRESHOLD)]
    drift_threshold: f64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Shared application state: the read-only context plus server options.
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<AppContext>,
    pub report_dir: Option<PathBuf>,
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (RUST_LOG may live there)
    dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level);

    info!("loading model from {}", args.model.display());
    let context = AppContext::initialise(&args.model, &args.reference, args.drift_threshold)
        .context("failed to initialise application context")?;

    if let Some(dir) = &args.report_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating report directory {}", dir.display()))?;
        info!("drift reports will be saved under {}", dir.display());
    }

    let state = AppState {
        context: Arc::new(context),
        report_dir: args.report_dir.clone(),
    };

    let app = routes::create_router(state);

    let addr: SocketAddr = args
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", args.bind))?;
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
