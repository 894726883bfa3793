// volley-stats entry point.
//
// Startup sequence:
// 1. Parse arguments and load config
// 2. Initialize tracing (stderr, or the configured log file)
// 3. Load the CSV and ingest it as the active dataset
// 4. Compute the summary off the async runtime and print it as JSON
// 5. Optionally generate commentary under a timeout

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use volley_app::commentary::{CommentaryClient, CommentaryRequest};
use volley_app::config::{self, LoggingConfig};
use volley_core::{AnalysisMode, Engine, ResolvedPlayer};

#[derive(Debug, Parser)]
#[command(name = "volley-stats", about = "Summarize volleyball performance data")]
struct Args {
    /// CSV file with one row per player per set.
    csv: PathBuf,

    /// Player to filter on; omit (or pass "all") for the whole team.
    #[arg(long)]
    player: Option<String>,

    /// Analysis mode: cumulative or temporal.
    #[arg(long, default_value = "cumulative")]
    mode: String,

    /// Also print statistical commentary.
    #[arg(long)]
    commentary: bool,

    /// Read configuration from this file instead of the default locations.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Arguments and config
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => config::load_config_file(path),
        None => config::load_config(),
    }
    .context("failed to load configuration")?;

    // 2. Tracing
    init_tracing(&config.logging)?;
    info!(
        "volley-stats starting: threshold={}, recent_window={}",
        config.engine.match_threshold, config.engine.recent_window
    );

    // 3. Load and ingest
    let (table, meta) = volley_core::table::load_csv(&args.csv)
        .with_context(|| format!("failed to load {}", args.csv.display()))?;
    let dataset_id = meta
        .source_name
        .clone()
        .unwrap_or_else(|| args.csv.display().to_string());

    let engine = Engine::with_config(config.engine);
    engine.ingest(dataset_id.clone(), &table, meta);
    let state = engine.run(&dataset_id).context("dataset not available after ingest")?;

    // 4. Summary
    let mode = AnalysisMode::normalize(Some(args.mode.as_str()));
    let worker = Arc::clone(&state);
    let player = args.player.clone();
    let response = tokio::task::spawn_blocking(move || {
        worker.summary_response(player.as_deref(), mode)
    })
    .await
    .context("summary task failed")?;

    if let Some(err) = &response.error {
        warn!("summary for {:?} failed: {}", args.player, err);
    }
    let json = serde_json::to_string_pretty(&response).context("failed to serialize summary")?;
    println!("{json}");

    // 5. Commentary
    if args.commentary && response.error.is_none() {
        let client = CommentaryClient::from_config(&config.commentary);
        if !client.is_enabled() {
            info!("commentary requested but disabled in config");
            return Ok(());
        }

        let display = match state.query_player(args.player.as_deref()).resolved {
            Some(ResolvedPlayer::Matched { used_name, .. }) => used_name,
            _ => String::new(),
        };
        let request = CommentaryRequest {
            summary: &response.summary,
            meta: state.meta(),
            player: &display,
        };
        let timeout = Duration::from_secs(config.commentary.timeout_secs);
        match client.generate(&request, timeout).await {
            Ok(text) => println!("\n{text}"),
            Err(e) => warn!("commentary unavailable: {}", e),
        }
    }

    info!("volley-stats finished");
    Ok(())
}

/// Initialize tracing. Logs go to stderr so stdout stays machine-readable,
/// or to the configured file.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    match &logging.log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create log dir {}", dir.display()))?;
            }
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("failed to set tracing subscriber")?;
        }
        None => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("failed to set tracing subscriber")?;
        }
    }

    Ok(())
}
