//! PageMirror main entry point
//!
//! This is the command-line interface for the PageMirror offline site mirror.

use clap::Parser;
use pagemirror::config::{load_config_with_hash, CleanMode, Config};
use pagemirror::output::log_statistics;
use pagemirror::schedule::watch_interrupts;
use pagemirror::{run_scheduled, CrawlReport, NoopObserver};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// PageMirror: an incremental offline website mirror
///
/// PageMirror crawls one site from its seed URL, downloads every page and the
/// assets they reference, and rewrites them to browse correctly from disk.
/// Re-runs only download what changed.
#[derive(Parser, Debug)]
#[command(name = "pagemirror")]
#[command(version)]
#[command(about = "An incremental offline website mirror", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Rotate browser user agents and use wider politeness jitter
    #[arg(long)]
    stealth: bool,

    /// Ignore robots.txt
    #[arg(long)]
    no_robots: bool,

    /// Delete the previous mirror and its state before every run
    #[arg(long, conflicts_with = "no_clean")]
    fresh: bool,

    /// Always download everything; the output is cleaned before the first run
    #[arg(long)]
    no_incremental: bool,

    /// Never delete the previous mirror
    #[arg(long)]
    no_clean: bool,

    /// Run repeatedly with this pause between runs, e.g. 24h, 6h, 30m
    #[arg(long, value_name = "INTERVAL")]
    schedule: Option<String>,

    /// Stop after this many scheduled runs (0 = no limit)
    #[arg(long, value_name = "N")]
    max_runs: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    apply_overrides(&mut config, &cli);
    if let Err(e) = pagemirror::config::validate(&config) {
        tracing::error!("Invalid options: {}", e);
        return Err(e.into());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagemirror=info,warn"),
            1 => EnvFilter::new("pagemirror=debug,info"),
            2 => EnvFilter::new("pagemirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Command-line flags take precedence over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if cli.stealth {
        config.crawler.stealth = true;
    }
    if cli.no_robots {
        tracing::warn!("Ignoring robots.txt for this run");
        config.crawler.respect_robots = false;
    }
    if cli.no_incremental {
        config.crawler.incremental = false;
    }
    if cli.no_clean {
        config.site.clean = CleanMode::Never;
    }
    if cli.fresh {
        tracing::info!("Starting fresh mirror (previous output will be deleted)");
        config.site.clean = CleanMode::EveryRun;
    }
    if let Some(interval) = &cli.schedule {
        config.schedule.interval = Some(interval.clone());
    }
    if let Some(max_runs) = cli.max_runs {
        config.schedule.max_runs = max_runs;
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    tokio::spawn(watch_interrupts(tokio::signal::ctrl_c, cancel.clone(), || {
        std::process::exit(130)
    }));

    let state_dir = config.state_dir();
    let result = run_scheduled(&config, Arc::new(NoopObserver), cancel, |run, report| {
        finish_run(run, report, &state_dir.join("report.json"))
    })
    .await;

    match result {
        Ok(runs) => {
            tracing::info!("Finished after {} run(s)", runs);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Mirror failed: {}", e);
            Err(e.into())
        }
    }
}

/// Logs a run's statistics and saves its report
fn finish_run(run: u32, report: &CrawlReport, report_path: &std::path::Path) {
    tracing::info!("Run {} finished", run);
    log_statistics(&report.stats);
    if let Err(e) = report.write_json(report_path) {
        tracing::warn!("Failed to write {}: {}", report_path.display(), e);
    }
    if report.interrupted {
        tracing::info!("Mirror interrupted; re-run to continue");
    } else {
        tracing::info!("Mirror completed successfully");
    }
}
