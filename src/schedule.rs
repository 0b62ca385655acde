//! Repeated mirror runs
//!
//! This module handles:
//! - Parsing schedule intervals such as `30m`, `6h` or `1d`
//! - Cleaning the output directory before a run
//! - Re-running the mirror until the run limit or a user interrupt
//! - Turning interrupt signals into cancellation, then a forced exit
//!
//! Every run after the first relies on incremental state, so a scheduled
//! mirror only downloads what changed since the previous run.

use crate::config::{CleanMode, Config};
use crate::output::{write_sitemap, CrawlReport};
use crate::recon::ReconObserver;
use crate::storage::STATE_FILE_NAME;
use crate::{CrawlEngine, MirrorError};
use regex::Regex;
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

static INTERVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+)\s*([smhd])$").expect("hardcoded regex pattern is valid")
});

/// Parses an interval such as `45s`, `30m`, `6h` or `1d`
///
/// Returns `None` for anything else, including zero-length intervals.
///
/// # Examples
///
/// ```
/// use pagemirror::schedule::parse_interval;
/// use std::time::Duration;
///
/// assert_eq!(parse_interval("30m"), Some(Duration::from_secs(1800)));
/// assert_eq!(parse_interval("soon"), None);
/// ```
pub fn parse_interval(raw: &str) -> Option<Duration> {
    let caps = INTERVAL.captures(raw.trim())?;
    let amount: u64 = caps[1].parse().ok()?;
    let unit = match caps[2].to_ascii_lowercase().as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => 86_400,
    };
    let secs = amount.checked_mul(unit)?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Human-readable interval for log lines
pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Removes the previous mirror and its incremental state
///
/// The state file is removed separately when the state directory lives
/// outside the output root.
pub fn clean_output(config: &Config) -> crate::Result<()> {
    let output_root = &config.site.output_dir;
    let refuse = |reason: &str| MirrorError::OutputDir {
        path: output_root.display().to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, reason.to_string()),
    };

    if output_root.exists() {
        let resolved = output_root
            .canonicalize()
            .map_err(|source| MirrorError::OutputDir {
                path: output_root.display().to_string(),
                source,
            })?;
        if resolved.parent().is_none() {
            return Err(refuse("refusing to clean a filesystem root"));
        }
        if std::env::current_dir().is_ok_and(|cwd| cwd == resolved) {
            return Err(refuse("refusing to clean the working directory"));
        }

        tracing::info!("Cleaning output directory {}", output_root.display());
        std::fs::remove_dir_all(output_root).map_err(|source| MirrorError::OutputDir {
            path: output_root.display().to_string(),
            source,
        })?;
    }

    let state_file = config.state_dir().join(STATE_FILE_NAME);
    remove_if_present(&state_file)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> crate::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// When runs happen and what is cleaned before each
#[derive(Debug, Clone)]
pub struct RunSchedule {
    interval: Option<Duration>,
    max_runs: u32,
    clean: CleanMode,
    incremental: bool,
}

impl RunSchedule {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.schedule.interval.as_deref().and_then(parse_interval),
            max_runs: config.schedule.max_runs,
            clean: config.site.clean,
            incremental: config.crawler.incremental,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Returns true once `completed` runs exhaust the schedule
    pub fn is_done(&self, completed: u32) -> bool {
        match self.interval {
            None => completed >= 1,
            Some(_) => self.max_runs > 0 && completed >= self.max_runs,
        }
    }

    /// Whether the output is cleaned before run number `run` (1-based)
    pub fn cleans_before(&self, run: u32) -> bool {
        match self.clean {
            CleanMode::Never => false,
            CleanMode::EveryRun => true,
            CleanMode::Auto => run == 1 && !self.incremental,
        }
    }

    /// Sleeps until the next run; returns false if interrupted
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };
        tokio::select! {
            _ = tokio::time::sleep(interval) => true,
            _ = cancel.cancelled() => false,
        }
    }
}

/// Runs the mirror as often as the schedule asks
///
/// Each run cleans the output when the schedule says so, mirrors the site,
/// writes the page index and hands its report to `on_report`. The loop ends
/// when the schedule is exhausted or `cancel` fires, whether during a run or
/// while waiting for the next one.
///
/// # Returns
///
/// * `Ok(runs)` - Number of runs started
/// * `Err(MirrorError)` - A run could not be set up
pub async fn run_scheduled<F>(
    config: &Config,
    observer: Arc<dyn ReconObserver>,
    cancel: CancellationToken,
    mut on_report: F,
) -> crate::Result<u32>
where
    F: FnMut(u32, &CrawlReport),
{
    let schedule = RunSchedule::from_config(config);
    let mut runs = 0;

    loop {
        runs += 1;
        if schedule.cleans_before(runs) {
            clean_output(config)?;
        }

        let engine = CrawlEngine::new(config.clone(), Arc::clone(&observer))?;
        let report = engine.run(cancel.clone()).await?;
        if let Err(e) = write_sitemap(&report) {
            tracing::warn!("Failed to write page index: {}", e);
        }
        on_report(runs, &report);

        if report.interrupted || schedule.is_done(runs) {
            break;
        }

        if let Some(interval) = schedule.interval() {
            let next = chrono::Local::now()
                + chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero());
            tracing::info!(
                "Next run at {} (in {})",
                next.format("%Y-%m-%d %H:%M:%S"),
                format_interval(interval)
            );
        }
        if !schedule.wait(&cancel).await {
            tracing::info!("Scheduler stopped after {} runs", runs);
            break;
        }
    }

    Ok(runs)
}

/// Cancels `cancel` on the first interrupt and calls `force_quit` on the second
///
/// `next_signal` resolves once per interrupt; the binary passes
/// `tokio::signal::ctrl_c`. The first interrupt lets the current page finish
/// and state be saved. A second one is for runs stuck on slow requests.
pub async fn watch_interrupts<S, F, Q>(
    mut next_signal: S,
    cancel: CancellationToken,
    force_quit: Q,
) where
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
    Q: FnOnce(),
{
    if let Err(e) = next_signal().await {
        tracing::warn!("Cannot listen for interrupts: {}", e);
        return;
    }
    tracing::warn!("Interrupt received; finishing the current page (interrupt again to quit now)");
    cancel.cancel();

    if next_signal().await.is_ok() {
        tracing::error!("Second interrupt; quitting without saving");
        force_quit();
    }
}
