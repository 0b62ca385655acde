use crate::assets::AssetCategory;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for PageMirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Builds a configuration for `seed_url` with every other setting at its default
    pub fn for_seed(seed_url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            site: SiteConfig {
                seed_url: seed_url.into(),
                output_dir: output_dir.into(),
                state_dir: None,
                supplementary_assets: Vec::new(),
                clean: CleanMode::default(),
            },
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig::default(),
            filter: FilterConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }

    /// Directory holding the incremental state file
    pub fn state_dir(&self) -> PathBuf {
        self.site
            .state_dir
            .clone()
            .unwrap_or_else(|| self.site.output_dir.join(".pagemirror"))
    }
}

/// What to mirror and where to put it
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Seed URL; its authority defines the mirrored origin
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Root directory for mirrored pages and assets
    #[serde(rename = "output-dir", default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory for the incremental state file (defaults under the output root)
    #[serde(rename = "state-dir", default)]
    pub state_dir: Option<PathBuf>,

    /// Assets no page links to, fetched after the frontier drains
    #[serde(rename = "supplementary-assets", default)]
    pub supplementary_assets: Vec<String>,

    /// When the output directory is wiped before a run
    #[serde(default)]
    pub clean: CleanMode,
}

/// Output cleaning policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanMode {
    /// Clean before the first run only when incremental mode is off
    #[default]
    Auto,

    /// Never clean; new files are written over the previous mirror
    Never,

    /// Clean before every run, discarding the previous mirror and its state
    EveryRun,
}

/// Repeated runs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    /// Pause between runs such as `30m`, `6h` or `1d`; unset runs once
    #[serde(default)]
    pub interval: Option<String>,

    /// Stop after this many runs (0 = no limit)
    #[serde(rename = "max-runs", default)]
    pub max_runs: u32,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Base delay between page fetches (milliseconds)
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Size of the asset worker pool
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Consult robots.txt before every page
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    /// Rotate browser user agents and use wider politeness jitter
    #[serde(default)]
    pub stealth: bool,

    /// Send conditional requests and persist validator state
    #[serde(default = "default_true")]
    pub incremental: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            timeout_secs: default_timeout_secs(),
            workers: default_workers(),
            respect_robots: true,
            stealth: false,
            incremental: true,
        }
    }
}

/// User agent configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserAgentConfig {
    /// Replaces the default browser user agent in normal mode
    #[serde(rename = "override", default)]
    pub override_agent: Option<String>,
}

/// Asset admission rules
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    #[serde(rename = "include-types", default)]
    pub include_types: Vec<AssetCategory>,

    #[serde(rename = "exclude-types", default)]
    pub exclude_types: Vec<AssetCategory>,

    #[serde(rename = "include-patterns", default)]
    pub include_patterns: Vec<String>,

    #[serde(rename = "exclude-patterns", default)]
    pub exclude_patterns: Vec<String>,

    /// Smallest admitted asset body (bytes)
    #[serde(rename = "min-size", default)]
    pub min_size: Option<u64>,

    /// Largest admitted asset body (bytes)
    #[serde(rename = "max-size", default)]
    pub max_size: Option<u64>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("website_download")
}

fn default_delay_ms() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    4
}

fn default_true() -> bool {
    true
}
