//! Politeness scheduling for the page loop
//!
//! This module handles:
//! - The configured base delay between page fetches
//! - Integrating robots.txt crawl delays
//! - Random jitter, wider in stealth mode
//! - Sleeping in a way that a user interrupt can cut short

use crate::config::CrawlerConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Jitter range in normal mode (seconds)
const NORMAL_JITTER: (f64, f64) = (0.0, 0.3);

/// Jitter range in stealth mode (seconds)
const STEALTH_JITTER: (f64, f64) = (0.5, 2.0);

/// Computes the pause between page fetches
///
/// The pause gates only the page loop; asset fetches run without any
/// inter-request delay.
#[derive(Debug, Clone)]
pub struct PolitenessPolicy {
    base_delay: Duration,
    stealth: bool,
}

impl PolitenessPolicy {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.delay_ms),
            stealth: config.stealth,
        }
    }

    /// Jitter bounds in seconds for the current mode
    pub fn jitter_range(&self) -> (f64, f64) {
        if self.stealth {
            STEALTH_JITTER
        } else {
            NORMAL_JITTER
        }
    }

    /// The delay before the next page, without jitter
    ///
    /// # Arguments
    ///
    /// * `robots_delay` - Crawl-delay from robots.txt, if any
    ///
    /// # Returns
    ///
    /// The larger of the configured delay and the robots.txt delay
    pub fn effective_delay(&self, robots_delay: Option<Duration>) -> Duration {
        match robots_delay {
            Some(robots) => self.base_delay.max(robots),
            None => self.base_delay,
        }
    }

    /// The delay before the next page, including jitter
    pub fn next_delay(&self, robots_delay: Option<Duration>) -> Duration {
        let (low, high) = self.jitter_range();
        let jitter = low + fastrand::f64() * (high - low);
        self.effective_delay(robots_delay) + Duration::from_secs_f64(jitter)
    }

    /// Sleeps for `delay` unless `cancel` fires first
    ///
    /// Returns false if the sleep was interrupted.
    pub async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = cancel.cancelled() => false,
        }
    }
}
