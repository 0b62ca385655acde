//! Robots.txt handling module
//!
//! The policy for the mirrored origin is fetched lazily on first use and
//! cached for the rest of the run. Any failure to obtain a usable robots.txt
//! allows everything.

mod parser;

pub use parser::{ParsedRobots, MAX_CRAWL_DELAY_SECS};

use crate::crawler::FetchClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

/// Robots.txt policy for the mirrored origin
pub struct RobotsPolicy {
    client: Arc<FetchClient>,
    robots_url: Url,
    enabled: bool,
    loaded: OnceCell<LoadedRobots>,
}

/// Parsed rules plus the user agent they were evaluated for
#[derive(Debug)]
struct LoadedRobots {
    robots: ParsedRobots,
    user_agent: String,
}

impl RobotsPolicy {
    /// Creates a policy for `robots_url`
    ///
    /// When `enabled` is false every check passes and nothing is fetched.
    pub fn new(client: Arc<FetchClient>, robots_url: Url, enabled: bool) -> Self {
        Self {
            client,
            robots_url,
            enabled,
            loaded: OnceCell::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn load(&self) -> &LoadedRobots {
        self.loaded
            .get_or_init(|| async {
                let user_agent = self.client.user_agent();
                let robots = if self.enabled {
                    fetch_robots(&self.client, &self.robots_url).await
                } else {
                    ParsedRobots::allow_all()
                };
                LoadedRobots { robots, user_agent }
            })
            .await
    }

    /// Checks whether `url` may be fetched
    pub async fn can_fetch(&self, url: &Url) -> bool {
        if !self.enabled {
            return true;
        }
        let loaded = self.load().await;
        loaded.robots.is_allowed(url.as_str(), &loaded.user_agent)
    }

    /// Crawl-delay for the active user agent
    pub async fn crawl_delay(&self) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let loaded = self.load().await;
        let secs = loaded.robots.crawl_delay(&loaded.user_agent)?;
        Duration::try_from_secs_f64(secs.min(MAX_CRAWL_DELAY_SECS)).ok()
    }

    /// Disallow rules for the active user agent
    pub async fn disallowed_paths(&self) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let loaded = self.load().await;
        loaded.robots.disallowed_paths(&loaded.user_agent)
    }
}

/// Fetches and interprets robots.txt, allowing everything on failure
async fn fetch_robots(client: &FetchClient, robots_url: &Url) -> ParsedRobots {
    match client.get_text(robots_url).await {
        Ok((status, body)) => {
            let robots = ParsedRobots::from_response(status, &body);
            if robots.is_allow_all() {
                tracing::info!(
                    "No usable robots.txt at {} (HTTP {}), allowing all",
                    robots_url,
                    status
                );
            } else {
                tracing::info!("Loaded robots.txt from {}", robots_url);
            }
            robots
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}; allowing all", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
