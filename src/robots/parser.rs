//! Robots.txt parser implementation
//!
//! Allow/deny decisions are delegated to the robotstxt crate; this module adds
//! the group parsing needed for `Crawl-delay` and the disallow list report.

use robotstxt::DefaultMatcher;

/// Longest `Crawl-delay` honored, in seconds
pub const MAX_CRAWL_DELAY_SECS: f64 = 3600.0;

/// One `User-agent` group of a robots.txt file
#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
    disallow: Vec<String>,
}

impl Group {
    fn is_wildcard(&self) -> bool {
        self.agents.iter().any(|a| is_wildcard_agent(a))
    }

    /// Matches `User-agent` lines against the product token, as the allow/deny matcher does
    fn names(&self, product: &str) -> bool {
        !product.is_empty()
            && self
                .agents
                .iter()
                .any(|a| !is_wildcard_agent(a) && product_token(a).eq_ignore_ascii_case(product))
    }
}

fn is_wildcard_agent(agent: &str) -> bool {
    agent == "*" || agent.starts_with("* ")
}

/// Leading `[A-Za-z_-]` run of a user agent: `Mozilla/5.0 (...)` becomes `Mozilla`
fn product_token(user_agent: &str) -> &str {
    let end = user_agent
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-' || c == '_'))
        .unwrap_or(user_agent.len());
    &user_agent[..end]
}

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all (true = allow all, false = consult content)
    allow_all: bool,
    groups: Vec<Group>,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    ///
    /// # Arguments
    ///
    /// * `content` - The raw robots.txt file content
    ///
    /// # Returns
    ///
    /// A ParsedRobots instance that can be used to check URL permissions
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
            groups: parse_groups(content),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt is missing, unreachable, or not robots.txt at all.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
            groups: Vec::new(),
        }
    }

    /// Interprets a robots.txt response
    ///
    /// Anything but a 200 with a plausible robots.txt body allows everything.
    /// Sites that answer unknown paths with an HTML page or a JSON error
    /// would otherwise be read as an empty rule set at best.
    pub fn from_response(status: u16, body: &str) -> Self {
        if status != 200 || !looks_like_robots(body) {
            return Self::allow_all();
        }
        Self::from_content(body.trim())
    }

    pub fn is_allow_all(&self) -> bool {
        self.allow_all
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL (or path) to check
    /// * `user_agent` - The user agent string
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, product_token(user_agent), url)
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// A group naming the agent wins over the `*` group.
    ///
    /// # Returns
    ///
    /// * `Some(f64)` - The crawl delay in seconds
    /// * `None` - If no crawl delay applies
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let product = product_token(user_agent);
        let specific = self
            .groups
            .iter()
            .filter(|g| g.names(product))
            .find_map(|g| g.crawl_delay);

        specific.or_else(|| {
            self.groups
                .iter()
                .filter(|g| g.is_wildcard())
                .find_map(|g| g.crawl_delay)
        })
    }

    /// Disallow rules that apply to `user_agent`
    pub fn disallowed_paths(&self, user_agent: &str) -> Vec<String> {
        let product = product_token(user_agent);
        let specific: Vec<&Group> = self.groups.iter().filter(|g| g.names(product)).collect();
        let applicable: Vec<&Group> = if specific.is_empty() {
            self.groups.iter().filter(|g| g.is_wildcard()).collect()
        } else {
            specific
        };

        applicable
            .into_iter()
            .flat_map(|g| g.disallow.iter().cloned())
            .collect()
    }
}

/// Returns false for bodies that are clearly not robots.txt
fn looks_like_robots(body: &str) -> bool {
    let trimmed = body.trim_start();
    let lower = trimmed.to_lowercase();
    !(lower.contains("<html") || lower.starts_with("<!doctype") || trimmed.starts_with('{'))
}

/// Parses a `Crawl-delay` value, clamping it to [`MAX_CRAWL_DELAY_SECS`]
fn parse_crawl_delay(value: &str) -> Option<f64> {
    let delay = value.parse::<f64>().ok()?;
    if delay.is_nan() || delay < 0.0 {
        return None;
    }
    if delay > MAX_CRAWL_DELAY_SECS {
        tracing::warn!(
            "Crawl-delay {} exceeds {}s; clamping",
            value,
            MAX_CRAWL_DELAY_SECS
        );
        return Some(MAX_CRAWL_DELAY_SECS);
    }
    Some(delay)
}

fn parse_groups(content: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut current = Group::default();
    let mut in_rules = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if in_rules {
                    groups.push(std::mem::take(&mut current));
                    in_rules = false;
                }
                current.agents.push(value.to_lowercase());
            }
            "crawl-delay" => {
                in_rules = true;
                current.crawl_delay = parse_crawl_delay(value).or(current.crawl_delay);
            }
            "disallow" => {
                in_rules = true;
                if !value.is_empty() {
                    current.disallow.push(value.to_string());
                }
            }
            _ => in_rules = true,
        }
    }

    if !current.agents.is_empty() {
        groups.push(current);
    }
    groups
}
