//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the mirror, including:
//! - Building the HTTP client with browser-like baseline headers
//! - User agent selection and stealth-mode rotation
//! - Conditional GETs and 304 handling
//! - Error classification (timeout, transport, HTTP status)

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::state::{ConditionalHeaders, ResponseValidators};
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Browser user agents; the first one is used outside stealth mode
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Stealth mode picks a new user agent after this many page requests
pub const ROTATE_EVERY: u64 = 5;

/// Errors from a single request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    /// Status code for HTTP failures
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_reqwest(url: &Url, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Result of a successful round trip
#[derive(Debug)]
pub enum FetchOutcome {
    /// 2xx response; the body has not been read yet
    Fetched(FetchedResponse),

    /// 304 in answer to a conditional request
    NotModified,
}

/// A 2xx response whose headers are known
#[derive(Debug)]
pub struct FetchedResponse {
    final_url: Url,
    validators: ResponseValidators,
    response: reqwest::Response,
}

impl FetchedResponse {
    /// URL after redirects
    pub fn final_url(&self) -> &Url {
        &self.final_url
    }

    pub fn validators(&self) -> &ResponseValidators {
        &self.validators
    }

    /// Content-Type header value (empty when absent)
    pub fn content_type(&self) -> &str {
        self.validators.content_type.as_deref().unwrap_or("")
    }

    /// Returns true if the response declares an HTML body
    pub fn is_html(&self) -> bool {
        let ct = self.content_type().to_ascii_lowercase();
        ct.contains("text/html") || ct.contains("application/xhtml")
    }

    /// Reads the full body
    pub async fn bytes(self) -> Result<Bytes, FetchError> {
        let url = self.final_url;
        self.response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))
    }
}

#[derive(Debug)]
struct AgentRotation {
    current: String,
}

/// HTTP client shared by the crawl loop and every asset worker
#[derive(Debug)]
pub struct FetchClient {
    client: Client,
    stealth: bool,
    agent: Mutex<AgentRotation>,
    pick_agent: fn() -> String,
    page_requests: AtomicU64,
}

impl FetchClient {
    /// Builds a client with the configured timeout and user agent policy
    ///
    /// # Arguments
    ///
    /// * `crawler` - Timeout and stealth settings
    /// * `user_agent` - Optional normal-mode user agent override
    ///
    /// # Returns
    ///
    /// * `Ok(FetchClient)` - Successfully built client
    /// * `Err(reqwest::Error)` - TLS backend or header setup failed
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pagemirror::config::{CrawlerConfig, UserAgentConfig};
    /// use pagemirror::crawler::FetchClient;
    ///
    /// let client = FetchClient::new(&CrawlerConfig::default(), &UserAgentConfig::default()).unwrap();
    /// println!("{}", client.user_agent());
    /// ```
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .default_headers(baseline_headers())
            .timeout(Duration::from_secs(crawler.timeout_secs))
            .connect_timeout(Duration::from_secs(crawler.timeout_secs.min(10)))
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        let initial = if crawler.stealth {
            random_agent()
        } else {
            user_agent
                .override_agent
                .clone()
                .unwrap_or_else(|| USER_AGENTS[0].to_string())
        };

        Ok(Self {
            client,
            stealth: crawler.stealth,
            agent: Mutex::new(AgentRotation { current: initial }),
            pick_agent: random_agent,
            page_requests: AtomicU64::new(0),
        })
    }

    /// The user agent sent with the next request
    pub fn user_agent(&self) -> String {
        let agent = self.agent.lock().unwrap_or_else(|e| e.into_inner());
        agent.current.clone()
    }

    /// Counts a page request and rotates the user agent when due
    pub fn note_page_request(&self) -> u64 {
        let count = self.page_requests.fetch_add(1, Ordering::Relaxed) + 1;
        if self.stealth && count % ROTATE_EVERY == 0 {
            let next = (self.pick_agent)();
            tracing::debug!("Rotating user agent after {} page requests", count);
            let mut agent = self.agent.lock().unwrap_or_else(|e| e.into_inner());
            agent.current = next;
        }
        count
    }

    /// Page requests issued so far
    pub fn page_requests(&self) -> u64 {
        self.page_requests.load(Ordering::Relaxed)
    }

    /// Issues a GET, conditional when `conditional` carries validators
    ///
    /// # Returns
    ///
    /// * `Ok(FetchOutcome::Fetched)` - 2xx response, body not yet read
    /// * `Ok(FetchOutcome::NotModified)` - 304 response
    /// * `Err(FetchError)` - Timeout, transport failure or any other status
    pub async fn get(
        &self,
        url: &Url,
        conditional: &ConditionalHeaders,
    ) -> Result<FetchOutcome, FetchError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, self.user_agent());

        if let Some(etag) = &conditional.if_none_match {
            request = request.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(since) = &conditional.if_modified_since {
            request = request.header(header::IF_MODIFIED_SINCE, since);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let headers = response.headers();
        let validators = ResponseValidators {
            etag: header_string(headers, header::ETAG),
            last_modified: header_string(headers, header::LAST_MODIFIED),
            content_type: header_string(headers, header::CONTENT_TYPE),
        };

        Ok(FetchOutcome::Fetched(FetchedResponse {
            final_url: response.url().clone(),
            validators,
            response,
        }))
    }

    /// Fetches a text resource, returning the status and body for any status
    pub async fn get_text(&self, url: &Url) -> Result<(u16, String), FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, self.user_agent())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        Ok((status, body))
    }
}

/// Headers sent with every request
fn baseline_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    // Accept-Encoding is added by the client's gzip/brotli/deflate support
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn random_agent() -> String {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(stealth: bool, override_agent: Option<&str>) -> FetchClient {
        let crawler = CrawlerConfig {
            stealth,
            timeout_secs: 5,
            ..CrawlerConfig::default()
        };
        let ua = UserAgentConfig {
            override_agent: override_agent.map(str::to_string),
        };
        FetchClient::new(&crawler, &ua).unwrap()
    }

    #[test]
    fn test_normal_mode_agent() {
        assert_eq!(client(false, None).user_agent(), USER_AGENTS[0]);
    }

    #[test]
    fn test_override_agent() {
        assert_eq!(client(false, Some("MirrorBot/1.0")).user_agent(), "MirrorBot/1.0");
    }

    #[test]
    fn test_stealth_agent_from_pool() {
        let c = client(true, None);
        for _ in 0..12 {
            c.note_page_request();
            assert!(USER_AGENTS.contains(&c.user_agent().as_str()));
        }
        assert_eq!(c.page_requests(), 12);
    }

    static PICKS: AtomicU64 = AtomicU64::new(0);

    fn numbered_agent() -> String {
        format!("Agent-{}", PICKS.fetch_add(1, Ordering::SeqCst))
    }

    #[test]
    fn test_stealth_rotates_every_fifth_request() {
        let mut c = client(true, None);
        c.pick_agent = numbered_agent;
        let initial = c.user_agent();

        let mut seen = Vec::new();
        for _ in 0..10 {
            c.note_page_request();
            seen.push(c.user_agent());
        }

        // seen[i] is the agent after request i + 1
        for agent in &seen[..4] {
            assert_eq!(agent, &initial);
        }
        assert_ne!(seen[4], initial);
        assert!(seen[4].starts_with("Agent-"));
        for agent in &seen[5..9] {
            assert_eq!(agent, &seen[4]);
        }
        assert_ne!(seen[9], seen[4]);
        assert!(seen[9].starts_with("Agent-"));
        assert_eq!(c.page_requests(), 10);
    }

    #[test]
    fn test_normal_mode_never_rotates() {
        let c = client(false, None);
        for _ in 0..10 {
            c.note_page_request();
        }
        assert_eq!(c.user_agent(), USER_AGENTS[0]);
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.html"))
            .and(header_is("dnt", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .insert_header("etag", "\"abc\"")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/a.html", server.uri())).unwrap();
        let outcome = client(false, None)
            .get(&url, &ConditionalHeaders::default())
            .await
            .unwrap();

        let FetchOutcome::Fetched(response) = outcome else {
            panic!("expected a fetched response");
        };
        assert!(response.is_html());
        assert_eq!(response.validators().etag.as_deref(), Some("\"abc\""));
        assert_eq!(&response.bytes().await.unwrap()[..], b"<html></html>");
    }

    #[tokio::test]
    async fn test_conditional_not_modified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/s.css"))
            .and(header_is("if-none-match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/s.css", server.uri())).unwrap();
        let conditional = ConditionalHeaders {
            if_none_match: Some("\"v1\"".to_string()),
            if_modified_since: None,
        };
        let outcome = client(false, None).get(&url, &conditional).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::NotModified));
    }

    #[tokio::test]
    async fn test_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = client(false, None)
            .get(&url, &ConditionalHeaders::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_transport_error() {
        let url = Url::parse("http://127.0.0.1:1/never").unwrap();
        let err = client(false, None)
            .get(&url, &ConditionalHeaders::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport { .. } | FetchError::Timeout { .. }
        ));
    }
}
