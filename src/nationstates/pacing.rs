//! Request pacing for the NationStates site and API.
//!
//! The site's scripting rules allow 50 API requests per rolling 30 seconds
//! and expect HTML page requests to be spaced out. The pacer is consulted
//! before every request and told about rate-limit headers afterwards.

use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// API requests allowed per window.
pub const API_LIMIT: usize = 50;

/// Length of the API rate-limit window.
pub const API_WINDOW: Duration = Duration::from_secs(30);

/// Lowest allowed spacing between HTML page requests.
pub const MIN_HTML_INTERVAL: Duration = Duration::from_secs(6);

/// Which rate limit a request counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Api,
    Html,
}

/// Tracks recent requests and computes how long to wait before the next.
#[derive(Debug)]
pub struct Pacer {
    api_limit: usize,
    api_window: Duration,
    api_sent: VecDeque<Instant>,
    html_interval: Duration,
    last_html: Option<Instant>,
    blocked_until: Option<Instant>,
}

impl Pacer {
    /// Create a pacer. HTML spacing below `MIN_HTML_INTERVAL` is raised to it.
    pub fn new(html_interval: Duration) -> Self {
        Self {
            api_limit: API_LIMIT,
            api_window: API_WINDOW,
            api_sent: VecDeque::new(),
            html_interval: html_interval.max(MIN_HTML_INTERVAL),
            last_html: None,
            blocked_until: None,
        }
    }

    pub fn html_interval(&self) -> Duration {
        self.html_interval
    }

    /// Delay required before a request of `kind` may be sent at `now`.
    pub fn delay_for(&self, kind: RequestKind, now: Instant) -> Duration {
        let blocked = self
            .blocked_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or_default();

        let paced = match kind {
            RequestKind::Html => self
                .last_html
                .map(|last| (last + self.html_interval).saturating_duration_since(now))
                .unwrap_or_default(),
            RequestKind::Api => {
                let in_window: Vec<&Instant> = self
                    .api_sent
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < self.api_window)
                    .collect();
                if in_window.len() < self.api_limit {
                    Duration::ZERO
                } else {
                    // Wait until enough of the oldest requests leave the window.
                    let oldest = in_window[in_window.len() - self.api_limit];
                    (*oldest + self.api_window).saturating_duration_since(now)
                }
            }
        };

        blocked.max(paced)
    }

    /// Note that a request of `kind` was sent at `now`.
    pub fn record(&mut self, kind: RequestKind, now: Instant) {
        match kind {
            RequestKind::Html => self.last_html = Some(now),
            RequestKind::Api => {
                while let Some(front) = self.api_sent.front() {
                    if now.saturating_duration_since(*front) >= self.api_window {
                        self.api_sent.pop_front();
                    } else {
                        break;
                    }
                }
                self.api_sent.push_back(now);
            }
        }
        if self.blocked_until.is_some_and(|until| until <= now) {
            self.blocked_until = None;
        }
    }

    /// Refuse all requests for `delay` from `now`.
    pub fn block_for(&mut self, delay: Duration, now: Instant) {
        let until = now + delay;
        if self.blocked_until.map_or(true, |current| current < until) {
            self.blocked_until = Some(until);
        }
    }

    /// Apply `RateLimit-Remaining` / `RateLimit-Reset` from a response.
    pub fn observe_headers(&mut self, headers: &HeaderMap, now: Instant) {
        let remaining = header_u64(headers, "ratelimit-remaining");
        let reset = header_u64(headers, "ratelimit-reset");
        if let (Some(0), Some(reset)) = (remaining, reset) {
            debug!(reset_secs = reset, "Rate-limit budget exhausted, pausing");
            self.block_for(Duration::from_secs(reset), now);
        }
    }

    /// Wait as long as required, then record the request.
    pub async fn acquire(&mut self, kind: RequestKind) {
        let delay = self.delay_for(kind, Instant::now());
        if !delay.is_zero() {
            debug!(?kind, delay_ms = delay.as_millis() as u64, "Pacing request");
            tokio::time::sleep(delay).await;
        }
        self.record(kind, Instant::now());
    }
}

/// `Retry-After` (seconds) from a 429 response.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_u64(headers, "retry-after")
        .or_else(|| header_u64(headers, "x-retry-after"))
        .map(Duration::from_secs)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
