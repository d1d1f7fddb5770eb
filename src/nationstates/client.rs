//! HTTP implementation of `NationSession`.
//!
//! Talks to the HTML site (with `template-overall=none` to keep pages
//! small) for everything a logged-in player does, and to the public API
//! for population lookups. Every request goes through the `Pacer`, and the
//! pacer lock is held for the whole request so only one is ever in flight.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::pacing::{retry_after, Pacer, RequestKind};
use super::{parse, user_agent, NationSession};
use crate::types::{
    canonicalize, CardBid, NationName, NationSettings, NewNation, QueError, RegionTarget,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://www.nationstates.net";
const API_PATH: &str = "/cgi-bin/api.cgi";

/// Maximum retries on rate limit / server errors.
const MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 1000;

/// Wait applied to a 429 that carries no `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Flag image used on the founding form; the configured flag is uploaded
/// separately.
const FOUNDING_FLAG: &str = "Default.svg";

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SessionState {
    /// Canonical name of the logged-in nation.
    nation: Option<String>,
    chk: Option<String>,
    localid: Option<String>,
    last_page: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// NationStates session over HTTP.
pub struct NsClient {
    http: Client,
    base_url: String,
    pacer: tokio::sync::Mutex<Pacer>,
    state: Mutex<SessionState>,
    retry_backoff: Duration,
}

impl NsClient {
    /// Create a client identifying as `contact`, spacing HTML requests by
    /// at least `html_interval`.
    pub fn new(contact: &str, html_interval: Duration) -> Result<Self> {
        let ua = user_agent(contact);
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(ua.as_str())
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client for NationStates")?;

        let pacer = Pacer::new(html_interval);
        info!(
            user_agent = %ua,
            html_interval_secs = pacer.html_interval().as_secs(),
            "NationStates session created"
        );

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            pacer: tokio::sync::Mutex::new(pacer),
            state: Mutex::new(SessionState::default()),
            retry_backoff: Duration::from_millis(BASE_BACKOFF_MS),
        })
    }

    /// Point the client at another host (a local mirror or test server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Base delay for exponential backoff after server and transport errors.
    pub fn with_retry_backoff(mut self, base: Duration) -> Self {
        self.retry_backoff = base;
        self
    }

    // -- Internal helpers ------------------------------------------------

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn page_url(&self, page: &str) -> String {
        format!("{}/template-overall=none/page={page}", self.base_url)
    }

    /// Send a request with pacing, retry and backoff, returning the body.
    ///
    /// `build` is called once per attempt since request bodies cannot
    /// always be cloned.
    async fn send<F>(&self, kind: RequestKind, build: F) -> Result<String>
    where
        F: Fn() -> Result<RequestBuilder> + Send + Sync,
    {
        let mut pacer = self.pacer.lock().await;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            pacer.acquire(kind).await;

            match build()?.send().await {
                Ok(response) => {
                    let status = response.status();
                    pacer.observe_headers(response.headers(), Instant::now());

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let wait = retry_after(response.headers()).unwrap_or(DEFAULT_RETRY_AFTER);
                        warn!(attempt, retry_after_secs = wait.as_secs(), "Rate limited by NationStates");
                        pacer.block_for(wait, Instant::now());
                        last_error = Some(
                            QueError::RateLimited {
                                retry_after_secs: wait.as_secs(),
                            }
                            .to_string(),
                        );
                        continue;
                    }

                    if status.is_server_error() {
                        let delay = self.retry_backoff * 2u32.pow(attempt);
                        warn!(status = %status, attempt, "Retryable NationStates error");
                        pacer.block_for(delay, Instant::now());
                        last_error = Some(format!("HTTP {status}"));
                        continue;
                    }

                    let body = response
                        .text()
                        .await
                        .context("Failed to read NationStates response body")?;

                    if !status.is_success() {
                        let snippet: String = body.chars().take(200).collect();
                        anyhow::bail!("NationStates error {status}: {snippet}");
                    }

                    return Ok(body);
                }
                Err(e) => {
                    let delay = self.retry_backoff * 2u32.pow(attempt);
                    warn!(attempt, error = %e, "NationStates request failed");
                    pacer.block_for(delay, Instant::now());
                    last_error = Some(format!("Request error: {e}"));
                }
            }
        }

        anyhow::bail!(
            "NationStates request failed after {} retries: {}",
            MAX_RETRIES,
            last_error.unwrap_or_default()
        )
    }

    async fn get_page(&self, page: &str, query: &[(&str, String)]) -> Result<String> {
        let url = self.page_url(page);
        debug!(url = %url, "GET page");
        let html = self
            .send(RequestKind::Html, || Ok(self.http.get(&url).query(query)))
            .await?;
        self.absorb_page(&html);
        Ok(html)
    }

    async fn post_page(&self, page: &str, mut form: Vec<(&str, String)>) -> Result<String> {
        let url = self.page_url(page);
        form.push(("userclick", Utc::now().timestamp_millis().to_string()));
        debug!(url = %url, "POST page");
        let html = self
            .send(RequestKind::Html, || Ok(self.http.post(&url).form(&form)))
            .await?;
        self.absorb_page(&html);
        Ok(html)
    }

    /// Remember the page and refresh form tokens from it.
    fn absorb_page(&self, html: &str) {
        let mut state = self.state();
        if let Some(chk) = parse::chk(html) {
            state.chk = Some(chk);
        }
        if let Some(localid) = parse::localid(html) {
            state.localid = Some(localid);
        }
        state.last_page = Some(html.to_string());
    }

    fn require_login(&self) -> Result<String> {
        self.state().nation.clone().ok_or_else(|| QueError::NotLoggedIn.into())
    }

    fn require_chk(&self) -> Result<String> {
        self.require_login()?;
        self.state().chk.clone().ok_or_else(|| QueError::NotLoggedIn.into())
    }

    fn require_localid(&self) -> Result<String> {
        self.require_login()?;
        self.state().localid.clone().ok_or_else(|| QueError::NotLoggedIn.into())
    }

    /// Turn a site error banner into an error.
    fn ensure_no_error(html: &str) -> Result<()> {
        match parse::error_message(html) {
            Some(message) => Err(QueError::SiteError(message).into()),
            None => Ok(()),
        }
    }
}

/// Content type for an uploaded flag, by file extension.
fn flag_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// NationSession trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl NationSession for NsClient {
    async fn can_nation_be_founded(&self, nation: &NationName) -> Result<bool> {
        let html = self
            .get_page("boneyard", &[("nation", nation.canonical())])
            .await
            .with_context(|| format!("Boneyard lookup failed for {nation}"))?;
        Ok(parse::is_foundable(&html))
    }

    async fn create_nation(
        &self,
        nation: &NationName,
        password: &str,
        details: &NewNation,
    ) -> Result<()> {
        let form = vec![
            ("name", nation.as_str().to_string()),
            ("type", details.classification.clone()),
            ("flag", FOUNDING_FLAG.to_string()),
            ("currency", details.currency.clone()),
            ("animal", details.animal.clone()),
            ("slogan", details.slogan.clone()),
            ("email", details.email.clone()),
            ("password", password.to_string()),
            ("confirm_password", password.to_string()),
            ("legal", "1".to_string()),
            ("create_nation", "1".to_string()),
        ];

        let html = self.post_page("create_nation", form).await?;
        Self::ensure_no_error(&html)?;

        let canonical = nation.canonical();
        match parse::logged_in_nation(&html) {
            Some(logged) if canonicalize(&logged) == canonical => {
                self.state().nation = Some(canonical);
                info!(nation = %nation, "Nation founded");
                Ok(())
            }
            _ => anyhow::bail!("Founding {nation} was not confirmed by the site"),
        }
    }

    async fn login(&self, nation: &NationName, password: &str) -> Result<bool> {
        *self.state() = SessionState::default();

        let form = vec![
            ("logging_in", "1".to_string()),
            ("nation", nation.canonical()),
            ("password", password.to_string()),
            ("autologin", "no".to_string()),
        ];
        let html = self.post_page("settings", form).await?;

        let canonical = nation.canonical();
        match parse::logged_in_nation(&html) {
            Some(logged) if canonicalize(&logged) == canonical => {
                self.state().nation = Some(canonical);
                debug!(nation = %nation, "Logged in");
                Ok(true)
            }
            other => {
                debug!(
                    nation = %nation,
                    page_nation = ?other,
                    site_error = ?parse::error_message(&html),
                    "Login refused"
                );
                Ok(false)
            }
        }
    }

    async fn population(&self, nation: &NationName) -> Result<u64> {
        let url = format!(
            "{}{API_PATH}?nation={}&q=population",
            self.base_url,
            urlencoding::encode(&nation.canonical())
        );
        debug!(url = %url, "GET api");
        let xml = self
            .send(RequestKind::Api, || Ok(self.http.get(&url)))
            .await
            .with_context(|| format!("Population lookup failed for {nation}"))?;
        parse::population(&xml)
    }

    async fn change_settings(&self, settings: &NationSettings) -> Result<()> {
        let chk = self.require_chk()?;
        let mut form = vec![("chk", chk), ("update", "1".to_string())];
        form.extend(settings.form_fields());

        let html = self.post_page("settings", form).await?;
        Self::ensure_no_error(&html)
    }

    async fn change_flag(&self, flag: &Path) -> Result<()> {
        let chk = self.require_chk()?;
        let bytes = tokio::fs::read(flag)
            .await
            .with_context(|| format!("Failed to read flag file: {}", flag.display()))?;
        let file_name = flag
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "flag".to_string());
        let mime = flag_mime(flag);
        let url = self.page_url("settings");

        let html = self
            .send(RequestKind::Html, || {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)?;
                let form = Form::new()
                    .text("chk", chk.clone())
                    .text("uploadflag", "1")
                    .text("userclick", Utc::now().timestamp_millis().to_string())
                    .part("file", part);
                Ok(self.http.post(&url).multipart(form))
            })
            .await?;
        self.absorb_page(&html);
        Self::ensure_no_error(&html)
    }

    async fn move_to_region(&self, target: &RegionTarget) -> Result<()> {
        let localid = self.require_localid()?;
        let mut form = vec![
            ("localid", localid),
            ("region_name", canonicalize(&target.name)),
            ("move_region", "1".to_string()),
        ];
        if let Some(password) = &target.password {
            form.push(("password", password.clone()));
        }

        let html = self.post_page("change_region", form).await?;
        Self::ensure_no_error(&html)
    }

    async fn bid(&self, bid: &CardBid) -> Result<()> {
        let chk = self.require_chk()?;
        let page = format!("deck/card={}/season={}", bid.card_id, bid.season);
        let form = vec![
            ("chk", chk),
            ("auction_bid", "1".to_string()),
            ("new_price", format!("{:.2}", bid.price)),
        ];

        let html = self.post_page(&page, form).await?;
        Self::ensure_no_error(&html)
    }

    fn current_page(&self) -> Option<String> {
        self.state().last_page.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
