//! Public client surface + builder.
//! Internals are split into `auth` (credential acquisition + headers),
//! `retry` (backoff policy), and `constants` (UA + default endpoints).

mod auth;
pub(crate) mod constants;
mod retry;

pub use retry::{Backoff, RetryConfig};

use crate::auth::{CredentialKind, CredentialStore, TokenHarvester};
use crate::core::MsError;
use constants::{
    DEFAULT_BUNDLE_URL, DEFAULT_MAAS_TOKEN_URL, DEFAULT_MAX_IN_FLIGHT, DEFAULT_TIMEOUT_SECS,
    DEFAULT_WAF_PAGE_URL, USER_AGENT,
};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use url::Url;

/// In-memory credential slots. Tokens never expire on their own; a slot is
/// only replaced by a `force_refresh` or an explicit refresh after a live
/// fetch succeeds.
#[derive(Debug, Default)]
struct CredentialState {
    api_key: Option<String>,
    maas_token: Option<String>,
    realtime_token: Option<String>,
    waf_token: Option<String>,
}

impl CredentialState {
    fn slot(&self, kind: CredentialKind) -> Option<&String> {
        match kind {
            CredentialKind::ApiKey => self.api_key.as_ref(),
            CredentialKind::BearerToken => self.maas_token.as_ref(),
            CredentialKind::RealtimeToken => self.realtime_token.as_ref(),
            CredentialKind::WafToken => self.waf_token.as_ref(),
            CredentialKind::None => None,
        }
    }

    fn set_slot(&mut self, kind: CredentialKind, value: String) {
        match kind {
            CredentialKind::ApiKey => self.api_key = Some(value),
            CredentialKind::BearerToken => self.maas_token = Some(value),
            CredentialKind::RealtimeToken => self.realtime_token = Some(value),
            CredentialKind::WafToken => self.waf_token = Some(value),
            CredentialKind::None => {}
        }
    }

    fn clear_slot(&mut self, kind: CredentialKind) {
        match kind {
            CredentialKind::ApiKey => self.api_key = None,
            CredentialKind::BearerToken => self.maas_token = None,
            CredentialKind::RealtimeToken => self.realtime_token = None,
            CredentialKind::WafToken => self.waf_token = None,
            CredentialKind::None => {}
        }
    }
}

/// One refresh lock per credential kind so concurrent callers of the same
/// kind coalesce into a single live fetch, while different kinds refresh
/// independently.
#[derive(Debug, Default)]
struct RefreshLocks {
    api_key: Mutex<()>,
    maas_token: Mutex<()>,
    realtime_token: Mutex<()>,
    waf_token: Mutex<()>,
}

impl RefreshLocks {
    fn for_kind(&self, kind: CredentialKind) -> &Mutex<()> {
        match kind {
            CredentialKind::ApiKey => &self.api_key,
            CredentialKind::BearerToken => &self.maas_token,
            CredentialKind::RealtimeToken => &self.realtime_token,
            // `None` never refreshes; any lock works as a placeholder.
            CredentialKind::WafToken | CredentialKind::None => &self.waf_token,
        }
    }
}

/// The Morningstar client: a configured HTTP client, the credential
/// acquisition endpoints, and shared credential state.
///
/// Cloning is cheap; clones share credential state and the disk store, so a
/// token fetched through one clone is visible to all.
#[derive(Clone)]
pub struct MsClient {
    http: Client,
    bundle_url: Url,
    maas_token_url: Url,
    waf_page_url: Url,

    retry: RetryConfig,
    max_in_flight: usize,
    inter_request_delay: Option<Duration>,

    state: Arc<RwLock<CredentialState>>,
    refresh_locks: Arc<RefreshLocks>,
    store: Option<Arc<StdMutex<CredentialStore>>>,
    harvester: Option<Arc<dyn TokenHarvester>>,
}

impl Default for MsClient {
    fn default() -> Self {
        Self::builder().build().expect("default client")
    }
}

impl MsClient {
    /// Create a new builder.
    pub fn builder() -> MsClientBuilder {
        MsClientBuilder::default()
    }

    /* -------- internal getters used by other modules -------- */

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }
    pub(crate) fn retry(&self) -> &RetryConfig {
        &self.retry
    }
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
    pub(crate) fn inter_request_delay(&self) -> Option<Duration> {
        self.inter_request_delay
    }

    fn bundle_url(&self) -> &Url {
        &self.bundle_url
    }
    fn maas_token_url(&self) -> &Url {
        &self.maas_token_url
    }
    fn waf_page_url(&self) -> &Url {
        &self.waf_page_url
    }
}

/* ----------------------- Builder ----------------------- */

/// Builder for [`MsClient`].
#[derive(Default)]
pub struct MsClientBuilder {
    user_agent: Option<String>,
    bundle_url: Option<Url>,
    maas_token_url: Option<Url>,
    waf_page_url: Option<Url>,

    retry: Option<RetryConfig>,
    max_in_flight: Option<usize>,
    inter_request_delay: Option<Duration>,

    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,

    store_path: Option<PathBuf>,
    harvester: Option<Arc<dyn TokenHarvester>>,
}

impl MsClientBuilder {
    /// Override the User-Agent (helpful if Morningstar throttles generic UAs).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Override the sal-components bundle URL the API key and realtime token
    /// are scraped from. The deployed bundle version drifts over time.
    #[must_use]
    pub fn bundle_url(mut self, url: Url) -> Self {
        self.bundle_url = Some(url);
        self
    }

    /// Override the MAAS token endpoint.
    #[must_use]
    pub fn maas_token_url(mut self, url: Url) -> Self {
        self.maas_token_url = Some(url);
        self
    }

    /// Override the page used to trigger the WAF challenge.
    #[must_use]
    pub fn waf_page_url(mut self, url: Url) -> Self {
        self.waf_page_url = Some(url);
        self
    }

    /// Replace the default retry policy.
    #[must_use]
    pub fn retry_config(mut self, cfg: RetryConfig) -> Self {
        self.retry = Some(cfg);
        self
    }

    /// Cap on simultaneous in-flight requests within one batch. Default: 10.
    /// Raising this past ~50 tends to trip the anti-bot layer.
    #[must_use]
    pub const fn max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = Some(n);
        self
    }

    /// Fixed pause inserted before each request within a batch. Default: none.
    #[must_use]
    pub const fn inter_request_delay(mut self, delay: Duration) -> Self {
        self.inter_request_delay = Some(delay);
        self
    }

    /// Set a per-request timeout. Default: 20 seconds.
    #[must_use]
    pub const fn timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }

    /// Set a connect timeout. Default: none.
    #[must_use]
    pub const fn connect_timeout(mut self, dur: Duration) -> Self {
        self.connect_timeout = Some(dur);
        self
    }

    /// Enable the disk-backed credential store at `path`. Tokens fetched live
    /// are written through; live failures fall back to the last stored value.
    /// If not set, there is no fallback beyond in-memory state.
    #[must_use]
    pub fn credential_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Inject the browser-cookie harvester used for WAF tokens. Without one,
    /// WAF token acquisition can only succeed from the store.
    #[must_use]
    pub fn token_harvester(mut self, harvester: Arc<dyn TokenHarvester>) -> Self {
        self.harvester = Some(harvester);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns `MsError` if a default URL fails to parse or the underlying
    /// HTTP client cannot be constructed.
    pub fn build(self) -> Result<MsClient, MsError> {
        let bundle_url = self.bundle_url.unwrap_or(Url::parse(DEFAULT_BUNDLE_URL)?);
        let maas_token_url = self
            .maas_token_url
            .unwrap_or(Url::parse(DEFAULT_MAAS_TOKEN_URL)?);
        let waf_page_url = self
            .waf_page_url
            .unwrap_or(Url::parse(DEFAULT_WAF_PAGE_URL)?);

        let mut httpb = reqwest::Client::builder()
            .user_agent(self.user_agent.as_deref().unwrap_or(USER_AGENT))
            .cookie_store(true)
            .timeout(
                self.timeout
                    .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            );

        if let Some(ct) = self.connect_timeout {
            httpb = httpb.connect_timeout(ct);
        }

        let http = httpb.build()?;

        Ok(MsClient {
            http,
            bundle_url,
            maas_token_url,
            waf_page_url,
            retry: self.retry.unwrap_or_default(),
            max_in_flight: self.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT).max(1),
            inter_request_delay: self.inter_request_delay,
            state: Arc::new(RwLock::new(CredentialState::default())),
            refresh_locks: Arc::new(RefreshLocks::default()),
            store: self
                .store_path
                .map(|p| Arc::new(StdMutex::new(CredentialStore::open(p)))),
            harvester: self.harvester,
        })
    }
}
