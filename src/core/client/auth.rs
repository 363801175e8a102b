//! Credential acquisition for Morningstar endpoints.
//!
//! Every kind follows the same policy, lifted straight from how the site has
//! to be scraped in practice:
//!
//! 1. return the in-memory token unless `force_refresh`;
//! 2. attempt a live derivation (bundle scrape, whole-body token endpoint,
//!    or browser cookie harvest);
//! 3. on failure or empty extraction, fall back to the disk store;
//! 4. if both are empty, fail with `CredentialNotFound`;
//! 5. on live success, write through to memory and the store.
//!
//! Tokens carry no TTL. The site never announces expiry, so the only
//! invalidation is an explicit `force_refresh` after a request starts
//! failing.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::auth::{self, CredentialKind};
use crate::core::MsError;
use crate::core::client::constants::DEFAULT_HEADERS;

impl super::MsClient {
    /// The Apigee API key, scraped from the sal-components bundle.
    ///
    /// # Errors
    ///
    /// Returns [`MsError::CredentialNotFound`] when the live scrape fails and
    /// the store holds no prior value.
    pub async fn api_key(&self, force_refresh: bool) -> Result<String, MsError> {
        self.credential(CredentialKind::ApiKey, force_refresh, None)
            .await
    }

    /// The MAAS bearer token, served verbatim by the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`MsError::CredentialNotFound`] when the live fetch fails and
    /// the store holds no prior value.
    pub async fn maas_token(&self, force_refresh: bool) -> Result<String, MsError> {
        self.credential(CredentialKind::BearerToken, force_refresh, None)
            .await
    }

    /// The realtime-quote token, scraped from the same bundle as the API key.
    ///
    /// This one never travels in headers; callers embed it in query params
    /// when building realtime request descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`MsError::CredentialNotFound`] when the live scrape fails and
    /// the store holds no prior value.
    pub async fn realtime_token(&self, force_refresh: bool) -> Result<String, MsError> {
        self.credential(CredentialKind::RealtimeToken, force_refresh, None)
            .await
    }

    /// The AWS WAF challenge token, harvested from browser cookies by the
    /// injected [`TokenHarvester`](crate::TokenHarvester).
    ///
    /// `target` is the endpoint the token is for; the harvester navigates
    /// there so the challenge is solved on the page actually protected.
    /// `None` uses the configured default WAF page.
    ///
    /// # Errors
    ///
    /// Returns [`MsError::CredentialNotFound`] when no harvester is
    /// configured (or it fails) and the store holds no prior value.
    pub async fn waf_token(
        &self,
        force_refresh: bool,
        target: Option<&Url>,
    ) -> Result<String, MsError> {
        self.credential(CredentialKind::WafToken, force_refresh, target)
            .await
    }

    /// Drops the in-memory copy of `kind` so the next access re-derives it.
    /// The disk store keeps its last known-good value as the fallback.
    pub async fn invalidate(&self, kind: CredentialKind) {
        self.state.write().await.clear_slot(kind);
    }

    /// Builds the header map for an endpoint requiring `kind`.
    ///
    /// All kinds get the browser-mimicking base set; `ApiKey`, `BearerToken`
    /// and `WafToken` additionally inject `apikey`, `authorization: Bearer`
    /// and `x-aws-waf-token` respectively. `None` and `RealtimeToken` add
    /// nothing (the realtime token is a query-string credential).
    ///
    /// `target` is the endpoint about to be hit. Only the WAF harvest
    /// consumes it (the challenge must be solved on the protected page
    /// itself); `None` falls back to the configured default WAF page.
    ///
    /// # Errors
    ///
    /// Propagates credential acquisition failures; also fails if a token
    /// contains bytes that are not a legal header value.
    pub async fn headers_for(
        &self,
        kind: CredentialKind,
        target: Option<&Url>,
    ) -> Result<HeaderMap, MsError> {
        let mut headers = base_headers();
        match kind {
            CredentialKind::None | CredentialKind::RealtimeToken => {}
            CredentialKind::ApiKey => {
                let key = self.api_key(false).await?;
                headers.insert(HeaderName::from_static("apikey"), header_value(&key)?);
            }
            CredentialKind::BearerToken => {
                let token = self.maas_token(false).await?;
                headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
            }
            CredentialKind::WafToken => {
                let token = self.waf_token(false, target).await?;
                headers.insert(
                    HeaderName::from_static("x-aws-waf-token"),
                    header_value(&token)?,
                );
            }
        }
        Ok(headers)
    }

    /* ---------------- internals ---------------- */

    async fn credential(
        &self,
        kind: CredentialKind,
        force_refresh: bool,
        target: Option<&Url>,
    ) -> Result<String, MsError> {
        // Fast path: a previously derived token, behind a read lock.
        if !force_refresh
            && let Some(token) = self.state.read().await.slot(kind)
        {
            return Ok(token.clone());
        }

        // Slow path: serialize refreshes per kind so concurrent callers
        // coalesce into one live fetch.
        let _guard = self.refresh_locks.for_kind(kind).lock().await;

        if !force_refresh
            && let Some(token) = self.state.read().await.slot(kind)
        {
            return Ok(token.clone());
        }

        match self.fetch_live(kind, target).await {
            Ok(token) => {
                self.state.write().await.set_slot(kind, token.clone());
                self.persist(kind, &token);
                Ok(token)
            }
            Err(live_err) => {
                if let Some(stored) = self.stored(kind) {
                    tracing::warn!(
                        credential = %kind,
                        error = %live_err,
                        "live credential fetch failed, using stored value"
                    );
                    // Memory stays empty on purpose: the next call retries
                    // the live path instead of pinning a possibly stale token.
                    return Ok(stored);
                }
                tracing::warn!(credential = %kind, error = %live_err, "live credential fetch failed and store is empty");
                Err(MsError::CredentialNotFound(kind))
            }
        }
    }

    async fn fetch_live(
        &self,
        kind: CredentialKind,
        target: Option<&Url>,
    ) -> Result<String, MsError> {
        match kind {
            CredentialKind::ApiKey => {
                let body = self.fetch_text(self.bundle_url().clone()).await?;
                auth::extract_api_key(&body)
                    .ok_or_else(|| MsError::Extraction("keyApigee not found in bundle".into()))
            }
            CredentialKind::RealtimeToken => {
                let body = self.fetch_text(self.bundle_url().clone()).await?;
                auth::extract_realtime_token(&body)
                    .ok_or_else(|| MsError::Extraction("tokenRealtime not found in bundle".into()))
            }
            CredentialKind::BearerToken => {
                let body = self.fetch_text(self.maas_token_url().clone()).await?;
                let token = body.trim().to_string();
                if token.is_empty() {
                    return Err(MsError::Extraction("MAAS endpoint returned empty body".into()));
                }
                Ok(token)
            }
            CredentialKind::WafToken => {
                let harvester = self
                    .harvester
                    .as_ref()
                    .ok_or_else(|| MsError::Harvest("no token harvester configured".into()))?;
                let page = target.unwrap_or_else(|| self.waf_page_url());
                let jar = harvester.harvest(page.as_str()).await?;
                auth::pick_waf_cookie(&jar).ok_or_else(|| {
                    MsError::Extraction("no waf/token cookie in harvested jar".into())
                })
            }
            CredentialKind::None => {
                Err(MsError::Data("no live fetch for unauthenticated endpoints".into()))
            }
        }
    }

    async fn fetch_text(&self, url: Url) -> Result<String, MsError> {
        let resp = self
            .send_with_retry(self.http().get(url).headers(base_headers()))
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(MsError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(resp.text().await?)
    }

    fn stored(&self, kind: CredentialKind) -> Option<String> {
        let key = kind.store_key()?;
        let store = self.store.as_ref()?;
        let guard = store.lock().ok()?;
        guard.get(key)
    }

    fn persist(&self, kind: CredentialKind, token: &str) {
        let Some(key) = kind.store_key() else { return };
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let Ok(mut guard) = store.lock() else { return };
        if let Err(e) = guard.set(key, token) {
            // The token itself is good; a failed write-through only costs
            // the fallback, so log instead of failing the caller.
            tracing::warn!(credential = %kind, error = %e, "credential store write failed");
        }
    }
}

pub(crate) fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(DEFAULT_HEADERS.len());
    for (name, value) in DEFAULT_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

fn header_value(raw: &str) -> Result<HeaderValue, MsError> {
    HeaderValue::from_str(raw)
        .map_err(|_| MsError::Extraction(format!("credential is not a valid header value: {raw:?}")))
}
