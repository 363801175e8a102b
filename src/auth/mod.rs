//! Credential kinds, token extraction, and the pluggable pieces of the
//! authentication layer (disk store, browser-cookie harvester).
//!
//! Acquisition itself (live fetch, fallback, write-through) lives on
//! [`MsClient`](crate::MsClient); see `headers_for` and the per-kind
//! accessors there.

mod harvester;
mod store;

pub use harvester::TokenHarvester;
pub use store::CredentialStore;

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// The authentication scheme an endpoint family requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Apigee API key, scraped out of the sal-components JS bundle.
    ApiKey,
    /// MAAS bearer token, served verbatim by a token endpoint.
    BearerToken,
    /// Realtime-quote token, scraped from the same JS bundle as the API key.
    RealtimeToken,
    /// AWS WAF challenge token, harvested from browser cookies.
    WafToken,
    /// Endpoint needs no authentication.
    None,
}

impl CredentialKind {
    /// Key under which this credential is persisted in the store.
    pub(crate) fn store_key(self) -> Option<&'static str> {
        match self {
            Self::ApiKey => Some("apikey"),
            Self::BearerToken => Some("maas_token"),
            Self::RealtimeToken => Some("token_real_time"),
            Self::WafToken => Some("waf_token"),
            Self::None => None,
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ApiKey => "API key",
            Self::BearerToken => "MAAS bearer token",
            Self::RealtimeToken => "realtime token",
            Self::WafToken => "WAF token",
            Self::None => "no credential",
        };
        f.write_str(s)
    }
}

static KEY_APIGEE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"keyApigee\s*[:=]\s*["']([^"']+)["']"#).expect("static regex")
});

static TOKEN_REALTIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"tokenRealtime\s*[:=]\s*["']([^"']+)["']"#).expect("static regex")
});

/// Pulls the Apigee API key out of the sal-components bundle source.
pub(crate) fn extract_api_key(bundle: &str) -> Option<String> {
    KEY_APIGEE_RE
        .captures(bundle)
        .map(|c| c[1].to_string())
        .filter(|t| !t.is_empty())
}

/// Pulls the realtime-quote token out of the sal-components bundle source.
pub(crate) fn extract_realtime_token(bundle: &str) -> Option<String> {
    TOKEN_REALTIME_RE
        .captures(bundle)
        .map(|c| c[1].to_string())
        .filter(|t| !t.is_empty())
}

/// Picks the WAF token out of a harvested cookie jar: the first cookie whose
/// name contains "waf" or "token" (case-insensitive). Iteration order over
/// the map is arbitrary, matching the original heuristic's looseness; real
/// jars carry exactly one such cookie.
pub(crate) fn pick_waf_cookie(cookies: &HashMap<String, String>) -> Option<String> {
    cookies
        .iter()
        .find(|(name, value)| {
            let name = name.to_lowercase();
            (name.contains("waf") || name.contains("token")) && !value.is_empty()
        })
        .map(|(_, value)| value.clone())
}
