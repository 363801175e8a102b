//! Centralized constants for default endpoints, UA, and browser headers.

/// Default desktop UA to avoid trivial bot blocking.
pub(crate) const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) ",
    "Chrome/142.0.0.0 Safari/537.36"
);

/// The sal-components bundle that embeds `keyApigee` and `tokenRealtime`.
/// The version segment changes when Morningstar redeploys; override it via
/// the builder when it drifts.
pub(crate) const DEFAULT_BUNDLE_URL: &str =
    "https://global.morningstar.com/assets/quotes/1.0.41/sal-components.umd.min.7516.js";

/// Endpoint whose whole response body is the MAAS bearer token.
pub(crate) const DEFAULT_MAAS_TOKEN_URL: &str =
    "https://www.morningstar.com/api/v2/stores/maas/token";

/// A page that triggers the AWS WAF challenge and sets the token cookie.
pub(crate) const DEFAULT_WAF_PAGE_URL: &str = "https://www.morningstar.com/markets/calendar";

/// Browser-mimicking headers sent with every request. Endpoints behind the
/// anti-bot layer reject requests without the sec-* set.
pub(crate) const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("accept", "application/json, text/plain, */*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("origin", "https://www.morningstar.com"),
    (
        "sec-ch-ua",
        "\"Chromium\";v=\"142\", \"Google Chrome\";v=\"142\", \"Not_A Brand\";v=\"99\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "Windows"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
];

/// Default per-request timeout, matching the site's observed tolerance.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Default cap on simultaneous in-flight requests within one batch.
pub(crate) const DEFAULT_MAX_IN_FLIGHT: usize = 10;
