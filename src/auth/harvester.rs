use std::collections::HashMap;

use crate::core::MsError;

/// Injected browser-automation capability used for WAF token acquisition.
///
/// The contract is deliberately narrow: open a headless browser session,
/// navigate to `url`, wait for page-load-complete, and return every cookie
/// the page set as a name-to-value map. Implementations must tear the
/// browser session down on every exit path, including errors and timeouts.
///
/// The core never drives a browser itself; it only consumes the resulting
/// jar, which keeps the credential fallback and caching logic testable with
/// an in-memory fake.
#[async_trait::async_trait]
pub trait TokenHarvester: Send + Sync {
    /// Navigates to `url` and returns the cookies set by the loaded page.
    async fn harvest(&self, url: &str) -> Result<HashMap<String, String>, MsError>;
}
