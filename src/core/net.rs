//! Retrying sender shared by the auth and fetch layers.

use reqwest::{RequestBuilder, Response};

use crate::core::MsError;

impl crate::core::MsClient {
    /// Sends `req`, retrying on network errors and non-2xx statuses per the
    /// client's retry policy.
    ///
    /// The wait before retry `n` comes from the configured backoff (default:
    /// `factor ^ n` seconds). After retries are exhausted, the final
    /// non-success response is returned as `Ok` so callers can inspect the
    /// status and body themselves; only transport errors surface as `Err`.
    pub(crate) async fn send_with_retry(&self, req: RequestBuilder) -> Result<Response, MsError> {
        let cfg = self.retry();
        let mut attempt: u32 = 0;

        loop {
            let this_try = req
                .try_clone()
                .ok_or_else(|| MsError::Data("request is not clonable for retry".into()))?;

            match this_try.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() || !cfg.retry_on_status || attempt >= cfg.max_retries {
                        return Ok(resp);
                    }
                    attempt += 1;
                    let wait = cfg.backoff.delay(attempt);
                    tracing::warn!(
                        status = status.as_u16(),
                        url = %resp.url(),
                        attempt,
                        max_retries = cfg.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        "request returned non-success status, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    let retryable =
                        cfg.retry_on_network && (e.is_timeout() || e.is_connect() || e.is_request());
                    if !retryable || attempt >= cfg.max_retries {
                        return Err(e.into());
                    }
                    attempt += 1;
                    let wait = cfg.backoff.delay(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = cfg.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
