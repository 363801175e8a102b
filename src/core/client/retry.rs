/// Specifies the backoff strategy for retrying failed requests.
#[derive(Clone, Debug)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed(std::time::Duration),
    /// Uses an exponential delay between retries.
    /// The wait before attempt `n` is `factor ^ n` seconds, capped at `max`.
    Exponential {
        /// The multiplicative base for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: std::time::Duration,
    },
}

impl Backoff {
    /// Computes the wait before retry `attempt` (1-based).
    pub(crate) fn delay(&self, attempt: u32) -> std::time::Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::Exponential { factor, max } => {
                let secs = factor.powi(attempt as i32);
                std::time::Duration::from_secs_f64(secs).min(*max)
            }
        }
    }
}

/// Configuration for the automatic retry mechanism.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// The maximum number of retries to attempt. The total number of attempts
    /// will be `max_retries + 1`.
    pub max_retries: u32,
    /// The backoff strategy to use between retries.
    pub backoff: Backoff,
    /// Whether non-2xx statuses should trigger a retry.
    pub retry_on_status: bool,
    /// Whether to retry on request timeouts and connection errors.
    pub retry_on_network: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Backoff::Exponential {
                factor: 2.0,
                max: std::time::Duration::from_secs(30),
            },
            retry_on_status: true,
            retry_on_network: true,
        }
    }
}
