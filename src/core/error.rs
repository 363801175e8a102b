use thiserror::Error;

use crate::auth::CredentialKind;

/// The primary error type for all fallible operations in this crate.
#[derive(Debug, Error)]
pub enum MsError {
    /// An error occurred during an HTTP request.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A response body could not be parsed as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The credential store could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server returned an unexpected or unsuccessful HTTP status code.
    #[error("Unexpected response status: {status} at {url}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The URL that returned the error.
        url: String,
    },

    /// A credential could not be obtained live and the store held no prior value.
    #[error("no {0} available: live fetch failed and the credential store is empty")]
    CredentialNotFound(CredentialKind),

    /// A live page/script was fetched but the expected token was not in it.
    #[error("token extraction failed: {0}")]
    Extraction(String),

    /// The injected browser-cookie harvester failed or is not configured.
    #[error("cookie harvest failed: {0}")]
    Harvest(String),

    /// An invalid date range was provided (start must be on or before end,
    /// and the range must contain at least one business day).
    #[error("invalid date range: start must be before end and span a business day")]
    InvalidDates,

    /// The data received was in an unexpected format or missing a required field.
    #[error("Data format unexpected or missing field: {0}")]
    Data(String),
}
