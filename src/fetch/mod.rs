//! Resilient single and batched GETs.
//!
//! A batch is an ordered list of [`RequestDescriptor`]s. Dispatch is
//! concurrent with a bounded number of requests in flight, but the output
//! vector always lines up index-for-index with the input: slow requests do
//! not shuffle results, and a failed request becomes an `Err` entry instead
//! of sinking the whole batch.

use std::collections::BTreeMap;

use futures::StreamExt;
use reqwest::header::HeaderMap;
use serde_json::Value;
use url::Url;

use crate::core::{MsClient, MsError};

/// One logical HTTP GET: a URL, its query parameters, and caller-owned
/// metadata carried through untouched (e.g. which security or sector this
/// request belongs to, for later result labeling).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Base endpoint URL, without the query parameters below.
    pub url: Url,
    /// Query parameters, appended in order. Repeated keys are sent repeated.
    pub params: Vec<(String, String)>,
    /// Opaque labels for the caller's bookkeeping; never sent on the wire.
    pub metadata: BTreeMap<String, String>,
}

impl RequestDescriptor {
    /// Creates a descriptor with no parameters.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            params: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Sets a query parameter, replacing every existing entry for `key`.
    /// This is what partition plans use to overwrite `page` or the date
    /// bounds on a copied descriptor.
    #[must_use]
    pub fn set_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.retain(|(k, _)| k != key);
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Attaches a metadata label.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the first value of a query parameter, if present.
    #[must_use]
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The URL with all query parameters appended, as actually dispatched.
    #[must_use]
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.params.is_empty() {
            let mut qp = url.query_pairs_mut();
            for (k, v) in &self.params {
                qp.append_pair(k, v);
            }
        }
        url
    }
}

/// An ordered sequence of descriptors. Output of a batch fetch aligns with
/// this order.
#[derive(Clone, Debug, Default)]
pub struct RequestBatch(Vec<RequestDescriptor>);

impl RequestBatch {
    /// A batch of one.
    #[must_use]
    pub fn single(descriptor: RequestDescriptor) -> Self {
        Self(vec![descriptor])
    }

    /// One URL, many parameter sets: the shape of paginated and per-security
    /// queries against a single endpoint.
    #[must_use]
    pub fn fan_out_params(url: &Url, param_sets: Vec<Vec<(String, String)>>) -> Self {
        Self(
            param_sets
                .into_iter()
                .map(|params| RequestDescriptor {
                    url: url.clone(),
                    params,
                    metadata: BTreeMap::new(),
                })
                .collect(),
        )
    }

    /// Many URLs, one shared parameter set: the shape of per-security
    /// endpoints where the id is a path segment.
    #[must_use]
    pub fn fan_out_urls(urls: Vec<Url>, params: Vec<(String, String)>) -> Self {
        Self(
            urls.into_iter()
                .map(|url| RequestDescriptor {
                    url,
                    params: params.clone(),
                    metadata: BTreeMap::new(),
                })
                .collect(),
        )
    }

    /// Number of requests in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the batch holds no requests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the descriptors in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, RequestDescriptor> {
        self.0.iter()
    }

    /// Appends a descriptor.
    pub fn push(&mut self, descriptor: RequestDescriptor) {
        self.0.push(descriptor);
    }
}

impl From<Vec<RequestDescriptor>> for RequestBatch {
    fn from(v: Vec<RequestDescriptor>) -> Self {
        Self(v)
    }
}

impl IntoIterator for RequestBatch {
    type Item = RequestDescriptor;
    type IntoIter = std::vec::IntoIter<RequestDescriptor>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Why a single request within a batch failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection-level failure.
    Network,
    /// The request timed out.
    Timeout,
    /// Non-2xx status after retries were exhausted.
    Status(u16),
    /// The body was not valid JSON.
    Decode,
}

/// A per-request failure, captured instead of raised so the rest of the
/// batch still completes.
#[derive(Clone, Debug)]
pub struct FetchFailure {
    /// Coarse classification of the failure.
    pub kind: FailureKind,
    /// Human-readable detail from the underlying error.
    pub message: String,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FailureKind::Network => write!(f, "network error: {}", self.message),
            FailureKind::Timeout => write!(f, "timeout: {}", self.message),
            FailureKind::Status(s) => write!(f, "status {}: {}", s, self.message),
            FailureKind::Decode => write!(f, "decode error: {}", self.message),
        }
    }
}

impl std::error::Error for FetchFailure {}

impl FetchFailure {
    fn from_error(e: &MsError) -> Self {
        let kind = match e {
            MsError::Status { status, .. } => FailureKind::Status(*status),
            MsError::Json(_) => FailureKind::Decode,
            MsError::Http(h) => {
                if h.is_timeout() {
                    FailureKind::Timeout
                } else if h.is_decode() {
                    FailureKind::Decode
                } else {
                    FailureKind::Network
                }
            }
            _ => FailureKind::Network,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

/// Result of one request within a batch.
pub type FetchOutcome = Result<Value, FetchFailure>;

impl MsClient {
    /// Executes a single descriptor and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `MsError::Status` on a non-2xx response once retries are
    /// exhausted, or `MsError::Http` on transport failure.
    pub async fn fetch_one(
        &self,
        descriptor: &RequestDescriptor,
        headers: &HeaderMap,
    ) -> Result<Value, MsError> {
        let url = descriptor.full_url();
        let resp = self
            .send_with_retry(self.http().get(url).headers(headers.clone()))
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MsError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(resp.json::<Value>().await?)
    }

    /// Executes every descriptor in `batch` concurrently, at most
    /// `max_in_flight` at a time, and returns one [`FetchOutcome`] per
    /// descriptor in submission order.
    ///
    /// Individual failures are captured, logged, and returned in place;
    /// the batch itself never fails.
    pub async fn fetch_batch(
        &self,
        batch: &RequestBatch,
        headers: &HeaderMap,
    ) -> Vec<FetchOutcome> {
        let delay = self.inter_request_delay();

        let calls = batch.iter().map(|descriptor| async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match self.fetch_one(descriptor, headers).await {
                Ok(value) => Ok(value),
                Err(e) => {
                    let failure = FetchFailure::from_error(&e);
                    tracing::error!(
                        url = %descriptor.url,
                        failure = %failure,
                        "request failed within batch"
                    );
                    Err(failure)
                }
            }
        });

        // `buffered` (not `buffer_unordered`) keeps completion aligned with
        // submission order while still running up to `max_in_flight` at once.
        futures::stream::iter(calls)
            .buffered(self.max_in_flight())
            .collect()
            .await
    }
}
