//! The JSON-to-rows boundary and the generic endpoint pipeline.
//!
//! Endpoint families differ only in three pure functions: validate the
//! caller's parameters, build the request batch, and shape one JSON response
//! into rows. Instead of a subclass per endpoint, an endpoint is a small
//! configuration record and [`run_endpoint`] is the one pipeline that
//! executes it: validate, build, authenticate, batch-fetch, shape,
//! concatenate. Failed requests within the batch are logged and dropped so
//! the caller still gets the rows that did arrive.

use serde_json::Value;

use crate::auth::CredentialKind;
use crate::core::{MsClient, MsError};
use crate::fetch::RequestBatch;

/// Turns one JSON response into this endpoint's rows. Defensive handling of
/// unexpected shapes is the shaper's job; the core never validates response
/// schema.
pub type Shaper<R> = fn(&Value) -> Vec<R>;

/// A declarative endpoint definition: which credential it needs and the
/// three pure functions that make it different from every other endpoint.
pub struct Endpoint<P, R> {
    /// Credential the endpoint family requires.
    pub auth: CredentialKind,
    /// Rejects bad caller parameters before anything is fetched.
    pub validate: fn(&P) -> Result<(), MsError>,
    /// Builds the request batch from validated parameters.
    pub build: fn(&P) -> Result<RequestBatch, MsError>,
    /// Shapes one JSON response into rows.
    pub shape: Shaper<R>,
}

/// Runs an endpoint definition end to end and returns the concatenated rows.
///
/// Per-request failures are logged and skipped; an empty row set with
/// warnings in the log is the partial-failure outcome, not an error.
///
/// # Errors
///
/// Fails only on invalid parameters, a batch that cannot be built, or
/// credential acquisition failure; never on individual request failures.
pub async fn run_endpoint<P, R>(
    client: &MsClient,
    endpoint: &Endpoint<P, R>,
    params: &P,
) -> Result<Vec<R>, MsError> {
    (endpoint.validate)(params)?;
    let batch = (endpoint.build)(params)?;
    // The first request's URL doubles as the WAF challenge target; every
    // descriptor in one batch hits the same endpoint family.
    let target = batch.iter().next().map(|d| &d.url);
    let headers = client.headers_for(endpoint.auth, target).await?;

    let outcomes = client.fetch_batch(&batch, &headers).await;

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for outcome in outcomes {
        match outcome {
            Ok(value) => rows.extend((endpoint.shape)(&value)),
            Err(_) => dropped += 1, // already logged by fetch_batch
        }
    }
    if dropped > 0 {
        tracing::warn!(
            dropped,
            of = batch.len(),
            "returning partial rows, some requests failed"
        );
    }
    Ok(rows)
}
