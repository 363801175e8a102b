//! morningstar-rs: session-acquisition and resilient-fetch core for
//! Morningstar's undocumented internal endpoints.
//!
//! The crate covers the hard, reusable part of scraping Morningstar:
//!
//! - deriving ephemeral credentials from the live site (regex-scraped API
//!   keys, the MAAS bearer token, browser-harvested AWS WAF cookies), with a
//!   disk-backed fallback cache ([`auth`]);
//! - issuing single and batched HTTP GETs with bounded concurrency,
//!   exponential-backoff retry, and per-request failure capture ([`fetch`]);
//! - splitting logical queries that would exceed server-side result caps
//!   into page, sector, or business-day partitions ([`partition`]);
//! - a minimal JSON-to-rows boundary so endpoint code stays declarative
//!   ([`shape`]).
//!
//! Endpoint semantics (field lists, filter predicates, tabular conversion)
//! are deliberately out of scope: callers hand the core
//! [`RequestDescriptor`]s and a shaping function, and get rows back.

pub mod auth;
pub mod core;
pub mod fetch;
pub mod partition;
pub mod shape;

pub use crate::auth::{CredentialKind, CredentialStore, TokenHarvester};
pub use crate::core::{MsClient, MsClientBuilder, MsError};
pub use crate::fetch::{FailureKind, FetchFailure, FetchOutcome, RequestBatch, RequestDescriptor};
pub use crate::partition::{PartitionConfig, PartitionPlan, Probe};
pub use crate::shape::{Endpoint, run_endpoint};
