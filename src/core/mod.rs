//! Core components of the `morningstar-rs` client.
//!
//! This module contains the foundational building blocks of the library:
//! - The main [`MsClient`] and its builder.
//! - The primary [`MsError`] type.
//! - Internal networking (retrying sender) shared by every module.

/// The main client (`MsClient`), builder, and retry configuration.
pub mod client;
/// The primary error type (`MsError`) for the crate.
pub mod error;

pub(crate) mod net;

// convenient re-exports so most code can just `use crate::core::MsClient`
pub use client::{MsClient, MsClientBuilder};
pub use error::MsError;
