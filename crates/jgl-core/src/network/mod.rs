//! Network access to the upstream metric APIs.
//!
//! This module provides:
//! - An HTTP client with a bounded request timeout
//! - The [`CountFetcher`] seam used by the metrics cache, and its HTTP implementation

mod client;
mod fetcher;

pub use client::HttpClient;
pub use fetcher::{CountFetcher, DynCountFetcher, HttpFetcher};
