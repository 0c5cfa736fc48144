//! Packmark upstream client
//!
//! Resilient client for the upstream order service: JSON transport with
//! bounded retry/backoff, the typed API surface (orders, positions, kits,
//! description writes), and the multi-strategy order resolver.
//!
//! The upstream API is rate-limited and only loosely filterable; custom
//! attributes are not reliably indexed for server-side filtering on every
//! deployment. The resolver in [`resolver`] exists because of that.

pub mod client;
pub mod config;
pub mod error;
pub mod resolver;

mod http;

pub use client::{OrderFilter, UpstreamClient};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, is_retryable_status};
pub use resolver::{OrderSource, ResolveOptions, Resolver, ScanProgress};
