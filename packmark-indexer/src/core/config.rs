use crate::explode::ExplodeOptions;
use crate::sync::SyncOptions;
use packmark_client::{ClientConfig, ResolveOptions};
use std::time::Duration;

/// Indexer configuration
///
/// # Environment variables
///
/// Every setting can be overridden through the environment:
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | UPSTREAM_BASE_URL | https://api.moysklad.ru/api/remap/1.2 | Order service base URL |
/// | UPSTREAM_TOKEN | (required) | Access token; `Bearer ` prefix optional |
/// | REQUEST_TIMEOUT_SECS | 60 | Upstream request timeout |
/// | ROUTING_ATTR_ID | (empty) | Stable id of the routing-code attribute |
/// | ROUTING_ATTR_NAME | Routing code | Display name of the routing-code attribute |
/// | MARKING_FLAG_ATTR | requires_marking | Boolean item attribute |
/// | KIT_MARKING_FLAG_ATTR | kit_requires_marking | Boolean kit attribute |
/// | PACKING_STATE_REF | (empty) | Order state candidates must be in |
/// | SYNC_DATE_FROM | (empty) | Ignore orders older than this date |
/// | SYNC_PAGE_SIZE | 100 | Listing page size |
/// | SYNC_MAX_ORDERS | 500 | Candidate cap per sync run |
/// | SYNC_COOLDOWN_SECS | 300 | Minimum gap between automatic runs |
/// | SYNC_INTERVAL_SECS | 600 | Scheduler tick interval |
/// | MAX_KIT_COMPONENTS | 200 | Component cap per kit |
/// | SCAN_BOUND | 2000 | Record cap for the brute-force resolver scan |
/// | MAX_FULL_READS | 50 | Full-record fetch cap during a scan |
/// | INDEX_PATH | packmark-index.redb | Index database file |
/// | LOG_DIR | (empty) | Log file directory; stdout only when unset |
/// | LOG_LEVEL | info | Log verbosity |
///
/// # Example
///
/// ```ignore
/// UPSTREAM_TOKEN=abc123 SYNC_INTERVAL_SECS=120 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Order service base URL
    pub upstream_base_url: String,
    /// Access token
    pub upstream_token: String,
    /// Upstream request timeout in seconds
    pub request_timeout_secs: u64,

    /// Stable id of the routing-code attribute
    pub routing_attr_id: String,
    /// Display name of the routing-code attribute
    pub routing_attr_name: String,
    /// Boolean item attribute marking serialized items
    pub marking_flag_attr: String,
    /// Boolean kit attribute forcing marking on all components
    pub kit_marking_flag_attr: String,

    /// Order state candidates must be in; empty disables the clause
    pub packing_state_ref: String,
    /// Ignore orders older than this date
    pub sync_date_from: Option<String>,
    /// Listing page size
    pub sync_page_size: usize,
    /// Candidate cap per sync run
    pub sync_max_orders: usize,
    /// Minimum gap between automatic runs, in seconds
    pub sync_cooldown_secs: u64,
    /// Scheduler tick interval, in seconds
    pub sync_interval_secs: u64,
    /// Component cap per kit
    pub max_kit_components: usize,

    /// Record cap for the brute-force resolver scan
    pub scan_bound: usize,
    /// Full-record fetch cap during a scan
    pub max_full_reads: usize,

    /// Index database file
    pub index_path: String,
    /// Log file directory; stdout only when unset
    pub log_dir: Option<String>,
    /// Log verbosity
    pub log_level: String,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            upstream_base_url: std::env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| "https://api.moysklad.ru/api/remap/1.2".into()),
            upstream_token: std::env::var("UPSTREAM_TOKEN").unwrap_or_default(),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),

            routing_attr_id: std::env::var("ROUTING_ATTR_ID").unwrap_or_default(),
            routing_attr_name: std::env::var("ROUTING_ATTR_NAME")
                .unwrap_or_else(|_| "Routing code".into()),
            marking_flag_attr: std::env::var("MARKING_FLAG_ATTR")
                .unwrap_or_else(|_| "requires_marking".into()),
            kit_marking_flag_attr: std::env::var("KIT_MARKING_FLAG_ATTR")
                .unwrap_or_else(|_| "kit_requires_marking".into()),

            packing_state_ref: std::env::var("PACKING_STATE_REF").unwrap_or_default(),
            sync_date_from: std::env::var("SYNC_DATE_FROM")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            sync_page_size: std::env::var("SYNC_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            sync_max_orders: std::env::var("SYNC_MAX_ORDERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            sync_cooldown_secs: std::env::var("SYNC_COOLDOWN_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            sync_interval_secs: std::env::var("SYNC_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            max_kit_components: std::env::var("MAX_KIT_COMPONENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),

            scan_bound: std::env::var("SCAN_BOUND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2_000),
            max_full_reads: std::env::var("MAX_FULL_READS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),

            index_path: std::env::var("INDEX_PATH")
                .unwrap_or_else(|_| "packmark-index.redb".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|v| !v.trim().is_empty()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
        }
    }

    /// Upstream client configuration derived from this config
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.upstream_base_url, &self.upstream_token)
            .with_timeout(self.request_timeout_secs)
    }

    /// Resolver options derived from this config
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            attr_id: self.routing_attr_id.clone(),
            attr_name: self.routing_attr_name.clone(),
            scan_bound: self.scan_bound,
            moment_floor: self.sync_date_from.clone(),
            max_full_reads: self.max_full_reads,
            ..ResolveOptions::default()
        }
    }

    /// Explosion options derived from this config
    pub fn explode_options(&self) -> ExplodeOptions {
        ExplodeOptions {
            marking_attr: self.marking_flag_attr.clone(),
            kit_marking_attr: self.kit_marking_flag_attr.clone(),
            max_components: self.max_kit_components,
        }
    }

    /// Sync orchestrator options derived from this config
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            state_ref: self.packing_state_ref.clone(),
            moment_floor: self.sync_date_from.clone(),
            page_size: self.sync_page_size,
            max_orders: self.sync_max_orders,
            min_interval: Duration::from_secs(self.sync_cooldown_secs),
            attr_id: self.routing_attr_id.clone(),
            attr_name: self.routing_attr_name.clone(),
            explode: self.explode_options(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
