//! Index sync orchestration
//!
//! Pull-based periodic sync: list candidate orders upstream (bounded by a
//! per-run cap), skip the ones whose description already carries the
//! marking-code block, explode the rest and upsert them into the local
//! index. One malformed order never aborts a run; systemic failures
//! (auth, local storage) do.
//!
//! Run state is an explicit value owned by the caller — there is no
//! hidden global sync state anywhere.

use crate::explode::{ExplodeOptions, KitSource, explode_positions};
use crate::index::{IndexStorage, StorageError};
use async_trait::async_trait;
use packmark_client::{ClientError, ClientResult, OrderFilter, UpstreamClient};
use shared::order::{AttrValue, OrderFull, OrderSummary, Position};
use std::time::{Duration, Instant};
use thiserror::Error;

/// What started this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Scheduled run; subject to the cool-down interval
    Automatic,
    /// Operator-requested run; bypasses the cool-down
    Manual,
}

/// Sync errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync cooling down, next automatic run allowed in {remaining_secs}s")]
    CoolingDown { remaining_secs: u64 },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Accumulated run state, owned by the caller
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub last_run: Option<Instant>,
    pub runs: u64,
    pub orders_indexed: u64,
    pub orders_skipped_done: u64,
    pub orders_missing_attr: u64,
    pub orders_failed: u64,
}

/// Outcome of a single run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Candidates listed upstream
    pub listed: usize,
    /// Orders written to the index
    pub indexed: usize,
    /// Orders already carrying the marking block upstream
    pub skipped_done: usize,
    /// Orders without a usable routing attribute
    pub missing_attr: usize,
    /// Per-candidate upstream failures
    pub failed: usize,
    /// Explosion warnings, prefixed with the order name
    pub warnings: Vec<String>,
}

/// Sync tuning knobs
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// State reference candidates must be in (e.g. "packing"); empty
    /// disables the state clause
    pub state_ref: String,
    /// Ignore orders older than this moment
    pub moment_floor: Option<String>,
    /// Upstream page size
    pub page_size: usize,
    /// Hard cap on candidates per run
    pub max_orders: usize,
    /// Minimum interval between automatic runs
    pub min_interval: Duration,
    /// Routing-code attribute id
    pub attr_id: String,
    /// Routing-code attribute display name
    pub attr_name: String,
    /// Explosion options
    pub explode: ExplodeOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            state_ref: String::new(),
            moment_floor: None,
            page_size: 100,
            max_orders: 500,
            min_interval: Duration::from_secs(300),
            attr_id: String::new(),
            attr_name: String::new(),
            explode: ExplodeOptions::default(),
        }
    }
}

/// Upstream operations a sync run needs
///
/// Implemented by [`UpstreamClient`]; tests substitute an in-memory fake.
#[async_trait]
pub trait SyncSource: KitSource {
    /// One page of candidate summaries, newest first
    async fn list_recent(
        &self,
        filter: &OrderFilter,
        limit: usize,
        offset: usize,
    ) -> ClientResult<Vec<OrderSummary>>;

    /// Full record by id
    async fn get_full(&self, id: &str) -> ClientResult<Option<OrderFull>>;

    /// Positions with referenced items expanded
    async fn positions(&self, id: &str) -> ClientResult<Vec<Position>>;
}

#[async_trait]
impl SyncSource for UpstreamClient {
    async fn list_recent(
        &self,
        filter: &OrderFilter,
        limit: usize,
        offset: usize,
    ) -> ClientResult<Vec<OrderSummary>> {
        self.list_orders(filter, limit, offset).await
    }

    async fn get_full(&self, id: &str) -> ClientResult<Option<OrderFull>> {
        self.get_order(id).await
    }

    async fn positions(&self, id: &str) -> ClientResult<Vec<Position>> {
        self.get_order_positions(id).await
    }
}

/// Drives one bounded sync pass from upstream into the index
pub struct SyncOrchestrator<'a, S: SyncSource + ?Sized> {
    source: &'a S,
    storage: &'a IndexStorage,
    options: SyncOptions,
}

impl<'a, S: SyncSource + ?Sized> SyncOrchestrator<'a, S> {
    pub fn new(source: &'a S, storage: &'a IndexStorage, options: SyncOptions) -> Self {
        Self {
            source,
            storage,
            options,
        }
    }

    /// Run one sync pass
    ///
    /// Automatic triggers within the cool-down window are rejected; a
    /// manual trigger always runs. The cool-down exists to keep two
    /// writer passes from overlapping and to bound upstream load.
    pub async fn run(&self, state: &mut SyncState, trigger: Trigger) -> SyncResult<SyncReport> {
        if trigger == Trigger::Automatic
            && let Some(last) = state.last_run
        {
            let elapsed = last.elapsed();
            if elapsed < self.options.min_interval {
                return Err(SyncError::CoolingDown {
                    remaining_secs: (self.options.min_interval - elapsed).as_secs().max(1),
                });
            }
        }
        state.last_run = Some(Instant::now());

        let candidates = self.list_candidates().await?;
        let mut report = SyncReport {
            listed: candidates.len(),
            ..SyncReport::default()
        };

        for summary in &candidates {
            match self.sync_one(summary, &mut report).await {
                Ok(()) => {}
                Err(SyncError::Client(e)) if e.is_auth_failure() => {
                    return Err(SyncError::Client(e));
                }
                Err(SyncError::Storage(e)) => return Err(SyncError::Storage(e)),
                Err(e) => {
                    tracing::warn!(order = %summary.name, "candidate failed, continuing: {e}");
                    report.failed += 1;
                }
            }
        }

        state.runs += 1;
        state.orders_indexed += report.indexed as u64;
        state.orders_skipped_done += report.skipped_done as u64;
        state.orders_missing_attr += report.missing_attr as u64;
        state.orders_failed += report.failed as u64;

        tracing::info!(
            listed = report.listed,
            indexed = report.indexed,
            skipped_done = report.skipped_done,
            missing_attr = report.missing_attr,
            failed = report.failed,
            "sync run complete"
        );
        Ok(report)
    }

    /// Page through candidates up to the per-run cap
    async fn list_candidates(&self) -> SyncResult<Vec<OrderSummary>> {
        let mut filter = OrderFilter::new().state(&self.options.state_ref);
        if let Some(floor) = self.options.moment_floor.as_deref() {
            filter = filter.moment_from(floor);
        }

        let mut candidates: Vec<OrderSummary> = Vec::new();
        let mut offset = 0;
        loop {
            let take = self
                .options
                .page_size
                .min(self.options.max_orders - candidates.len());
            if take == 0 {
                break;
            }
            let page = self.source.list_recent(&filter, take, offset).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            let short = page.len() < take;
            candidates.extend(page);
            if short {
                break;
            }
        }
        Ok(candidates)
    }

    async fn sync_one(&self, summary: &OrderSummary, report: &mut SyncReport) -> SyncResult<()> {
        let Some(full) = self.source.get_full(&summary.id).await? else {
            tracing::warn!(order = %summary.name, "candidate vanished between listing and fetch");
            report.failed += 1;
            return Ok(());
        };

        let routing = full
            .attribute_value(&self.options.attr_id, &self.options.attr_name)
            .map(AttrValue::as_text)
            .filter(|v| !v.is_empty());

        // Completion detection from upstream truth, not local state: an
        // order that already carries the block needs no further work.
        if shared::codes::has_block(full.description.as_deref().unwrap_or("")) {
            if let Some(key) = routing {
                self.storage.mark_done(&key)?;
            }
            report.skipped_done += 1;
            return Ok(());
        }

        let Some(key) = routing else {
            tracing::debug!(order = %full.name, "no routing attribute, skipped");
            report.missing_attr += 1;
            return Ok(());
        };

        let positions = self.source.positions(&full.id).await?;
        let explosion = explode_positions(self.source, &positions, &self.options.explode).await?;

        self.storage.upsert_order(
            &key,
            &full.id,
            &full.name,
            full.moment.as_deref(),
            explosion.expected_units,
            false,
        )?;
        self.storage.replace_positions(&key, &explosion.lines)?;

        for warning in explosion.warnings {
            report.warnings.push(format!("{}: {warning}", full.name));
        }
        report.indexed += 1;
        tracing::debug!(
            order = %full.name,
            routing_code = %key,
            expected_units = explosion.expected_units,
            "order indexed"
        );
        Ok(())
    }
}
