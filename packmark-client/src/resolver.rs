//! Multi-strategy order resolution
//!
//! A scanned routing code has to be turned into an order even when the
//! upstream deployment does not index custom attributes for filtering.
//! Three strategies run in fixed order, first non-empty result wins:
//!
//! 1. server-side attribute equality filter (fast path, may silently
//!    match nothing even when a match exists)
//! 2. free-text search (imprecise; any hit is accepted as-is)
//! 3. bounded brute-force scan, newest first, with a date-floor
//!    short-circuit and a cap on full-record fetches
//!
//! "No match" is a valid outcome, never an error; only upstream client
//! errors propagate.

use crate::client::{OrderFilter, UpstreamClient};
use crate::error::ClientResult;
use async_trait::async_trait;
use shared::order::{AttrValue, OrderFull, OrderSummary};
use shared::util::parse_moment;

/// Records between progress notifications during a brute-force scan
const PROGRESS_INTERVAL: usize = 100;

/// Progress of a brute-force scan
///
/// One fixed shape for every notification; reported at page boundaries
/// and every [`PROGRESS_INTERVAL`] records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanProgress {
    /// Records examined so far
    pub scanned: usize,
    /// Maximum records this scan will examine
    pub bound: usize,
    /// Current pagination offset
    pub offset: usize,
    /// Full-record fetches spent so far
    pub full_reads: usize,
}

/// Resolution tuning knobs
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Stable id of the routing-code attribute
    pub attr_id: String,
    /// Display name of the routing-code attribute (fallback match)
    pub attr_name: String,
    /// Maximum records the brute-force scan examines
    pub scan_bound: usize,
    /// Scan no further back than this moment
    pub moment_floor: Option<String>,
    /// Cap on full-record fetches during a scan
    pub max_full_reads: usize,
    /// Page size for scan pagination
    pub page_size: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            attr_id: String::new(),
            attr_name: String::new(),
            scan_bound: 2_000,
            moment_floor: None,
            max_full_reads: 50,
            page_size: 200,
        }
    }
}

/// Read-only order lookups the resolver runs against
///
/// Implemented by [`UpstreamClient`]; tests substitute an in-memory fake.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// One page of summaries, newest first
    async fn list_page(
        &self,
        filter: &OrderFilter,
        limit: usize,
        offset: usize,
    ) -> ClientResult<Vec<OrderSummary>>;

    /// Free-text search, newest first
    async fn search(&self, query: &str, limit: usize) -> ClientResult<Vec<OrderSummary>>;

    /// Full record by id
    async fn get_full(&self, id: &str) -> ClientResult<Option<OrderFull>>;
}

#[async_trait]
impl OrderSource for UpstreamClient {
    async fn list_page(
        &self,
        filter: &OrderFilter,
        limit: usize,
        offset: usize,
    ) -> ClientResult<Vec<OrderSummary>> {
        self.list_orders(filter, limit, offset).await
    }

    async fn search(&self, query: &str, limit: usize) -> ClientResult<Vec<OrderSummary>> {
        self.search_orders(query, limit).await
    }

    async fn get_full(&self, id: &str) -> ClientResult<Option<OrderFull>> {
        self.get_order(id).await
    }
}

/// Ordered fallback chain over an [`OrderSource`]
pub struct Resolver<'a, S: OrderSource + ?Sized> {
    source: &'a S,
    options: ResolveOptions,
}

impl<'a, S: OrderSource + ?Sized> Resolver<'a, S> {
    pub fn new(source: &'a S, options: ResolveOptions) -> Self {
        Self { source, options }
    }

    /// Run the strategy chain; blank input short-circuits to `None`
    pub async fn resolve(
        &self,
        value: &str,
        on_progress: &mut dyn FnMut(&ScanProgress),
    ) -> ClientResult<Option<OrderSummary>> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }

        if let Some(hit) = self.find_by_attribute_filter(value).await? {
            tracing::debug!(order = %hit.name, "resolved via attribute filter");
            return Ok(Some(hit));
        }
        if let Some(hit) = self.find_by_search(value).await? {
            tracing::debug!(order = %hit.name, "resolved via free-text search");
            return Ok(Some(hit));
        }
        self.scan_recent(value, on_progress).await
    }

    /// Strategy 1: server-side attribute equality filter
    ///
    /// Skipped entirely when no attribute id is configured; running an
    /// unfiltered listing here would return an arbitrary newest order.
    pub async fn find_by_attribute_filter(
        &self,
        value: &str,
    ) -> ClientResult<Option<OrderSummary>> {
        let filter = OrderFilter::new().attribute_eq(&self.options.attr_id, value);
        if filter.render().is_none() {
            return Ok(None);
        }
        let rows = self.source.list_page(&filter, 10, 0).await?;
        Ok(rows.into_iter().next())
    }

    /// Strategy 2: free-text search
    ///
    /// The first hit is accepted as-is without attribute verification —
    /// reliability over precision when the attribute filter silently
    /// matches nothing.
    pub async fn find_by_search(&self, value: &str) -> ClientResult<Option<OrderSummary>> {
        let rows = self.source.search(value, 20).await?;
        Ok(rows.into_iter().next())
    }

    /// Strategy 3: bounded brute-force scan, newest first
    ///
    /// Summary attributes are checked when present; otherwise the full
    /// record is fetched, bounded by `max_full_reads`. Because pages are
    /// strictly newest-first, the first record older than the moment
    /// floor proves no unexamined candidate can match, and the scan
    /// stops there.
    pub async fn scan_recent(
        &self,
        value: &str,
        on_progress: &mut dyn FnMut(&ScanProgress),
    ) -> ClientResult<Option<OrderSummary>> {
        let floor = self
            .options
            .moment_floor
            .as_deref()
            .map(shared::util::normalize_moment_floor)
            .and_then(|f| parse_moment(&f));
        let mut progress = ScanProgress {
            scanned: 0,
            bound: self.options.scan_bound,
            offset: 0,
            full_reads: 0,
        };

        while progress.scanned < self.options.scan_bound {
            let take = self
                .options
                .page_size
                .min(self.options.scan_bound - progress.scanned);
            let page = self
                .source
                .list_page(&OrderFilter::new(), take, progress.offset)
                .await?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len();

            for summary in page {
                if let Some(floor) = floor
                    && let Some(moment) = summary.moment.as_deref().and_then(parse_moment)
                    && moment < floor
                {
                    on_progress(&progress);
                    return Ok(None);
                }
                progress.scanned += 1;

                if !summary.attributes.is_empty() {
                    if self.attr_matches(&summary, value) {
                        on_progress(&progress);
                        return Ok(Some(summary));
                    }
                } else if progress.full_reads < self.options.max_full_reads {
                    // Summary rows without attributes are "unknown", not
                    // "absent"; the full record stays authoritative.
                    progress.full_reads += 1;
                    if let Some(full) = self.source.get_full(&summary.id).await? {
                        let hit = full
                            .attribute_value(&self.options.attr_id, &self.options.attr_name)
                            .map(AttrValue::as_text)
                            .is_some_and(|v| v == value);
                        if hit {
                            on_progress(&progress);
                            return Ok(Some(full.to_summary()));
                        }
                    }
                }

                if progress.scanned % PROGRESS_INTERVAL == 0 {
                    on_progress(&progress);
                }
            }

            progress.offset += page_len;
            on_progress(&progress);
            if page_len < take {
                break;
            }
        }

        Ok(None)
    }

    fn attr_matches(&self, summary: &OrderSummary, value: &str) -> bool {
        summary
            .attribute_value(&self.options.attr_id, &self.options.attr_name)
            .map(AttrValue::as_text)
            .is_some_and(|v| v == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::Attribute;
    use std::sync::Mutex;

    const ATTR_ID: &str = "attr-routing";
    const ATTR_NAME: &str = "Routing code";

    fn order(id: &str, moment: &str, routing: Option<&str>) -> OrderFull {
        OrderFull {
            id: id.to_string(),
            name: format!("order-{id}"),
            moment: Some(moment.to_string()),
            description: None,
            attributes: routing
                .map(|v| {
                    vec![Attribute {
                        id: Some(ATTR_ID.to_string()),
                        name: Some(ATTR_NAME.to_string()),
                        value: Some(AttrValue::Text(v.to_string())),
                    }]
                })
                .unwrap_or_default(),
            positions: Vec::new(),
        }
    }

    /// In-memory order service; `orders` must be newest-first
    struct FakeSource {
        orders: Vec<OrderFull>,
        attribute_filter_works: bool,
        search_hit: Option<OrderSummary>,
        summaries_carry_attributes: bool,
        full_reads: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(orders: Vec<OrderFull>) -> Self {
            Self {
                orders,
                attribute_filter_works: false,
                search_hit: None,
                summaries_carry_attributes: false,
                full_reads: Mutex::new(Vec::new()),
            }
        }

        fn full_reads(&self) -> Vec<String> {
            self.full_reads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OrderSource for FakeSource {
        async fn list_page(
            &self,
            filter: &OrderFilter,
            limit: usize,
            offset: usize,
        ) -> ClientResult<Vec<OrderSummary>> {
            if let Some(expr) = filter.render() {
                // Attribute equality fast path
                if !self.attribute_filter_works {
                    return Ok(Vec::new());
                }
                let value = expr.rsplit('=').next().unwrap_or("").to_string();
                return Ok(self
                    .orders
                    .iter()
                    .filter(|o| {
                        o.attribute_value(ATTR_ID, ATTR_NAME)
                            .map(AttrValue::as_text)
                            .is_some_and(|v| v == value)
                    })
                    .take(limit)
                    .map(OrderFull::to_summary)
                    .collect());
            }
            Ok(self
                .orders
                .iter()
                .skip(offset)
                .take(limit)
                .map(|o| {
                    let mut s = o.to_summary();
                    if !self.summaries_carry_attributes {
                        s.attributes.clear();
                    }
                    s
                })
                .collect())
        }

        async fn search(&self, _query: &str, _limit: usize) -> ClientResult<Vec<OrderSummary>> {
            Ok(self.search_hit.clone().into_iter().collect())
        }

        async fn get_full(&self, id: &str) -> ClientResult<Option<OrderFull>> {
            self.full_reads.lock().unwrap().push(id.to_string());
            Ok(self.orders.iter().find(|o| o.id == id).cloned())
        }
    }

    fn options() -> ResolveOptions {
        ResolveOptions {
            attr_id: ATTR_ID.to_string(),
            attr_name: ATTR_NAME.to_string(),
            ..ResolveOptions::default()
        }
    }

    #[tokio::test]
    async fn blank_value_short_circuits() {
        let source = FakeSource::new(vec![order("a", "2024-12-22 10:00:00", Some("PK-1"))]);
        let resolver = Resolver::new(&source, options());
        let hit = resolver.resolve("   ", &mut |_| {}).await.unwrap();
        assert!(hit.is_none());
        assert!(source.full_reads().is_empty());
    }

    #[tokio::test]
    async fn attribute_filter_wins_when_supported() {
        let mut source = FakeSource::new(vec![
            order("a", "2024-12-22 10:00:00", Some("PK-OTHER")),
            order("b", "2024-12-21 10:00:00", Some("PK-1")),
        ]);
        source.attribute_filter_works = true;
        let resolver = Resolver::new(&source, options());

        let hit = resolver.resolve("PK-1", &mut |_| {}).await.unwrap().unwrap();
        assert_eq!(hit.id, "b");
        // Fast path never touches full records
        assert!(source.full_reads().is_empty());
    }

    #[tokio::test]
    async fn search_hit_accepted_without_verification() {
        let mut source = FakeSource::new(vec![order("a", "2024-12-22 10:00:00", None)]);
        // The search result does not even carry the attribute; it is
        // still accepted as-is.
        source.search_hit = Some(order("s", "2024-12-20 09:00:00", None).to_summary());
        let resolver = Resolver::new(&source, options());

        let hit = resolver.resolve("PK-1", &mut |_| {}).await.unwrap().unwrap();
        assert_eq!(hit.id, "s");
        assert!(source.full_reads().is_empty());
    }

    #[tokio::test]
    async fn scan_stops_at_date_floor_without_reading_older_records() {
        // Moments Dec-22, Dec-21, Dec-19, Dec-18 with a floor of Dec-20:
        // the scan examines the first two, detects Dec-19 < floor and
        // returns not-found without ever fetching Dec-18.
        let source = FakeSource::new(vec![
            order("dec22", "2024-12-22 10:00:00", None),
            order("dec21", "2024-12-21 10:00:00", None),
            order("dec19", "2024-12-19 10:00:00", None),
            order("dec18", "2024-12-18 10:00:00", None),
        ]);
        let mut opts = options();
        opts.moment_floor = Some("2024-12-20".to_string());
        let resolver = Resolver::new(&source, opts);

        let hit = resolver.resolve("PK-MISSING", &mut |_| {}).await.unwrap();
        assert!(hit.is_none());
        assert_eq!(source.full_reads(), vec!["dec22", "dec21"]);
    }

    #[tokio::test]
    async fn scan_matches_via_full_record_fetch() {
        let source = FakeSource::new(vec![
            order("a", "2024-12-22 10:00:00", Some("PK-OTHER")),
            order("b", "2024-12-21 10:00:00", Some("PK-1")),
            order("c", "2024-12-20 10:00:00", None),
        ]);
        let resolver = Resolver::new(&source, options());

        let hit = resolver.resolve("PK-1", &mut |_| {}).await.unwrap().unwrap();
        assert_eq!(hit.id, "b");
        assert_eq!(source.full_reads(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn scan_uses_summary_attributes_when_present() {
        let mut source = FakeSource::new(vec![
            order("a", "2024-12-22 10:00:00", Some("PK-OTHER")),
            order("b", "2024-12-21 10:00:00", Some("PK-1")),
        ]);
        source.summaries_carry_attributes = true;
        let resolver = Resolver::new(&source, options());

        let hit = resolver.resolve("PK-1", &mut |_| {}).await.unwrap().unwrap();
        assert_eq!(hit.id, "b");
        assert!(source.full_reads().is_empty());
    }

    #[tokio::test]
    async fn full_record_fetches_are_capped() {
        let source = FakeSource::new(vec![
            order("a", "2024-12-22 10:00:00", None),
            order("b", "2024-12-21 10:00:00", None),
            order("c", "2024-12-20 10:00:00", Some("PK-1")),
        ]);
        let mut opts = options();
        opts.max_full_reads = 1;
        let resolver = Resolver::new(&source, opts);

        // The match sits behind the fetch budget; resolution reports
        // not-found rather than spending more upstream calls.
        let hit = resolver.resolve("PK-1", &mut |_| {}).await.unwrap();
        assert!(hit.is_none());
        assert_eq!(source.full_reads(), vec!["a"]);
    }

    #[tokio::test]
    async fn scan_respects_record_bound() {
        let source = FakeSource::new(vec![
            order("a", "2024-12-22 10:00:00", None),
            order("b", "2024-12-21 10:00:00", None),
            order("c", "2024-12-20 10:00:00", Some("PK-1")),
        ]);
        let mut opts = options();
        opts.scan_bound = 2;
        opts.page_size = 2;
        let resolver = Resolver::new(&source, opts);

        let hit = resolver.resolve("PK-1", &mut |_| {}).await.unwrap();
        assert!(hit.is_none());
        assert_eq!(source.full_reads(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn progress_reports_carry_one_fixed_shape() {
        let source = FakeSource::new(vec![
            order("a", "2024-12-22 10:00:00", None),
            order("b", "2024-12-21 10:00:00", None),
            order("c", "2024-12-20 10:00:00", None),
        ]);
        let mut opts = options();
        opts.page_size = 2;
        opts.scan_bound = 10;
        let resolver = Resolver::new(&source, opts);

        let mut reports = Vec::new();
        let hit = resolver
            .resolve("PK-MISSING", &mut |p| reports.push(*p))
            .await
            .unwrap();
        assert!(hit.is_none());
        // Page boundaries: after page one (2 records) and page two (1 record)
        assert!(reports.len() >= 2);
        assert!(reports.iter().all(|p| p.bound == 10));
        let last = reports.last().unwrap();
        assert_eq!(last.scanned, 3);
        assert_eq!(last.full_reads, 3);
    }
}
