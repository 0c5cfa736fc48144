//! Typed API surface over the upstream order service

use crate::http::Transport;
use crate::{ClientConfig, ClientError, ClientResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::order::{EntityRef, Kit, OrderFull, OrderSummary, Position};

const ORDERS_PATH: &str = "/entity/customerorder";

/// Newest-first sort; the resolver's date-floor short-circuit and the
/// sync orchestrator both depend on this ordering
const MOMENT_DESC: &str = "moment,desc";

/// Server-side filter expression builder
///
/// Clauses are combined with `;` (upstream AND). Only the operators the
/// service actually supports are exposed: attribute equality, state
/// equality and a minimum-moment bound.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    clauses: Vec<String>,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality on a custom attribute by its stable id
    pub fn attribute_eq(mut self, attr_id: &str, value: &str) -> Self {
        let attr_id = attr_id.trim();
        let value = value.trim();
        if !attr_id.is_empty() && !value.is_empty() {
            self.clauses.push(format!("attributes.{attr_id}={value}"));
        }
        self
    }

    /// Equality on the order state reference
    pub fn state(mut self, state_ref: &str) -> Self {
        let state_ref = state_ref.trim();
        if !state_ref.is_empty() {
            self.clauses.push(format!("state={state_ref}"));
        }
        self
    }

    /// Minimum moment bound; bare dates are normalized to midnight
    pub fn moment_from(mut self, floor: &str) -> Self {
        let floor = shared::util::normalize_moment_floor(floor);
        if !floor.is_empty() {
            self.clauses.push(format!("moment>={floor}"));
        }
        self
    }

    /// Rendered filter expression, `None` when no clauses were added
    pub fn render(&self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(self.clauses.join(";"))
        }
    }
}

/// Client for the upstream order service
pub struct UpstreamClient {
    transport: Transport,
}

impl UpstreamClient {
    /// Create a new client from configuration
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
        })
    }

    /// List order summaries, newest first
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        limit: usize,
        offset: usize,
    ) -> ClientResult<Vec<OrderSummary>> {
        let mut query = vec![
            ("order", MOMENT_DESC.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(expr) = filter.render() {
            query.push(("filter", expr));
        }
        let value = self.transport.get(ORDERS_PATH, &query).await?;
        rows(value)
    }

    /// Free-text search over orders, newest first
    pub async fn search_orders(
        &self,
        query_text: &str,
        limit: usize,
    ) -> ClientResult<Vec<OrderSummary>> {
        let query = vec![
            ("search", query_text.to_string()),
            ("order", MOMENT_DESC.to_string()),
            ("limit", limit.to_string()),
        ];
        let value = self.transport.get(ORDERS_PATH, &query).await?;
        rows(value)
    }

    /// Fetch a full order record; `None` for unknown ids
    pub async fn get_order(&self, id: &str) -> ClientResult<Option<OrderFull>> {
        let path = format!("{ORDERS_PATH}/{id}");
        match self.transport.get(&path, &[]).await {
            Ok(Some(value)) => Ok(Some(serde_json::from_value(value)?)),
            Ok(None) => Ok(None),
            Err(ClientError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Positions of an order with the referenced items expanded inline
    pub async fn get_order_positions(&self, id: &str) -> ClientResult<Vec<Position>> {
        let path = format!("{ORDERS_PATH}/{id}/positions");
        let query = vec![
            ("limit", "1000".to_string()),
            ("offset", "0".to_string()),
            ("expand", "assortment".to_string()),
        ];
        let value = self.transport.get(&path, &query).await?;
        rows(value)
    }

    /// Expand a kit reference into its attributes and component list
    ///
    /// `None` when the reference carries no href or the kit no longer
    /// exists upstream; callers record a warning and skip the position.
    pub async fn get_kit(&self, kit_ref: &EntityRef) -> ClientResult<Option<Kit>> {
        let Some(href) = kit_ref.href.as_deref() else {
            return Ok(None);
        };
        let query = vec![("expand", "components.assortment".to_string())];
        match self.transport.get(href, &query).await {
            Ok(Some(value)) => Ok(Some(serde_json::from_value(value)?)),
            Ok(None) => Ok(None),
            Err(ClientError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Overwrite an order's description field
    pub async fn update_description(&self, id: &str, description: &str) -> ClientResult<()> {
        let body = serde_json::json!({ "description": description });
        self.transport
            .put(&format!("{ORDERS_PATH}/{id}"), &body)
            .await?;
        Ok(())
    }

    /// Record collected marking codes on the order
    ///
    /// Read-modify-write of the description through the shared block
    /// codec: an existing block is replaced, otherwise one is appended;
    /// the rest of the description is left untouched.
    pub async fn write_marking_codes(&self, id: &str, codes: &[String]) -> ClientResult<()> {
        let order = self.get_order(id).await?.ok_or_else(|| {
            ClientError::InvalidResponse(format!("order {id} vanished before description update"))
        })?;
        let description =
            shared::codes::replace_block(order.description.as_deref().unwrap_or(""), codes);
        self.update_description(id, &description).await
    }
}

/// Unwrap a `{ "rows": [...] }` page; empty-body responses yield an
/// empty list
fn rows<T: DeserializeOwned>(value: Option<Value>) -> ClientResult<Vec<T>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    #[derive(Deserialize)]
    struct Page<T> {
        #[serde(default = "Vec::new")]
        rows: Vec<T>,
    }
    let page: Page<T> = serde_json::from_value(value)?;
    Ok(page.rows)
}
