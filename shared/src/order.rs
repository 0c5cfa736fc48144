//! Read-only views of upstream order entities
//!
//! These mirror the upstream JSON wire shapes. Everything here is sourced
//! from the order service and never mutated locally; the only field the
//! system writes back is the order description (see [`crate::codes`]).

use serde::{Deserialize, Deserializer, Serialize};

/// Reference to an upstream entity (`meta` object on the wire)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntityRef {
    /// Stable entity URL, used as the identity key where present
    #[serde(default)]
    pub href: Option<String>,
    /// Entity kind: `product`, `bundle`, `service`, ...
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl EntityRef {
    /// Whether this reference points at a kit (upstream calls them bundles)
    pub fn is_kit(&self) -> bool {
        self.kind.as_deref() == Some("bundle")
    }
}

/// Scalar value of a custom attribute
///
/// Upstream sends string, boolean or numeric values depending on the
/// attribute type configured by the tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AttrValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl AttrValue {
    /// String rendering of the value, trimmed
    pub fn as_text(&self) -> String {
        match self {
            AttrValue::Text(s) => s.trim().to_string(),
            AttrValue::Flag(b) => b.to_string(),
            AttrValue::Number(n) => n.to_string(),
        }
    }

    /// Boolean interpretation; truthy strings are accepted since some
    /// deployments model flags as text attributes
    pub fn as_flag(&self) -> bool {
        match self {
            AttrValue::Flag(b) => *b,
            AttrValue::Number(n) => *n != 0.0,
            AttrValue::Text(s) => {
                matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "да")
            }
        }
    }
}

/// Custom attribute: `{id, name, value}` triple
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attribute {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<AttrValue>,
}

/// Look up an attribute by stable id first, then by display name
pub fn attribute_value<'a>(
    attributes: &'a [Attribute],
    attr_id: &str,
    attr_name: &str,
) -> Option<&'a AttrValue> {
    let id = attr_id.trim();
    let name = attr_name.trim();
    if !id.is_empty()
        && let Some(attr) = attributes
            .iter()
            .find(|a| a.id.as_deref().map(str::trim) == Some(id))
    {
        return attr.value.as_ref();
    }
    if name.is_empty() {
        return None;
    }
    attributes
        .iter()
        .find(|a| a.name.as_deref().map(str::trim) == Some(name))
        .and_then(|a| a.value.as_ref())
}

/// Boolean attribute lookup by display name
pub fn attribute_flag(attributes: &[Attribute], attr_name: &str) -> Option<bool> {
    attribute_value(attributes, "", attr_name).map(AttrValue::as_flag)
}

/// Product barcode entry; only EAN-13 is of interest here
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Barcode {
    #[serde(default)]
    pub ean13: Option<String>,
}

/// Catalog item as embedded in an expanded position or kit component
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Assortment {
    #[serde(default)]
    pub meta: EntityRef,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub barcodes: Vec<Barcode>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Assortment {
    /// First EAN-13 product barcode, if any
    pub fn ean13(&self) -> Option<&str> {
        self.barcodes.iter().find_map(|b| b.ean13.as_deref())
    }

    /// Boolean flag attribute on the item itself
    pub fn flag(&self, attr_name: &str) -> Option<bool> {
        attribute_flag(&self.attributes, attr_name)
    }
}

/// One order position: a catalog item reference plus ordered quantity
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    #[serde(default)]
    pub assortment: Assortment,
    #[serde(default)]
    pub quantity: f64,
}

/// Kit component: `(referenced item, per-kit quantity)`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KitComponent {
    #[serde(default)]
    pub assortment: Assortment,
    #[serde(default)]
    pub quantity: f64,
}

/// Expanded kit body: its own attributes plus the component list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Kit {
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, deserialize_with = "rows")]
    pub components: Vec<KitComponent>,
}

impl Kit {
    /// The kit-level "all components require marking" flag
    pub fn flag(&self, attr_name: &str) -> Option<bool> {
        attribute_flag(&self.attributes, attr_name)
    }
}

/// Cheap order row as returned by list endpoints
///
/// Some upstream deployments include attributes in list rows, others do
/// not; callers must treat an empty attribute list as "unknown", not
/// "absent" (see the resolver's full-record fallback).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub moment: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl OrderSummary {
    /// Attribute value by id, falling back to name
    pub fn attribute_value(&self, attr_id: &str, attr_name: &str) -> Option<&AttrValue> {
        attribute_value(&self.attributes, attr_id, attr_name)
    }
}

/// Full order record, positions included
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderFull {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub moment: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, deserialize_with = "rows")]
    pub positions: Vec<Position>,
}

impl OrderFull {
    /// Attribute value by id, falling back to name
    pub fn attribute_value(&self, attr_id: &str, attr_name: &str) -> Option<&AttrValue> {
        attribute_value(&self.attributes, attr_id, attr_name)
    }

    /// Summary view of this order
    pub fn to_summary(&self) -> OrderSummary {
        OrderSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            moment: self.moment.clone(),
            description: self.description.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Unwrap the upstream `{ "rows": [...] }` collection envelope
fn rows<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    struct Rows<T> {
        #[serde(default = "Vec::new")]
        rows: Vec<T>,
    }
    Ok(Rows::deserialize(deserializer)?.rows)
}
