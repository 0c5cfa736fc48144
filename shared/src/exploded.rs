//! Flattened bill-of-materials rows produced by kit explosion

use serde::{Deserialize, Serialize};

/// One flattened line of an exploded order
///
/// Atomic positions map to one line each; kit positions map to one line
/// per component with the quantity multiplied through.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExplodedLine {
    /// Stable upstream reference of the item, if known
    pub item_ref: Option<String>,
    /// Entity kind: `product`, `bundle`, `service`, `component`, ...
    pub item_kind: Option<String>,
    /// Catalog code
    pub code: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// EAN-13 product barcode
    pub ean13: Option<String>,
    /// Aggregated unit quantity
    pub quantity: f64,
    /// Whether each unit of this line needs a serialized marking code
    pub requires_marking: bool,
}

impl ExplodedLine {
    /// Stable identity for aggregation: reference, else code, else name.
    ///
    /// `None` means the line has no usable identity and must be keyed by a
    /// synthetic ordinal assigned in encounter order; collapsing such lines
    /// together would silently merge unrelated items.
    pub fn identity_key(&self) -> Option<String> {
        for candidate in [&self.item_ref, &self.code, &self.name] {
            if let Some(v) = candidate {
                let v = v.trim();
                if !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
        None
    }
}
