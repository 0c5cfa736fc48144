//! Bundle explosion and marking-requirement calculation
//!
//! Flattens an order's positions into atomic unit lines: atomic items map
//! to one line each, kit positions are expanded into one line per
//! component with quantities multiplied through. The flattened lines are
//! aggregated by item identity, and the total count of units that need a
//! serialized marking code falls out as the sum over marked lines.
//!
//! Kit nesting is flattened exactly one level: a component that is itself
//! a kit stays an opaque line. That is a deliberate scope limit, not an
//! oversight — nested kits do not occur in the upstream catalogs this
//! service targets.

use async_trait::async_trait;
use packmark_client::{ClientResult, UpstreamClient};
use shared::ExplodedLine;
use shared::order::{Assortment, EntityRef, Kit, Position};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Kit lookups the calculator runs against
///
/// Implemented by [`UpstreamClient`]; tests substitute an in-memory map.
/// `None` means the reference could not be resolved — the caller records
/// a warning and skips the position rather than failing the calculation.
#[async_trait]
pub trait KitSource: Send + Sync {
    async fn kit(&self, kit_ref: &EntityRef) -> ClientResult<Option<Kit>>;
}

#[async_trait]
impl KitSource for UpstreamClient {
    async fn kit(&self, kit_ref: &EntityRef) -> ClientResult<Option<Kit>> {
        self.get_kit(kit_ref).await
    }
}

/// Explosion tuning knobs
#[derive(Debug, Clone)]
pub struct ExplodeOptions {
    /// Boolean item attribute: this item requires marking
    pub marking_attr: String,
    /// Boolean kit attribute: every component of this kit requires
    /// marking, regardless of the components' own flags
    pub kit_marking_attr: String,
    /// Component-count cap per kit; oversized kits are truncated with a
    /// warning, never failed
    pub max_components: usize,
}

impl Default for ExplodeOptions {
    fn default() -> Self {
        Self {
            marking_attr: "requires_marking".to_string(),
            kit_marking_attr: "kit_requires_marking".to_string(),
            max_components: 200,
        }
    }
}

/// Result of exploding one order's positions
#[derive(Debug, Clone, Default)]
pub struct ExplosionReport {
    /// Total units requiring a serialized marking code
    pub expected_units: f64,
    /// Aggregated flattened lines
    pub lines: Vec<ExplodedLine>,
    /// Non-fatal conditions: missing kit references, truncated kits
    pub warnings: Vec<String>,
}

/// Flatten positions into aggregated [`ExplodedLine`]s
pub async fn explode_positions<K: KitSource + ?Sized>(
    kits: &K,
    positions: &[Position],
    options: &ExplodeOptions,
) -> ClientResult<ExplosionReport> {
    let mut raw: Vec<ExplodedLine> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    for position in positions {
        let qty = position.quantity;
        let item = &position.assortment;

        if !item.meta.is_kit() {
            let marked = item.flag(&options.marking_attr).unwrap_or(false);
            raw.push(line_for(item, qty, marked));
            continue;
        }

        let Some(kit) = kits.kit(&item.meta).await? else {
            warnings.push(format!(
                "kit '{}' has no resolvable reference, position skipped",
                display_name(item)
            ));
            continue;
        };

        let kit_marked = kit.flag(&options.kit_marking_attr).unwrap_or(false);
        let mut components = kit.components;
        if components.len() > options.max_components {
            warnings.push(format!(
                "kit '{}' has {} components, truncated to {}",
                display_name(item),
                components.len(),
                options.max_components
            ));
            components.truncate(options.max_components);
        }

        for component in components {
            let marked =
                kit_marked || component.assortment.flag(&options.marking_attr).unwrap_or(false);
            raw.push(line_for(&component.assortment, qty * component.quantity, marked));
        }
    }

    let lines = aggregate(raw);
    let expected_units = lines
        .iter()
        .filter(|l| l.requires_marking)
        .map(|l| l.quantity)
        .sum();

    Ok(ExplosionReport {
        expected_units,
        lines,
        warnings,
    })
}

fn line_for(item: &Assortment, quantity: f64, requires_marking: bool) -> ExplodedLine {
    ExplodedLine {
        item_ref: item.meta.href.clone(),
        item_kind: item.meta.kind.clone(),
        code: item.code.clone(),
        name: item.name.clone(),
        ean13: item.ean13().map(str::to_string),
        quantity,
        requires_marking,
    }
}

fn display_name(item: &Assortment) -> &str {
    item.name
        .as_deref()
        .or(item.code.as_deref())
        .unwrap_or("<unnamed>")
}

/// Sum quantities of lines sharing an identity key, preserving encounter
/// order. Lines without any identity get a synthetic per-line ordinal and
/// are never merged together.
fn aggregate(raw: Vec<ExplodedLine>) -> Vec<ExplodedLine> {
    let mut out: Vec<ExplodedLine> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for (ordinal, line) in raw.into_iter().enumerate() {
        let key = line
            .identity_key()
            .unwrap_or_else(|| format!("#{}", ordinal + 1));
        match slots.entry(key) {
            Entry::Occupied(slot) => {
                let existing = &mut out[*slot.get()];
                existing.quantity += line.quantity;
                existing.requires_marking = existing.requires_marking || line.requires_marking;
            }
            Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push(line);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{AttrValue, Attribute, Barcode, KitComponent};
    use std::collections::HashMap;

    const MARK: &str = "requires_marking";
    const KIT_MARK: &str = "kit_requires_marking";

    fn flag_attr(name: &str, value: bool) -> Attribute {
        Attribute {
            id: None,
            name: Some(name.to_string()),
            value: Some(AttrValue::Flag(value)),
        }
    }

    fn item(href: &str, name: &str, marked: bool) -> Assortment {
        Assortment {
            meta: EntityRef {
                href: Some(href.to_string()),
                kind: Some("product".to_string()),
            },
            code: None,
            name: Some(name.to_string()),
            barcodes: vec![Barcode {
                ean13: Some("4600000000017".to_string()),
            }],
            attributes: vec![flag_attr(MARK, marked)],
        }
    }

    fn kit_ref(href: &str, name: &str) -> Assortment {
        Assortment {
            meta: EntityRef {
                href: Some(href.to_string()),
                kind: Some("bundle".to_string()),
            },
            code: None,
            name: Some(name.to_string()),
            barcodes: Vec::new(),
            attributes: Vec::new(),
        }
    }

    fn position(assortment: Assortment, quantity: f64) -> Position {
        Position {
            assortment,
            quantity,
        }
    }

    struct FakeKits(HashMap<String, Kit>);

    impl FakeKits {
        fn with(href: &str, kit: Kit) -> Self {
            let mut map = HashMap::new();
            map.insert(href.to_string(), kit);
            Self(map)
        }
    }

    #[async_trait]
    impl KitSource for FakeKits {
        async fn kit(&self, kit_ref: &EntityRef) -> ClientResult<Option<Kit>> {
            Ok(kit_ref
                .href
                .as_deref()
                .and_then(|h| self.0.get(h))
                .cloned())
        }
    }

    fn opts() -> ExplodeOptions {
        ExplodeOptions::default()
    }

    #[tokio::test]
    async fn atomic_item_takes_its_own_flag() {
        let kits = FakeKits(HashMap::new());
        let positions = vec![
            position(item("h-1", "Marked", true), 3.0),
            position(item("h-2", "Plain", false), 5.0),
        ];

        let report = explode_positions(&kits, &positions, &opts()).await.unwrap();
        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.expected_units, 3.0);
        assert!(report.warnings.is_empty());
        assert_eq!(report.lines[0].ean13.as_deref(), Some("4600000000017"));
    }

    #[tokio::test]
    async fn kit_explosion_multiplies_quantities() {
        // Order: one kit line, quantity 2, components A (3 per kit,
        // marked) and B (1 per kit, unmarked) -> A=6 marked, B=2 plain,
        // expected units 6.
        let kit = Kit {
            attributes: vec![flag_attr(KIT_MARK, false)],
            components: vec![
                KitComponent {
                    assortment: item("h-a", "A", true),
                    quantity: 3.0,
                },
                KitComponent {
                    assortment: item("h-b", "B", false),
                    quantity: 1.0,
                },
            ],
        };
        let kits = FakeKits::with("h-kit", kit);
        let positions = vec![position(kit_ref("h-kit", "Duo pack"), 2.0)];

        let report = explode_positions(&kits, &positions, &opts()).await.unwrap();
        assert_eq!(report.expected_units, 6.0);
        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.lines[0].quantity, 6.0);
        assert!(report.lines[0].requires_marking);
        assert_eq!(report.lines[1].quantity, 2.0);
        assert!(!report.lines[1].requires_marking);
    }

    #[tokio::test]
    async fn kit_flag_forces_all_components() {
        let kit = Kit {
            attributes: vec![flag_attr(KIT_MARK, true)],
            components: vec![KitComponent {
                assortment: item("h-b", "B", false),
                quantity: 4.0,
            }],
        };
        let kits = FakeKits::with("h-kit", kit);
        let positions = vec![position(kit_ref("h-kit", "Forced"), 1.0)];

        let report = explode_positions(&kits, &positions, &opts()).await.unwrap();
        assert!(report.lines[0].requires_marking);
        assert_eq!(report.expected_units, 4.0);
    }

    #[tokio::test]
    async fn missing_kit_reference_warns_and_skips() {
        let kits = FakeKits(HashMap::new());
        let positions = vec![
            position(kit_ref("h-gone", "Ghost kit"), 2.0),
            position(item("h-1", "Still here", true), 1.0),
        ];

        let report = explode_positions(&kits, &positions, &opts()).await.unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Ghost kit"));
        // The rest of the order is still calculated
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.expected_units, 1.0);
    }

    #[tokio::test]
    async fn oversized_kit_is_truncated_with_warning() {
        let kit = Kit {
            attributes: Vec::new(),
            components: vec![
                KitComponent {
                    assortment: item("h-a", "A", true),
                    quantity: 1.0,
                },
                KitComponent {
                    assortment: item("h-b", "B", true),
                    quantity: 1.0,
                },
            ],
        };
        let kits = FakeKits::with("h-kit", kit);
        let positions = vec![position(kit_ref("h-kit", "Big kit"), 1.0)];
        let mut options = opts();
        options.max_components = 1;

        let report = explode_positions(&kits, &positions, &options)
            .await
            .unwrap();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("truncated"));
        assert_eq!(report.expected_units, 1.0);
    }

    #[tokio::test]
    async fn same_item_across_positions_aggregates() {
        // Item appears both standalone and inside a kit: contributions
        // sum under one identity key.
        let kit = Kit {
            attributes: Vec::new(),
            components: vec![KitComponent {
                assortment: item("h-a", "A", true),
                quantity: 3.0,
            }],
        };
        let kits = FakeKits::with("h-kit", kit);
        let positions = vec![
            position(item("h-a", "A", true), 2.0),
            position(kit_ref("h-kit", "Kit"), 2.0),
        ];

        let report = explode_positions(&kits, &positions, &opts()).await.unwrap();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].quantity, 8.0); // 2 + 2*3
        assert_eq!(report.expected_units, 8.0);
    }

    #[tokio::test]
    async fn identity_less_lines_never_merge() {
        let anonymous = Assortment::default();
        let positions = vec![
            position(anonymous.clone(), 1.0),
            position(anonymous, 2.0),
        ];
        let kits = FakeKits(HashMap::new());

        let report = explode_positions(&kits, &positions, &opts()).await.unwrap();
        assert_eq!(report.lines.len(), 2);
    }

    #[tokio::test]
    async fn nested_kit_component_stays_opaque() {
        // A component that is itself a kit is emitted as a single line,
        // not recursed into.
        let inner_ref = kit_ref("h-inner", "Inner kit");
        let kit = Kit {
            attributes: Vec::new(),
            components: vec![KitComponent {
                assortment: inner_ref,
                quantity: 2.0,
            }],
        };
        let kits = FakeKits::with("h-outer", kit);
        let positions = vec![position(kit_ref("h-outer", "Outer kit"), 1.0)];

        let report = explode_positions(&kits, &positions, &opts()).await.unwrap();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].item_kind.as_deref(), Some("bundle"));
        assert_eq!(report.lines[0].quantity, 2.0);
    }
}
