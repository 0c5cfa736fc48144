//! Packmark shared domain model
//!
//! Types and pure logic shared between the upstream client and the indexer:
//!
//! - **Orders** (`order`): read-only views of upstream orders, positions,
//!   catalog items and their custom attributes
//! - **Marking codes** (`codes`): the delimited code block codec plus
//!   code normalization and soft validation
//! - **Exploded lines** (`exploded`): flattened bill-of-materials rows
//!   produced by kit explosion
//! - **Utilities** (`util`): timestamp helpers

pub mod codes;
pub mod exploded;
pub mod order;
pub mod util;

pub use codes::{extract_block, has_block, normalize_codes, replace_block, soft_validate_code};
pub use exploded::ExplodedLine;
pub use order::{
    Assortment, AttrValue, Attribute, EntityRef, Kit, KitComponent, OrderFull, OrderSummary,
    Position,
};
