//! # Annotated Tree Model
//!
//! Plain data shared by every stage: the arena tree, its nodes, the tagged
//! property values, and the semantic type table.
//!
//! Design rule: no I/O here. Parsing and writing live in `newick` and `export`.

pub mod node;
pub mod tree;
pub mod value;
pub mod property_map;
pub mod prop_type;

pub use node::{Node, NodeId};
pub use tree::{FlatNode, Tree};
pub use value::{Value, MISSING, LIST_SEP, parse_bool, format_float};
pub use property_map::{PropertyMap, sorted_keys};
pub use prop_type::{PropType, Prop2Type};
