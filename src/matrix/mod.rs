//! # Matrix Builder
//!
//! Leaf × property matrices with a colour for every cell, ready for a
//! renderer. Rows carry node names by value, never references into the tree.
//!
//! | Flavour | Builder | Internal rows |
//! |---------|---------|---------------|
//! | categorical | [`categorical_matrix`] | none |
//! | numeric | [`numeric_matrices`] | `p_avg` |
//! | binary | [`binary_matrix`] | `p_counter` positive share |
//! | multi-presence | [`multi_presence_matrix`] | relative frequency |

pub mod binary;
pub mod categorical;
pub mod color;
pub mod config;
pub mod multi;
pub mod numeric;

use serde::{Deserialize, Serialize};

use crate::model::{NodeId, Tree};

pub use binary::{binary_matrix, BinaryMatrix, BinaryOptions};
pub use categorical::{categorical_matrix, CategoricalMatrix};
pub use color::{Gradient, Rgb, ABSENCE_COLOR, CATEGORICAL_PALETTE};
pub use config::{ColorConfig, Detail};
pub use multi::{multi_presence_matrix, MultiPresenceMatrix};
pub use numeric::{normalize, numeric_matrices, Normalization, NumericMatrix, NumericMatrixOptions};

/// One matrix row: a node and its name at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowKey {
    pub node: NodeId,
    pub name: String,
    pub is_leaf: bool,
}

/// Leaves left to right, then internal nodes in preorder when requested.
pub(crate) fn row_keys(tree: &Tree, include_internal: bool) -> Vec<RowKey> {
    let key = |id: NodeId| RowKey {
        node: id,
        name: tree.node(id).name.clone(),
        is_leaf: tree.is_leaf(id),
    };
    let mut rows: Vec<RowKey> = tree.leaves().into_iter().map(key).collect();
    if include_internal {
        rows.extend(tree.preorder().into_iter().filter(|id| !tree.is_leaf(*id)).map(key));
    }
    rows
}
