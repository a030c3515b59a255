//! Lossless tree snapshot: serde JSON of the flat preorder node list plus the
//! type table, wrapped in base64 so it travels as a single line of text.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::model::{FlatNode, Prop2Type, Tree};
use crate::{Error, Result};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    prop2type: Prop2Type,
    nodes: Vec<FlatNode>,
}

/// Encode `tree` and its type table.
pub fn encode(tree: &Tree, prop2type: &Prop2Type) -> Result<String> {
    let snap = Snapshot {
        version: FORMAT_VERSION,
        prop2type: prop2type.clone(),
        nodes: tree.to_flat(),
    };
    let json = serde_json::to_vec(&snap).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(STANDARD.encode(json))
}

/// Decode a snapshot produced by [`encode`].
pub fn decode(text: &str) -> Result<(Tree, Prop2Type)> {
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| Error::Serialization(format!("snapshot is not base64: {e}")))?;
    let snap: Snapshot =
        serde_json::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))?;
    if snap.version != FORMAT_VERSION {
        return Err(Error::Serialization(format!(
            "unsupported snapshot version {} (expected {FORMAT_VERSION})",
            snap.version
        )));
    }
    let tree = Tree::from_flat(snap.nodes)?;
    Ok((tree, snap.prop2type))
}
