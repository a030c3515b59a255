//! Property map: the key-value store on every tree node.

use hashbrown::HashMap;
use super::Value;

/// A map of property names to values.
pub type PropertyMap = HashMap<String, Value>;

/// Keys of a property map in lexicographic order.
///
/// Every textual sink walks properties through this so output is stable.
pub fn sorted_keys(props: &PropertyMap) -> Vec<&String> {
    let mut keys: Vec<&String> = props.keys().collect();
    keys.sort();
    keys
}
