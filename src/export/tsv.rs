//! Flat per-node property table.

use std::collections::BTreeSet;
use std::io::Write;

use crate::model::{Tree, Value, MISSING};
use crate::Result;

/// Separator for list items inside a TSV cell.
pub const TSV_LIST_SEP: &str = "|";

/// Write one row per reachable node (preorder): `name`, `dist`, `support`,
/// then every property key seen anywhere, sorted.
pub fn write_tsv<W: Write>(tree: &Tree, writer: &mut W) -> Result<()> {
    let order = tree.preorder();
    let keys: BTreeSet<&String> = order.iter().flat_map(|id| tree.node(*id).props.keys()).collect();

    let mut header = vec!["name", "dist", "support"];
    header.extend(keys.iter().map(|k| k.as_str()));
    writeln!(writer, "{}", header.join("\t"))?;

    for id in &order {
        let node = tree.node(*id);
        let mut row = vec![
            clean(&node.name),
            Value::Float(node.dist).to_string(),
            Value::from(node.support).to_string(),
        ];
        for key in &keys {
            row.push(match node.get(key) {
                Some(v) => clean(&v.to_wire(TSV_LIST_SEP)),
                None => MISSING.to_string(),
            });
        }
        writeln!(writer, "{}", row.join("\t"))?;
    }
    Ok(())
}

fn clean(cell: &str) -> String {
    cell.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newick;

    #[test]
    fn test_union_of_keys() {
        let mut t = newick::parse("(A:1,B:2)Root;").unwrap();
        let a = t.find_by_name("A").unwrap();
        let b = t.find_by_name("B").unwrap();
        t.node_mut(a).set("tags", Value::StrList(vec!["x".into(), "y".into()]));
        t.node_mut(b).set("score", 2.5);
        let mut out = Vec::new();
        write_tsv(&t, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name\tdist\tsupport\tscore\ttags");
        assert_eq!(lines[1], "Root\t0.0\tNaN\tNaN\tNaN");
        assert_eq!(lines[2], "A\t1.0\tNaN\tNaN\tx|y");
        assert_eq!(lines[3], "B\t2.0\tNaN\t2.5\tNaN");
    }
}
