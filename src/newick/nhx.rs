//! NHX property blocks: `[&&NHX:key=value:key=value]`.
//!
//! Values are written with percent-escapes for the characters that would
//! break the block (`% : = [ ] , ( ) ;`), so any string survives a round-trip.

use crate::model::{sorted_keys, Node, Prop2Type, Value, LIST_SEP};
use crate::Result;

/// Reserved NHX key carrying the branch support.
pub const SUPPORT_KEY: &str = "support";

/// Reserved NHX key carrying the root's branch length, which plain Newick
/// has no slot for.
pub const ROOT_DIST_KEY: &str = "dist";

const ESCAPED: [(char, &str); 9] = [
    ('%', "%25"),
    (':', "%3A"),
    ('=', "%3D"),
    ('[', "%5B"),
    (']', "%5D"),
    (',', "%2C"),
    ('(', "%28"),
    (')', "%29"),
    (';', "%3B"),
];

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match ESCAPED.iter().find(|(e, _)| *e == c) {
            Some((_, code)) => out.push_str(code),
            None => out.push(c),
        }
    }
    out
}

pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        match ESCAPED.iter().find(|(_, code)| tail.starts_with(code)) {
            Some((c, code)) => {
                out.push(*c);
                rest = &tail[code.len()..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Apply the body of an `&&NHX` comment (prefix already stripped) to `node`.
///
/// Values land as raw strings; `retype` converts them once the side table
/// of property types is known.
pub(crate) fn apply(node: &mut Node, body: &str) -> Result<()> {
    for pair in body.split(':').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = unescape(key);
        let value = unescape(value);
        if key == SUPPORT_KEY {
            node.support = value.parse::<f64>().ok();
            continue;
        }
        if key == ROOT_DIST_KEY {
            if let Ok(dist) = value.parse::<f64>() {
                node.dist = dist;
            }
            continue;
        }
        node.props.insert(key, Value::Str(value));
    }
    Ok(())
}

/// Render the NHX block of `node`; empty string when it has nothing to carry.
pub(crate) fn render(node: &Node, is_root: bool) -> String {
    let keys = sorted_keys(&node.props);
    let root_dist = (is_root && node.dist != 0.0).then_some(node.dist);
    if keys.is_empty() && node.support.is_none() && root_dist.is_none() {
        return String::new();
    }
    let mut out = String::from("[&&NHX");
    if let Some(dist) = root_dist {
        out.push_str(&format!(":{ROOT_DIST_KEY}={dist}"));
    }
    if let Some(support) = node.support {
        out.push_str(&format!(":{SUPPORT_KEY}={support}"));
    }
    for key in keys {
        let value = &node.props[key.as_str()];
        out.push(':');
        out.push_str(&escape(key));
        out.push('=');
        out.push_str(&escape(&value.to_wire(LIST_SEP)));
    }
    out.push(']');
    out
}

/// Convert raw string properties to their declared types.
pub(crate) fn retype(node: &mut Node, prop2type: &Prop2Type) {
    for (key, value) in node.props.iter_mut() {
        let Some(ptype) = prop2type.get(key.as_str()) else { continue };
        if let Value::Str(raw) = value {
            let typed = ptype.coerce(raw, LIST_SEP);
            *value = typed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_roundtrip() {
        let raw = "a:b=c[d],e(f);g%h";
        let esc = escape(raw);
        assert!(!esc.contains(':') && !esc.contains('[') && !esc.contains(','));
        assert_eq!(unescape(&esc), raw);
    }

    #[test]
    fn test_render_sorted() {
        let node = Node::new("x")
            .with_property("b", "2")
            .with_property("a", Value::StrList(vec!["p".into(), "q".into()]));
        assert_eq!(render(&node, false), "[&&NHX:a=p||q:b=2]");
        assert_eq!(render(&node.clone().with_dist(0.5), true), "[&&NHX:dist=0.5:a=p||q:b=2]");
        assert_eq!(render(&Node::new("y").with_dist(0.5), false), "");
    }

    #[test]
    fn test_apply_support() {
        let mut node = Node::new("x");
        apply(&mut node, ":support=0.9:k=v%3Aw").unwrap();
        assert_eq!(node.support, Some(0.9));
        assert_eq!(node.get("k"), Some(&Value::from("v:w")));
    }
}
