//! End-to-end query tests: annotate, then prune / collapse / highlight.

use pretty_assertions::assert_eq;
use treeprofiler::query::{self, DecorationKind};
use treeprofiler::{newick, AnnotateConfig, Error, MetadataTable, Profiler, ReadOptions, Tree};

fn s1_annotated() -> Tree {
    let mut tree = newick::parse("(A:1,(B:1,(E:1,D:1)I1:0.5)I2:0.5)Root;").unwrap();
    let table = MetadataTable::parse_str(
        "name\talphabet_type\tcol1\nA\tvowel\t1\nB\tconsonant\t2\nD\tconsonant\t3\nE\tvowel\t4\n",
        &ReadOptions::default(),
    )
    .unwrap();
    Profiler::new(AnnotateConfig::default()).annotate(&mut tree, &[table]).unwrap();
    tree
}

fn names(tree: &Tree, ids: &[treeprofiler::NodeId]) -> Vec<String> {
    ids.iter().map(|id| tree.node(*id).name.clone()).collect()
}

// ============================================================================
// Prune
// ============================================================================

#[test]
fn prune_by_counter_count() {
    let mut tree = s1_annotated();
    let pred = query::parse("alphabet_type_counter:consonant < 2").unwrap();
    assert_eq!(query::prune(&mut tree, &pred).unwrap(), 1);
    assert_eq!(tree.leaf_names(), ["A", "B"]);
    assert!(tree.find_by_name("I1").is_none());
}

#[test]
fn prune_is_idempotent() {
    let mut tree = s1_annotated();
    let pred = query::parse("alphabet_type = vowel").unwrap();
    query::prune(&mut tree, &pred).unwrap();
    let once = newick::to_nhx(&tree);
    assert_eq!(query::prune(&mut tree, &pred).unwrap(), 0);
    assert_eq!(newick::to_nhx(&tree), once);
    assert_eq!(tree.leaf_names(), ["B", "D"]);
}

#[test]
fn prune_on_leaf_numeric_or() {
    let mut tree = s1_annotated();
    let pred = query::parse("col1 >= 4 ; col1 <= 1").unwrap();
    query::prune(&mut tree, &pred).unwrap();
    assert_eq!(tree.leaf_names(), ["B", "D"]);
}

// ============================================================================
// Select
// ============================================================================

#[test]
fn select_with_and_and_pseudo_props() {
    let tree = s1_annotated();
    let pred = query::parse("alphabet_type = consonant, dist = 1").unwrap();
    let hits = query::select(&tree, &pred).unwrap();
    assert_eq!(names(&tree, &hits), ["B", "D"]);

    let hits = query::select(&tree, &query::parse("name in A|E").unwrap()).unwrap();
    assert_eq!(names(&tree, &hits), ["A", "E"]);

    let hits = query::select(&tree, &query::parse("alphabet_type_counter contains vowel--2").unwrap()).unwrap();
    assert_eq!(names(&tree, &hits), ["Root"]);
}

#[test]
fn missing_property_never_matches() {
    let tree = s1_annotated();
    let hits = query::select(&tree, &query::parse("col1_avg > 0").unwrap()).unwrap();
    assert_eq!(names(&tree, &hits), ["Root", "I2", "I1"]);
    let hits = query::select(&tree, &query::parse("nosuch = x").unwrap()).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn malformed_queries() {
    assert!(matches!(query::parse(""), Err(Error::SyntaxError { .. })));
    assert!(matches!(query::parse("col1 >"), Err(Error::SyntaxError { .. })));
    assert!(matches!(query::parse("c:k in a"), Err(Error::SyntaxError { .. })));
    let tree = s1_annotated();
    let err = query::select(&tree, &query::parse("alphabet_type > 1").unwrap()).unwrap_err();
    assert!(matches!(err, Error::TypeError { .. }));
}

// ============================================================================
// Decorations
// ============================================================================

#[test]
fn collapse_marks_topmost_internal_match() {
    let tree = s1_annotated();
    let before = newick::to_nhx(&tree);
    let pred = query::parse("col1_avg > 2").unwrap();
    let deco = query::collapse(&tree, &pred, "#ff0000").unwrap();
    assert_eq!(deco.kind, DecorationKind::Collapsed);
    assert_eq!(deco.marked_names(), ["Root"]);
    assert_eq!(newick::to_nhx(&tree), before);

    let deco = query::collapse(&tree, &query::parse("col1_avg > 3").unwrap(), "#ff0000").unwrap();
    assert_eq!(deco.marked_names(), ["I1"]);
    let root = tree.root();
    assert!(deco.path[&root].contains("#ff0000"));
}

#[test]
fn highlight_marks_every_match_and_path() {
    let tree = s1_annotated();
    let before = newick::to_nhx(&tree);
    let deco = query::highlight(&tree, &query::parse("alphabet_type = vowel").unwrap(), "gold").unwrap();
    assert_eq!(deco.kind, DecorationKind::Highlighted);
    assert_eq!(deco.marked_names(), ["A", "E"]);
    for anc in ["Root", "I2", "I1"] {
        let id = tree.find_by_name(anc).unwrap();
        assert!(deco.path.get(&id).is_some_and(|c| c.contains("gold")), "{anc} not on path");
    }
    assert_eq!(newick::to_nhx(&tree), before);
}
