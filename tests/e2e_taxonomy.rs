//! End-to-end taxonomy: in-memory resolver through the `Profiler`.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use proptest::sample::Index;
use treeprofiler::query;
use treeprofiler::taxonomy::{self, TaxonomyOptions, EVOLTYPE, LCA, LINEAGE, SCI_NAME};
use treeprofiler::{newick, AnnotateConfig, Error, InMemoryTaxonomy, Node, Profiler, PropType, Tree, Value};

const TABLE: &str = "\
# taxid\tparent\trank\tname
1\t\tno rank\troot
2759\t1\tsuperkingdom\tEukaryota
9604\t2759\tfamily\tHominidae
9605\t9604\tgenus\tHomo
9606\t9605\tspecies\tHomo sapiens
9596\t9604\tgenus\tPan
9598\t9596\tspecies\tPan troglodytes
4932\t2759\tspecies\tSaccharomyces cerevisiae
";

fn taxonomy() -> InMemoryTaxonomy {
    InMemoryTaxonomy::from_reader(TABLE.as_bytes()).unwrap()
}

#[test]
fn profiler_runs_taxonomy() {
    let tax = taxonomy();
    let mut tree = newick::parse("((9606,9598)a,(9606,4932)b)Root;").unwrap();
    let report = Profiler::new(AnnotateConfig::default())
        .with_taxonomy(&tax)
        .annotate(&mut tree, &[])
        .unwrap();

    let a = tree.find_by_name("a").unwrap();
    let b = tree.find_by_name("b").unwrap();
    let root = tree.root();
    assert_eq!(tree.node(a).get(EVOLTYPE), Some(&Value::from("S")));
    assert_eq!(tree.node(b).get(EVOLTYPE), Some(&Value::from("S")));
    assert_eq!(tree.node(root).get(EVOLTYPE), Some(&Value::from("D")));
    assert_eq!(tree.node(root).get("dup_sp"), Some(&Value::from("9606")));
    assert_eq!(tree.node(root).get("dup_percent"), Some(&Value::Float(33.333)));

    assert_eq!(tree.node(a).get(SCI_NAME), Some(&Value::from("Hominidae")));
    let lca = tree.node(a).get(LCA).unwrap();
    assert_eq!(taxonomy::lca_at_rank(lca, "family"), Some("Hominidae"));
    assert_eq!(taxonomy::lca_at_rank(lca, "genus"), None);

    assert_eq!(report.rank2values["species"], ["Homo sapiens", "Pan troglodytes", "Homo sapiens", "Saccharomyces cerevisiae"]);
    assert_eq!(report.prop2type.get(LCA), Some(&PropType::MultiCategorical));
}

#[test]
fn unknown_taxid_is_external_error() {
    let tax = taxonomy();
    let mut tree = newick::parse("(9606,12345)Root;").unwrap();
    let err = Profiler::new(AnnotateConfig::default())
        .with_taxonomy(&tax)
        .annotate(&mut tree, &[])
        .unwrap_err();
    assert!(matches!(err, Error::External(_)));
}

#[test]
fn strict_mode_rejects_multifurcation() {
    let tax = taxonomy();
    let mut tree = newick::parse("(9606,9598,4932)Root;").unwrap();
    let strict = TaxonomyOptions { strict_binary: true, ..TaxonomyOptions::default() };
    assert!(matches!(taxonomy::annotate_taxa(&mut tree, &tax, &strict), Err(Error::Topology(_))));

    let mut tree = newick::parse("(9606,9598,4932)Root;").unwrap();
    let report = taxonomy::annotate_taxa(&mut tree, &tax, &TaxonomyOptions::default()).unwrap();
    assert_eq!(report.speciations + report.duplications, 0);
}

#[test]
fn cut_tree_at_family() {
    let tax = taxonomy();
    let mut tree = newick::parse("(((9606,9598)x,4932)y)Root;").unwrap();
    taxonomy::annotate_taxa(&mut tree, &tax, &TaxonomyOptions::default()).unwrap();
    assert_eq!(query::prune_by_rank(&mut tree, "family"), 1);
    let x = tree.find_by_name("Hominidae").unwrap();
    assert!(tree.is_leaf(x));
    assert_eq!(tree.leaf_names(), ["Hominidae", "4932"]);
}

fn lineage(tree: &Tree, id: treeprofiler::NodeId) -> Vec<String> {
    match tree.node(id).get(LINEAGE) {
        Some(Value::StrList(items)) => items.clone(),
        other => panic!("node '{}' has lineage {other:?}", tree.node(id).name),
    }
}

/// Random shapes; every leaf named by a taxid from `TABLE`.
fn arb_taxon_tree() -> impl Strategy<Value = Tree> {
    let taxids = vec!["9606", "9598", "4932", "9605", "9596", "9604", "2759"];
    (2usize..30)
        .prop_flat_map(move |n| {
            (
                proptest::collection::vec(any::<Index>(), n - 1),
                proptest::collection::vec(proptest::sample::select(taxids.clone()), n),
            )
        })
        .prop_map(|(parents, leaf_taxa)| {
            let mut tree = Tree::new(Node::new("Root"));
            let mut ids = vec![tree.root()];
            for (i, pick) in parents.iter().enumerate() {
                let parent = ids[pick.index(i + 1)];
                ids.push(tree.add_child(parent, Node::new(format!("n{}", i + 1))));
            }
            for (id, taxid) in ids.iter().zip(leaf_taxa) {
                if tree.is_leaf(*id) {
                    tree.node_mut(*id).name = taxid.to_string();
                }
            }
            tree
        })
}

proptest! {
    #[test]
    fn internal_lineage_covers_every_descendant(mut tree in arb_taxon_tree()) {
        let tax = taxonomy();
        taxonomy::annotate_taxa(&mut tree, &tax, &TaxonomyOptions::default()).unwrap();
        for id in tree.preorder() {
            if tree.is_leaf(id) {
                let own = lineage(&tree, id);
                prop_assert_eq!(own.last().map(String::as_str), Some(tree.node(id).name.as_str()));
                continue;
            }
            let clade = lineage(&tree, id);
            prop_assert!(!clade.is_empty());
            for d in tree.preorder_from(id) {
                let below = lineage(&tree, d);
                prop_assert!(below.starts_with(&clade), "{:?} not under {:?}", below, clade);
            }
        }
    }
}

#[test]
fn lineage_of_clade_is_common_ancestry() {
    let tax = taxonomy();
    let mut tree = newick::parse("((9606,9598)a,4932)Root;").unwrap();
    taxonomy::annotate_taxa(&mut tree, &tax, &TaxonomyOptions::default()).unwrap();
    let a = tree.find_by_name("a").unwrap();
    assert_eq!(lineage(&tree, a), ["1", "2759", "9604"]);
    assert_eq!(lineage(&tree, tree.root()), ["1", "2759"]);
    let human = tree.find_by_name("9606").unwrap();
    assert_eq!(lineage(&tree, human), ["1", "2759", "9604", "9605", "9606"]);
}
