//! Persistence round-trip: annotate → save to disk → reload each artefact.

use pretty_assertions::assert_eq;
use treeprofiler::export::{load_newick, load_snapshot, save_annotated};
use treeprofiler::{newick, AnnotateConfig, MetadataTable, Profiler, PropType, ReadOptions, Tree, Value};

const TABLE: &str = "\
name\talphabet_type\tcol1\ttags
A\tvowel\t1\tx,y
B\tconsonant\t2\ty
E\tvowel\tNaN\ty,z
D\tconsonant\t3\tz
";

fn annotated() -> (Tree, treeprofiler::Prop2Type) {
    let mut tree = newick::parse("(A:1,(B:1,(E:1,D:1)I1:0.5)I2:0.5)Root;").unwrap();
    let table = MetadataTable::parse_str(TABLE, &ReadOptions::default()).unwrap();
    let report = Profiler::new(AnnotateConfig::default()).annotate(&mut tree, &[table]).unwrap();
    (tree, report.prop2type)
}

#[test]
fn save_writes_every_artefact() {
    let (tree, p2t) = annotated();
    let dir = tempfile::tempdir().unwrap();
    let files = save_annotated(&tree, &p2t, dir.path(), "run", true).unwrap();

    assert_eq!(files.newick, dir.path().join("run_annotated.nw"));
    assert!(files.prop2type.exists());
    assert!(files.snapshot.exists());
    let tsv = std::fs::read_to_string(files.tsv.unwrap()).unwrap();
    let header = tsv.lines().next().unwrap();
    assert!(header.starts_with("name\tdist\tsupport\t"));
    assert!(header.contains("alphabet_type_counter"));
    let a_row = tsv.lines().find(|l| l.starts_with("A\t")).unwrap();
    assert!(a_row.contains("x|y"));

    let side = std::fs::read_to_string(&files.prop2type).unwrap();
    assert!(side.contains("col1\tnumeric\n"));
    assert!(side.contains("tags\tmulti_categorical\n"));
}

#[test]
fn snapshot_reload_is_lossless() {
    let (tree, p2t) = annotated();
    let dir = tempfile::tempdir().unwrap();
    let files = save_annotated(&tree, &p2t, dir.path(), "run", false).unwrap();
    assert!(files.tsv.is_none());

    let (back, back_p2t) = load_snapshot(&files.snapshot).unwrap();
    assert_eq!(back_p2t, p2t);
    assert_eq!(newick::to_nhx(&back), newick::to_nhx(&tree));
    let e = back.find_by_name("E").unwrap();
    assert!(back.node(e).get("col1").unwrap().is_missing());
}

#[test]
fn extended_newick_reload_restores_types() {
    let (tree, p2t) = annotated();
    let dir = tempfile::tempdir().unwrap();
    let files = save_annotated(&tree, &p2t, dir.path(), "run", false).unwrap();

    let (back, back_p2t) = load_newick(&files.newick, &files.prop2type).unwrap();
    assert_eq!(back_p2t.get("col1_avg"), Some(&PropType::Numeric));
    assert_eq!(back.leaf_names(), tree.leaf_names());

    let i1 = back.find_by_name("I1").unwrap();
    assert_eq!(back.node(i1).get("alphabet_type_counter"), Some(&Value::from("consonant--1||vowel--1")));
    assert_eq!(back.node(i1).get("col1_avg"), Some(&Value::Float(3.0)));
    let a = back.find_by_name("A").unwrap();
    assert_eq!(back.node(a).get("tags"), Some(&Value::StrList(vec!["x".into(), "y".into()])));
    assert_eq!(back.node(a).get("col1"), Some(&Value::Float(1.0)));
}

#[test]
fn missing_files_are_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_snapshot(dir.path().join("absent.ete")).unwrap_err();
    assert!(matches!(err, treeprofiler::Error::Io(_)));
}
