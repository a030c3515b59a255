//! # Persistence
//!
//! Writes an annotated tree in the on-disk layout:
//!
//! ```text
//! {prefix}_annotated.nw      extended Newick, every property in NHX blocks
//! {prefix}_prop2type.txt     name<TAB>type, one per line
//! {prefix}_annotated.ete     base64 snapshot, lossless
//! {prefix}_annotated.tsv     one row per node (optional)
//! ```

pub mod snapshot;
pub mod tsv;

use std::fs;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::model::{Prop2Type, PropType, Tree};
use crate::newick;
use crate::{Error, Result};

pub use tsv::write_tsv;

/// Paths written by [`save_annotated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFiles {
    pub newick: PathBuf,
    pub prop2type: PathBuf,
    pub snapshot: PathBuf,
    pub tsv: Option<PathBuf>,
}

pub fn write_prop2type<W: Write>(prop2type: &Prop2Type, writer: &mut W) -> Result<()> {
    for (name, ptype) in prop2type {
        writeln!(writer, "{name}\t{ptype}")?;
    }
    Ok(())
}

pub fn read_prop2type<R: BufRead>(reader: R) -> Result<Prop2Type> {
    let mut out = Prop2Type::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (name, ptype) = line.split_once('\t').ok_or_else(|| {
            Error::InputValidation(format!("prop2type line {} lacks a tab", lineno + 1))
        })?;
        out.insert(name.to_string(), ptype.parse::<PropType>()?);
    }
    Ok(out)
}

/// Write every artefact for `tree` into `dir`.
pub fn save_annotated(
    tree: &Tree,
    prop2type: &Prop2Type,
    dir: impl AsRef<Path>,
    prefix: &str,
    with_tsv: bool,
) -> Result<SavedFiles> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let files = SavedFiles {
        newick: dir.join(format!("{prefix}_annotated.nw")),
        prop2type: dir.join(format!("{prefix}_prop2type.txt")),
        snapshot: dir.join(format!("{prefix}_annotated.ete")),
        tsv: with_tsv.then(|| dir.join(format!("{prefix}_annotated.tsv"))),
    };

    fs::write(&files.newick, newick::to_nhx(tree))?;

    let mut w = BufWriter::new(fs::File::create(&files.prop2type)?);
    write_prop2type(prop2type, &mut w)?;
    w.flush()?;

    fs::write(&files.snapshot, snapshot::encode(tree, prop2type)?)?;

    if let Some(path) = &files.tsv {
        let mut w = BufWriter::new(fs::File::create(path)?);
        write_tsv(tree, &mut w)?;
        w.flush()?;
    }

    tracing::info!(dir = %dir.display(), prefix, "annotated tree saved");
    Ok(files)
}

/// Reload a tree from its snapshot file.
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<(Tree, Prop2Type)> {
    let text = fs::read_to_string(path)?;
    snapshot::decode(&text)
}

/// Reload a tree from its extended Newick and type side file.
pub fn load_newick(newick_path: impl AsRef<Path>, prop2type_path: impl AsRef<Path>) -> Result<(Tree, Prop2Type)> {
    let file = fs::File::open(prop2type_path)?;
    let prop2type = read_prop2type(std::io::BufReader::new(file))?;
    let text = fs::read_to_string(newick_path)?;
    let tree = newick::parse_typed(&text, &prop2type)?;
    Ok((tree, prop2type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prop2type_side_file() {
        let p2t = Prop2Type::from([
            ("b".to_string(), PropType::Numeric),
            ("a".to_string(), PropType::MultiCategorical),
        ]);
        let mut out = Vec::new();
        write_prop2type(&p2t, &mut out).unwrap();
        assert_eq!(String::from_utf8(out.clone()).unwrap(), "a\tmulti_categorical\nb\tnumeric\n");
        assert_eq!(read_prop2type(out.as_slice()).unwrap(), p2t);
        assert!(read_prop2type("a numeric\n".as_bytes()).is_err());
    }
}
