//! Repeat library inputs: single files or a pooled concatenated stream, and
//! the per-repeat details needed by the feature writers.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use bio::io::fasta;

use crate::{Error, Result};

/// One search input for a BLAST pass.
#[derive(Debug, Clone)]
pub enum Library {
    /// A library file passed to blastn by path.
    File(PathBuf),
    /// Several library files concatenated into the child's stdin.
    Pooled(Vec<PathBuf>),
}

impl Library {
    /// The value of blastn's `-query` flag: a path, or `-` for stdin.
    pub fn query_arg(&self) -> String {
        match self {
            Library::File(p) => p.display().to_string(),
            Library::Pooled(_) => "-".to_string(),
        }
    }

    /// Whether the library is fed through the child's stdin.
    pub fn uses_stdin(&self) -> bool {
        matches!(self, Library::Pooled(_))
    }

    /// Writes the pooled stream to `w` (the BLAST child's stdin).
    pub fn feed<W: Write>(&self, w: &mut W) -> io::Result<()> {
        if let Library::Pooled(paths) = self {
            for p in paths {
                let mut f = File::open(p)?;
                io::copy(&mut f, w)?;
            }
        }
        Ok(())
    }
}

/// Deduplicates library paths and wraps them as search inputs: one pooled
/// stream when `pool` is set and more than one library remains, otherwise
/// one input per file.
pub fn assemble(paths: &[PathBuf], pool: bool) -> Vec<Library> {
    let mut uniq: Vec<PathBuf> = paths.to_vec();
    uniq.sort();
    uniq.dedup();
    if pool && uniq.len() > 1 {
        vec![Library::Pooled(uniq)]
    } else {
        uniq.into_iter().map(Library::File).collect()
    }
}

/// Class and sequence length of one repeat family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatInfo {
    /// First word of the repeat's FASTA description; empty when absent.
    pub class: String,
    pub length: i64,
}

/// Scans the library files for each repeat's class and length.
pub fn details(paths: &[PathBuf]) -> Result<HashMap<String, RepeatInfo>> {
    let mut details = HashMap::new();
    for path in paths {
        let reader = fasta::Reader::new(File::open(path)?);
        for record in reader.records() {
            let record = record?;
            let name = record.id().to_string();
            if details.contains_key(&name) {
                return Err(Error::DuplicateSeqId(name));
            }
            let class = record
                .desc()
                .and_then(|d| d.split_whitespace().next())
                .unwrap_or_default()
                .to_string();
            details.insert(
                name,
                RepeatInfo {
                    class,
                    length: record.seq().len() as i64,
                },
            );
        }
    }
    Ok(details)
}
