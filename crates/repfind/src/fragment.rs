//! Genome fragmentation for the forward pass, and remapping of hit
//! coordinates back onto the original sequences.

use std::collections::HashMap;
use std::io::{Read, Write};

use bio::io::fasta;

use crate::fasta::write_wrapped;
use crate::{Error, Hit, Result};

/// Preferred fragment length.
pub const DEFAULT_GOAL_LEN: usize = 100_000;
/// Longest fragment emitted; the final fragment of a sequence may be up to
/// this long so that no undersized tail fragment is produced.
pub const DEFAULT_MAX_LEN: usize = 150_000;

/// Origin of one emitted fragment within its parent sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub parent: String,
    pub start: i64,
    pub end: i64,
}

/// Look-up from generated fragment id to parent coordinates.
pub type FragmentTable = HashMap<String, Fragment>;

/// Splits the FASTA sequences read from `src` into fragments no longer than
/// `max`, cutting at `goal` while more than `max` bases remain. Fragments
/// are renamed `<id>_<i>` and their description is rewritten to
/// `<id> <start> <end> <original description>`. Returns the fragment table
/// for [`remap`].
pub fn split<R: Read, W: Write>(mut dst: W, src: R, goal: usize, max: usize) -> Result<FragmentTable> {
    if max <= goal {
        return Err(Error::ParseFormat(format!(
            "fragment max {max} must exceed goal {goal}"
        )));
    }
    let mut table = FragmentTable::new();
    let reader = fasta::Reader::new(src);
    // The counter advances per split fragment and is shared by all input
    // sequences, so re-used input identifiers produce colliding fragment ids.
    let mut i: u64 = 1;
    for record in reader.records() {
        let record = record?;
        let id = record.id().to_string();
        let desc = record.desc().map(str::to_string);
        let mut rest = record.seq();
        let mut pos = 0usize;
        while rest.len() > max {
            let n = rest.len().min(goal);
            emit(&mut dst, &mut table, &id, desc.as_deref(), &rest[..n], pos, i)?;
            rest = &rest[n..];
            pos += n;
            i += 1;
        }
        emit(&mut dst, &mut table, &id, desc.as_deref(), rest, pos, i)?;
    }
    Ok(table)
}

fn emit<W: Write>(
    dst: &mut W,
    table: &mut FragmentTable,
    parent: &str,
    desc: Option<&str>,
    seq: &[u8],
    pos: usize,
    i: u64,
) -> Result<()> {
    let frag_id = format!("{parent}_{i}");
    if table.contains_key(&frag_id) {
        return Err(Error::DuplicateSeqId(parent.to_string()));
    }
    let end = pos + seq.len();
    let frag_desc = match desc {
        Some(d) => format!("{parent} {pos} {end} {d}"),
        None => format!("{parent} {pos} {end}"),
    };
    table.insert(
        frag_id.clone(),
        Fragment {
            parent: parent.to_string(),
            start: pos as i64,
            end: end as i64,
        },
    );
    write_wrapped(dst, &frag_id, Some(&frag_desc), seq)?;
    Ok(())
}

/// Rewrites hits whose subject names fragments onto the parent sequences.
/// A subject accession absent from the table is a pipeline bug and fatal.
pub fn remap(hits: &mut [Hit], table: &FragmentTable) -> Result<()> {
    for hit in hits.iter_mut() {
        let frag = table
            .get(&hit.subject_acc)
            .ok_or_else(|| Error::UnknownFragment(hit.subject_acc.clone()))?;
        hit.subject_acc = frag.parent.clone();
        hit.subject_start += frag.start;
        hit.subject_end += frag.start;
    }
    Ok(())
}
