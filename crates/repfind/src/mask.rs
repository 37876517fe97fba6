//! N-masking of FASTA sequences over hit subject intervals.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bio::io::fasta;
use log::info;

use crate::fasta::write_wrapped;
use crate::{Hit, Result};

/// Overwrites the subject interval of every hit with `masked`, rewriting
/// `path` in place through a temporary file in the same directory.
pub fn mask_in_place(path: &Path, hits: &[Hit], masked: u8) -> Result<()> {
    info!("masking {}", path.display());
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        write_masked(path, &mut w, hits, masked)?;
        w.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Writes a masked copy of `src` to `dst`, leaving `src` untouched.
pub fn mask_copy(src: &Path, dst: &Path, hits: &[Hit], masked: u8) -> Result<()> {
    let mut w = BufWriter::new(File::create(dst)?);
    write_masked(src, &mut w, hits, masked)?;
    w.flush()?;
    Ok(())
}

fn write_masked<W: Write>(src: &Path, w: &mut W, hits: &[Hit], masked: u8) -> Result<()> {
    let mut by_subject: HashMap<&str, Vec<&Hit>> = HashMap::new();
    for h in hits {
        by_subject.entry(h.subject_acc.as_str()).or_default().push(h);
    }
    let reader = fasta::Reader::new(File::open(src)?);
    for record in reader.records() {
        let record = record?;
        let mut seq = record.seq().to_vec();
        if let Some(hs) = by_subject.get(record.id()) {
            for h in hs {
                // Minus-strand matches report an inverted subject interval.
                let left = (h.subject_left().max(0) as usize).min(seq.len());
                let right = (h.subject_right().max(0) as usize).min(seq.len());
                for b in &mut seq[left..right] {
                    *b = masked;
                }
            }
        }
        write_wrapped(w, record.id(), record.desc(), &seq)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(subject_acc: &str, start: i64, end: i64) -> Hit {
        Hit {
            subject_acc: subject_acc.to_string(),
            subject_start: start,
            subject_end: end,
            strand: if end < start { -1 } else { 1 },
            ..Hit::default()
        }
    }

    #[test]
    fn masks_hit_intervals_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.fasta");
        std::fs::write(&path, ">chr1\nACGTACGTAC\n>chr2\nTTTTTTTTTT\n").unwrap();

        mask_in_place(&path, &[hit("chr1", 2, 6)], b'N').unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, ">chr1\nACNNNNGTAC\n>chr2\nTTTTTTTTTT\n");
    }

    #[test]
    fn minus_strand_interval_is_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.fasta");
        std::fs::write(&path, ">chr1\nACGTACGTAC\n").unwrap();

        mask_in_place(&path, &[hit("chr1", 6, 2)], b'N').unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, ">chr1\nACNNNNGTAC\n");
    }

    #[test]
    fn copy_without_hits_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("genome.fasta");
        let dst = dir.path().join("genome-masked.fasta");
        std::fs::write(&src, ">chr1 description\nACGTACGTAC\n").unwrap();

        mask_copy(&src, &dst, &[], b'N').unwrap();
        assert_eq!(
            std::fs::read_to_string(&src).unwrap(),
            std::fs::read_to_string(&dst).unwrap()
        );
    }

    #[test]
    fn out_of_range_intervals_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.fasta");
        std::fs::write(&path, ">chr1\nACGTACGTAC\n").unwrap();

        mask_in_place(&path, &[hit("chr1", 8, 20)], b'N').unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, ">chr1\nACGTACGTNN\n");
    }
}
