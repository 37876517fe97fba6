//! FASTA helpers: the `.fai` sidecar builder used for random access in the
//! reciprocal pass, and wrapped sequence writing.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Line width of emitted FASTA bodies.
pub const LINE_WIDTH: usize = 60;

/// Writes one FASTA record with the body wrapped at [`LINE_WIDTH`] columns.
pub fn write_wrapped<W: Write>(w: &mut W, id: &str, desc: Option<&str>, seq: &[u8]) -> std::io::Result<()> {
    match desc {
        Some(d) if !d.is_empty() => writeln!(w, ">{id} {d}")?,
        _ => writeln!(w, ">{id}")?,
    }
    for chunk in seq.chunks(LINE_WIDTH) {
        w.write_all(chunk)?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

/// Ensures `<path>.fai` exists, building it from the FASTA when absent, and
/// returns the index path. Fails with `ParseFormat` when the FASTA's line
/// lengths are not uniform within a record.
pub fn ensure_fai(path: &Path) -> Result<PathBuf> {
    let fai = PathBuf::from(format!("{}.fai", path.display()));
    if fai.exists() {
        return Ok(fai);
    }
    let index = build_fai(File::open(path)?)?;
    std::fs::write(&fai, index)?;
    Ok(fai)
}

struct FaiRecord {
    name: String,
    length: u64,
    offset: u64,
    line_bases: u64,
    line_width: u64,
}

fn build_fai<R: Read>(r: R) -> Result<String> {
    let mut reader = BufReader::new(r);
    let mut records: Vec<FaiRecord> = Vec::new();
    let mut current: Option<FaiRecord> = None;
    // Length of the previous body line; a line shorter than line_bases must
    // be the record's last.
    let mut prev_short = false;

    let mut offset = 0u64;
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        let raw_len = n as u64;
        let mut content: &[u8] = &line;
        if content.ends_with(b"\n") {
            content = &content[..content.len() - 1];
        }
        if content.ends_with(b"\r") {
            content = &content[..content.len() - 1];
        }

        if content.first() == Some(&b'>') {
            if let Some(rec) = current.take() {
                records.push(rec);
            }
            let name = content[1..]
                .split(|b| b.is_ascii_whitespace())
                .next()
                .unwrap_or_default();
            let name = String::from_utf8(name.to_vec())
                .map_err(|e| Error::ParseFormat(format!("sequence name: {e}")))?;
            if name.is_empty() {
                return Err(Error::ParseFormat("empty sequence name".into()));
            }
            if records.iter().any(|r| r.name == name) {
                return Err(Error::DuplicateSeqId(name));
            }
            current = Some(FaiRecord {
                name,
                length: 0,
                offset: offset + raw_len,
                line_bases: 0,
                line_width: 0,
            });
            prev_short = false;
        } else if !content.is_empty() {
            let rec = current
                .as_mut()
                .ok_or_else(|| Error::ParseFormat("sequence data before first header".into()))?;
            if prev_short {
                return Err(Error::ParseFormat(format!(
                    "non-uniform line length in sequence {:?}",
                    rec.name
                )));
            }
            let bases = content.len() as u64;
            if rec.line_bases == 0 {
                rec.line_bases = bases;
                rec.line_width = raw_len;
            } else if bases != rec.line_bases {
                if bases > rec.line_bases {
                    return Err(Error::ParseFormat(format!(
                        "non-uniform line length in sequence {:?}",
                        rec.name
                    )));
                }
                prev_short = true;
            }
            rec.length += bases;
        } else {
            // A blank line ends the record body.
            prev_short = current.is_some();
        }
        offset += raw_len;
    }
    if let Some(rec) = current.take() {
        records.push(rec);
    }

    let mut out = String::new();
    for r in &records {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            r.name, r.length, r.offset, r.line_bases, r.line_width
        ));
    }
    Ok(out)
}
