//! Parsing of blastn tabular output (`-outfmt` 6, and 7 by skipping its
//! comment lines).

use std::io::BufRead;
use std::str::FromStr;

use crate::{Error, Hit, Result};

const NUM_FIELDS: usize = 12;

/// Parses tabular hit lines into records, tagging each with the forward-pass
/// `iteration` that produced it. BLAST's one-based closed coordinates become
/// zero-based half-open on ingest, and the strand is inferred from the
/// orientation of the subject interval.
pub fn parse<R: BufRead>(r: R, iteration: i64) -> Result<Vec<Hit>> {
    let mut hits = Vec::new();
    for line in r.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != NUM_FIELDS {
            return Err(Error::ParseFormat(format!(
                "unexpected number of fields: {line:?}"
            )));
        }
        // NCBI sometimes pads numeric fields with whitespace; trim them all.
        let f = |i: usize| fields[i].trim();
        let mut hit = Hit {
            query_acc: f(0).to_string(),
            subject_acc: f(1).to_string(),
            pct_identity: field(f(2), &line)?,
            align_len: field(f(3), &line)?,
            mismatches: field(f(4), &line)?,
            gap_opens: field(f(5), &line)?,
            query_start: field(f(6), &line)?,
            query_end: field(f(7), &line)?,
            subject_start: field(f(8), &line)?,
            subject_end: field(f(9), &line)?,
            e_value: field(f(10), &line)?,
            bit_score: field(f(11), &line)?,
            iteration,
            ..Hit::default()
        };
        // Use zero-based indexing internally.
        hit.query_start -= 1;
        hit.subject_start -= 1;
        hit.strand = if hit.subject_end < hit.subject_start { -1 } else { 1 };
        if hit.query_end < hit.query_start {
            return Err(Error::ParseFormat(format!(
                "inverted query interval: {line:?}"
            )));
        }
        hits.push(hit);
    }
    Ok(hits)
}

fn field<T: FromStr>(s: &str, line: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    s.parse()
        .map_err(|e| Error::ParseFormat(format!("error in line {line:?}: {e}")))
}
