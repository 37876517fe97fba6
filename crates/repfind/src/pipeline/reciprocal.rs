//! The reciprocal pass: merged regions are excised from the original genome
//! and the repeat libraries are re-aligned against them, producing the
//! high-resolution reverse store.

use std::path::Path;

use bio::io::fasta::IndexedReader;
use log::{debug, warn};

use crate::blast::{self, xml, BlastnParams, DbInput};
use crate::fasta::write_wrapped;
use crate::library::Library;
use crate::store::key::{self, HitKey};
use crate::store::{Order, Store};
use crate::{Error, Hit, Result};

/// Drives the reciprocal searches and assigns per-hit UIDs. Constructed
/// with a seed so tests get deterministic identifiers.
pub struct Reciprocal {
    next_uid: i64,
}

impl Reciprocal {
    pub fn new(seed: i64) -> Reciprocal {
        Reciprocal { next_uid: seed }
    }

    fn next_uid(&mut self) -> i64 {
        self.next_uid += 1;
        self.next_uid
    }

    /// Walks the regions store in order, accumulating the genomic substring
    /// of each region into a FASTA buffer, and flushes the buffer through
    /// one BLAST database per (family, strand) boundary. One database
    /// amortizes construction over all regions of the family while bounding
    /// peak memory. Returns the reverse store.
    pub fn run(
        &mut self,
        regions: &Store,
        query: &Path,
        libs: &[Library],
        params: &BlastnParams,
        make_flags: &[String],
        dir: &Path,
    ) -> Result<Store> {
        let store = Store::create(dir.join("reverse.db"), Order::BySubjectPosition)?;
        let mut reader = IndexedReader::from_file(&query)
            .map_err(|e| Error::ParseFormat(format!("FASTA index for {}: {e}", query.display())))?;

        let mut iter = regions.iter()?.peekable();
        let mut buf: Vec<u8> = Vec::new();
        let mut seq: Vec<u8> = Vec::new();
        while let Some(kv) = iter.next() {
            let (k, _) = kv?;
            let region = key::unmarshal(&k)?;
            reader.fetch(
                &region.subject_acc,
                region.subject_left as u64,
                region.subject_right as u64,
            )?;
            reader.read(&mut seq)?;
            let name = format!(
                "{}_{}_{}",
                region.subject_acc, region.subject_left, region.subject_right
            );
            let desc = format!(
                "{} {} {} {:+}",
                region.subject_left, region.subject_right, region.query_acc, region.strand
            );
            write_wrapped(&mut buf, &name, Some(&desc), &seq)?;

            let boundary = match iter.peek() {
                None => true,
                // Let the error surface on the next loop turn.
                Some(Err(_)) => true,
                Some(Ok((next, _))) => match key::decode(next) {
                    Some(next) => {
                        next.query_acc != region.query_acc.as_bytes()
                            || next.strand != region.strand
                    }
                    None => true,
                },
            };
            if boundary {
                self.flush(&store, &buf, &region, libs, params, make_flags, dir)?;
                buf.clear();
            }
        }
        Ok(store)
    }

    #[allow(clippy::too_many_arguments)]
    fn flush(
        &mut self,
        store: &Store,
        fasta_text: &[u8],
        boundary: &HitKey,
        libs: &[Library],
        params: &BlastnParams,
        make_flags: &[String],
        dir: &Path,
    ) -> Result<()> {
        debug!(
            "reciprocal search for {} ({:+})",
            boundary.query_acc, boundary.strand
        );
        let working = dir.join(format!("{}-working", boundary.query_acc));
        blast::run_make_db(
            DbInput::Stdin(fasta_text),
            &working,
            Some(&boundary.query_acc),
            make_flags,
        )?;

        let mut translated = Vec::new();
        for lib in libs {
            let output = blast::run_blastn_xml(params, &working, lib)?;
            self.translate(&output, boundary, &mut translated)?;
        }

        // All HSPs of a flush land in one transaction.
        store.begin();
        for h in &translated {
            store.set(&key::marshal(h), &serde_json::to_vec(h)?)?;
        }
        store.commit()?;
        Ok(())
    }

    fn translate(
        &mut self,
        output: &xml::Output,
        boundary: &HitKey,
        out: &mut Vec<Hit>,
    ) -> Result<()> {
        for it in &output.iterations {
            if it.hits.is_empty() {
                continue;
            }
            let Some(query_id) = it.query_id.as_deref() else {
                warn!(
                    "missing query id, skipping iteration against {}",
                    boundary.subject_acc
                );
                continue;
            };
            if query_id != boundary.query_acc {
                // BLAST occasionally reports iterations for unrelated
                // family ids; their hits are dropped wholesale.
                let err = Error::UnexpectedBlastQueryId {
                    got: query_id.to_string(),
                    want: boundary.query_acc.clone(),
                };
                warn!("dropping iteration hits: {err}");
                continue;
            }

            for hit in &it.hits {
                let (subject_acc, left) = parse_region_name(&hit.def)?;
                let uid = self.next_uid();
                let sum_score: f64 = hit
                    .hsps
                    .iter()
                    .filter(|hsp| hsp_strand(hsp) == boundary.strand)
                    .map(|hsp| hsp.bit_score)
                    .sum();
                for hsp in &hit.hsps {
                    let strand = hsp_strand(hsp);
                    if strand != boundary.strand {
                        debug!(
                            "{}",
                            Error::StrandMismatch {
                                got: strand,
                                want: boundary.strand,
                            }
                        );
                        continue;
                    }
                    let pct_identity = if hsp.align_len > 0 {
                        100.0 * hsp.identity as f64 / hsp.align_len as f64
                    } else {
                        0.0
                    };
                    out.push(Hit {
                        query_acc: boundary.query_acc.clone(),
                        // Convert to zero-based indexing and remap the hit
                        // onto the original subject.
                        query_start: hsp.query_from - 1,
                        query_end: hsp.query_to,
                        subject_acc: subject_acc.clone(),
                        subject_start: hsp.hit_from - 1 + left,
                        subject_end: hsp.hit_to + left,
                        strand: boundary.strand,
                        pct_identity,
                        align_len: hsp.align_len,
                        mismatches: hsp.align_len - hsp.identity,
                        gap_opens: hsp.gaps,
                        e_value: hsp.e_value,
                        bit_score: hsp.bit_score,
                        uid,
                        sum_score,
                        ..Hit::default()
                    });
                }
            }
        }
        Ok(())
    }
}

fn hsp_strand(hsp: &xml::Hsp) -> i8 {
    let q = if hsp.query_to < hsp.query_from { -1 } else { 1 };
    let h = if hsp.hit_to < hsp.hit_from { -1 } else { 1 };
    q * h
}

/// Recovers the subject accession and left offset from a region sequence
/// definition `"<acc>_<left>_<right> <left> <right> <query_acc> <strand>"`.
fn parse_region_name(def: &str) -> Result<(String, i64)> {
    let mut tokens = def.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| Error::ParseFormat(format!("empty hit definition {def:?}")))?;
    let left: i64 = tokens
        .next()
        .ok_or_else(|| Error::ParseFormat(format!("missing left offset in {def:?}")))?
        .parse()
        .map_err(|e| Error::ParseFormat(format!("invalid left offset in {def:?}: {e}")))?;
    // The accession may itself contain underscores; strip the two
    // coordinate fields appended by the region namer.
    let mut parts = name.rsplitn(3, '_');
    let (right_part, left_part) = (parts.next(), parts.next());
    let acc = match (parts.next(), right_part, left_part) {
        (Some(acc), Some(r), Some(l))
            if r.parse::<i64>().is_ok() && l.parse::<i64>().is_ok() =>
        {
            acc
        }
        _ => {
            return Err(Error::ParseFormat(format!(
                "invalid region sequence name {name:?}"
            )))
        }
    };
    Ok((acc.to_string(), left))
}
