//! Containment culling over the reverse store.

use log::info;

use crate::store::{key, Store};
use crate::{Error, Hit, Result};

/// Deletes every record whose subject span is fully contained within a
/// strictly higher-scoring record on the same subject and strand, comparing
/// `(bit_score, sum_score)` lexicographically. Equal-score equal-span
/// records are retained. Returns the number of deleted records.
///
/// The by-subject-position order makes the walk linear: every candidate
/// after an outer record has `subject_left >= outer.subject_left`, and the
/// walk stops once `subject_left` passes the outer right edge. Deletions
/// are collected per outer record and applied in one batch; iterators
/// observe the store as of their creation, so an open walk is undisturbed.
pub fn cull(store: &Store) -> Result<u64> {
    info!("culling contained hits");
    let mut deleted: u64 = 0;
    for kv in store.iter()? {
        let (k, v) = kv?;
        // A previous batch may have removed this record already.
        if store.get(&k)?.is_none() {
            continue;
        }
        let outer = key::unmarshal(&k)?;
        let outer_rec: Hit =
            serde_json::from_slice(&v).map_err(|e| Error::StoreCorruption(e.to_string()))?;

        let (candidates, exact) = store.seek(&k)?;
        if !exact {
            return Err(Error::StoreCorruption(format!(
                "reverse store lost {}:{}-{}",
                outer.subject_acc, outer.subject_left, outer.subject_right
            )));
        }
        let mut doomed: Vec<Vec<u8>> = Vec::new();
        // The first candidate is the outer record itself.
        for ckv in candidates.skip(1) {
            let (ck, cv) = ckv?;
            let cand = key::unmarshal(&ck)?;
            if cand.strand != outer.strand || cand.subject_acc != outer.subject_acc {
                break;
            }
            if cand.subject_left >= outer.subject_right {
                // No later candidate can be contained.
                break;
            }
            if cand.subject_right > outer.subject_right {
                continue;
            }
            let cand_rec: Hit =
                serde_json::from_slice(&cv).map_err(|e| Error::StoreCorruption(e.to_string()))?;
            if (cand.bit_score, cand_rec.sum_score) < (outer.bit_score, outer_rec.sum_score) {
                doomed.push(ck);
            }
        }
        if !doomed.is_empty() {
            store.begin();
            for ck in &doomed {
                store.delete(ck)?;
            }
            store.commit()?;
            deleted += doomed.len() as u64;
        }
    }
    Ok(deleted)
}
