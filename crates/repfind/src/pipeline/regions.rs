//! Merging of proximal forward hits into candidate regions.

use std::path::Path;

use log::info;

use crate::store::key::{self, HitKey};
use crate::store::{Order, Store};
use crate::{Error, Result};

use super::BATCH;

/// Streams the forward store and collapses runs of hits that share query,
/// subject and strand and sit within `near` bases of each other into single
/// regions. Region keys carry the merged subject span with zeroed query
/// coordinates and score; values are the big-endian count of member hits.
///
/// Fails with [`Error::Empty`] when the forward store holds no records.
pub fn merge(hits: &Store, near: i64, dir: &Path) -> Result<Store> {
    info!("merging regions");
    let regions = Store::create(dir.join("regions.db"), Order::GroupByQuery)?;

    let mut iter = hits.iter()?;
    let first = match iter.next() {
        Some(kv) => kv?,
        None => return Err(Error::Empty(hits.path().to_path_buf())),
    };
    let mut last = key::unmarshal(&first.0)?;
    let mut n: u64 = 1;

    let mut emitted = 0usize;
    let mut in_tx = false;
    for kv in iter {
        let (k, _) = kv?;
        let r = key::unmarshal(&k)?;
        if r.strand == last.strand
            && r.subject_acc == last.subject_acc
            && r.query_acc == last.query_acc
            && r.subject_left - last.subject_right <= near
        {
            // The region keeps the earlier record's canonical left edge.
            if r.subject_right > last.subject_right {
                last.subject_right = r.subject_right;
            }
            n += 1;
            continue;
        }

        if !in_tx {
            regions.begin();
            in_tx = true;
        }
        regions.set(&region_key(&last), &key::marshal_count(n))?;
        emitted += 1;
        last = r;
        n = 1;
        if emitted % BATCH == 0 {
            regions.commit()?;
            in_tx = false;
        }
    }
    if in_tx {
        regions.commit()?;
    }

    // Idempotent final write: the accumulated region may already be the
    // store's last entry.
    let tail = region_key(&last);
    let already_written = matches!(regions.last()?, Some((k, _)) if k == tail);
    if !already_written {
        regions.begin();
        regions.set(&tail, &key::marshal_count(n))?;
        regions.commit()?;
    }

    Ok(regions)
}

fn region_key(k: &HitKey) -> Vec<u8> {
    HitKey {
        subject_acc: k.subject_acc.clone(),
        subject_left: k.subject_left,
        subject_right: k.subject_right,
        query_acc: k.query_acc.clone(),
        query_start: 0,
        query_end: 0,
        bit_score: 0.0,
        strand: k.strand,
    }
    .marshal()
}
