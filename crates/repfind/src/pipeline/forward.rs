//! The forward pass: iterative search of the repeat libraries against a
//! progressively self-masked copy of the fragmented genome.
//!
//! Masking already-found repeats stops the same loci from being
//! rediscovered and lets lower scoring paralogues surface in later
//! iterations, while each iteration strictly shrinks the unmasked genome,
//! guaranteeing convergence.

use std::path::{Path, PathBuf};

use log::info;

use crate::blast::{self, BlastnParams, DbInput};
use crate::fragment::{self, FragmentTable};
use crate::library::Library;
use crate::mask;
use crate::store::{key, Order, Store};
use crate::{Hit, Result};

use super::{BATCH, MAX_ITERS};

/// Runs the forward pass and returns the populated forward store.
pub fn run(
    dir: &Path,
    frags: &Path,
    libs: &[Library],
    table: &FragmentTable,
    params: &BlastnParams,
    make_flags: &[String],
) -> Result<Store> {
    let store = Store::create(dir.join("forward.db"), Order::GroupByQuery)?;
    for lib in libs {
        let working = working_copy(frags)?;
        for n in 0..MAX_ITERS {
            blast::run_make_db(DbInput::Path(&working), &working, None, make_flags)?;
            let mut hits = blast::run_blastn_tabular(params, &working, lib, n as i64)?;
            info!("blast iteration {n} found {} new matches", hits.len());
            if hits.is_empty() {
                break;
            }
            // Mask in fragment coordinates, then remap for persistence.
            mask::mask_in_place(&working, &hits, b'N')?;
            info!("remapping coordinates");
            fragment::remap(&mut hits, table)?;
            persist(&store, &hits)?;
        }
    }
    Ok(store)
}

fn working_copy(frags: &Path) -> Result<PathBuf> {
    let working = PathBuf::from(format!("{}-working", frags.display()));
    std::fs::copy(frags, &working)?;
    Ok(working)
}

fn persist(store: &Store, hits: &[Hit]) -> Result<()> {
    for chunk in hits.chunks(BATCH) {
        store.begin();
        for h in chunk {
            // The value is kept purely for correctness auditing; the key
            // carries everything downstream passes need.
            store.set(&key::marshal(h), &serde_json::to_vec(h)?)?;
        }
        store.commit()?;
    }
    Ok(())
}
