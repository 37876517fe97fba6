//! Pass orchestration: forward search, region merge, reciprocal search,
//! containment culling, and checkpoint-based resumption.

pub mod cull;
pub mod forward;
pub mod reciprocal;
pub mod regions;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::blast::{self, SearchMode};
use crate::fragment;
use crate::library::{self, Library};
use crate::store::{Order, Store};
use crate::{fasta, Error, Result};

/// Maximum number of forward BLAST iterations per library.
pub const MAX_ITERS: usize = 100;
/// Gap in bases under which same-family same-strand hits merge into one
/// region.
pub const NEAR: i64 = 30;
/// Records per store transaction.
pub const BATCH: usize = 100;

/// Resume point selected by the recovery store's basename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    None,
    Forward,
    Regions,
    Reverse,
}

impl Resume {
    /// Maps a recovery store path onto the passes that can be skipped.
    pub fn from_path(path: Option<&Path>) -> Result<Resume> {
        let Some(path) = path else {
            return Ok(Resume::None);
        };
        match path.file_name().and_then(|n| n.to_str()) {
            Some("forward.db") => Ok(Resume::Forward),
            Some("regions.db") => Ok(Resume::Regions),
            Some("reverse.db") => Ok(Resume::Reverse),
            _ => Err(Error::ParseFormat(format!(
                "unrecognized recovery store {} (want forward.db, regions.db or reverse.db)",
                path.display()
            ))),
        }
    }
}

/// Everything the pipeline needs for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub query: PathBuf,
    pub libs: Vec<PathBuf>,
    pub mode: SearchMode,
    /// Concatenate multiple libraries into one search stream.
    pub pool: bool,
    /// Discard lower scoring contained features.
    pub cull: bool,
    /// Copy the reverse store aside before culling so both states survive.
    pub keep_work: bool,
    /// Operator core ceiling for BLAST; zero uses all cores.
    pub threads: usize,
    /// Pass-through flags for makeblastdb.
    pub make_flags: Vec<String>,
    /// Pass-through flags for blastn.
    pub blast_flags: Vec<String>,
    /// Store to resume from, skipping the passes upstream of it.
    pub recover: Option<PathBuf>,
    /// Directory holding the stores and working files.
    pub work_dir: PathBuf,
    pub goal_len: usize,
    pub max_len: usize,
}

impl RunConfig {
    pub fn new(query: PathBuf, libs: Vec<PathBuf>, work_dir: PathBuf) -> RunConfig {
        RunConfig {
            query,
            libs,
            mode: SearchMode::Normal,
            pool: true,
            cull: true,
            keep_work: false,
            threads: 0,
            make_flags: Vec::new(),
            blast_flags: Vec::new(),
            recover: None,
            work_dir,
            goal_len: fragment::DEFAULT_GOAL_LEN,
            max_len: fragment::DEFAULT_MAX_LEN,
        }
    }
}

/// Runs the pipeline and returns the reverse store in subject-position
/// order, culled unless disabled.
pub fn run(cfg: &RunConfig) -> Result<Store> {
    blast::check_flags(&cfg.blast_flags, blast::RESERVED_BLASTN)?;
    blast::check_flags(&cfg.make_flags, blast::RESERVED_MAKEDB)?;
    let threads = blast::thread_count(cfg.threads);
    let libs = library::assemble(&cfg.libs, cfg.pool);

    let reverse = match (Resume::from_path(cfg.recover.as_deref())?, cfg.recover.as_deref()) {
        (Resume::Reverse, Some(path)) => {
            info!("recovering reverse store from {}", path.display());
            Store::open(path, Order::BySubjectPosition)?
        }
        (Resume::Regions, Some(path)) => {
            info!("recovering regions store from {}", path.display());
            let regions = Store::open(path, Order::GroupByQuery)?;
            run_reciprocal(&regions, cfg, &libs, threads)?
        }
        (Resume::Forward, Some(path)) => {
            info!("recovering forward store from {}", path.display());
            let forward = Store::open(path, Order::GroupByQuery)?;
            merge_and_realign(&forward, cfg, &libs, threads)?
        }
        _ => {
            info!("splitting query");
            let frags_path = cfg.work_dir.join("fragments.fasta");
            let table = {
                let src = File::open(&cfg.query)?;
                let mut dst = BufWriter::new(File::create(&frags_path)?);
                let table = fragment::split(&mut dst, src, cfg.goal_len, cfg.max_len)?;
                dst.flush()?;
                table
            };
            let mut params = cfg.mode.forward(threads);
            params.extra = cfg.blast_flags.clone();
            let forward = forward::run(
                &cfg.work_dir,
                &frags_path,
                &libs,
                &table,
                &params,
                &cfg.make_flags,
            )?;
            merge_and_realign(&forward, cfg, &libs, threads)?
        }
    };

    if !cfg.cull {
        return Ok(reverse);
    }
    let reverse = if cfg.keep_work {
        // Keep the unculled state around for debugging: close, byte-copy,
        // reopen and cull in place.
        let path = reverse.path().to_path_buf();
        reverse.close()?;
        let backup = path.with_file_name("reverse-unculled.db");
        copy_dir(&path, &backup)?;
        info!("unculled reverse store copied to {}", backup.display());
        Store::open(&path, Order::BySubjectPosition)?
    } else {
        reverse
    };
    let removed = cull::cull(&reverse)?;
    info!("culled {removed} contained hits");
    Ok(reverse)
}

fn merge_and_realign(
    forward: &Store,
    cfg: &RunConfig,
    libs: &[Library],
    threads: usize,
) -> Result<Store> {
    match regions::merge(forward, NEAR, &cfg.work_dir) {
        Ok(regions) => run_reciprocal(&regions, cfg, libs, threads),
        Err(Error::Empty(_)) => {
            info!("no forward hits; skipping reciprocal search");
            Store::create(cfg.work_dir.join("reverse.db"), Order::BySubjectPosition)
        }
        Err(err) => Err(err),
    }
}

fn run_reciprocal(
    regions: &Store,
    cfg: &RunConfig,
    libs: &[Library],
    threads: usize,
) -> Result<Store> {
    fasta::ensure_fai(&cfg.query)?;
    let mut params = cfg.mode.reciprocal(threads);
    params.extra = cfg.blast_flags.clone();
    let mut driver = reciprocal::Reciprocal::new(0);
    driver.run(
        regions,
        &cfg.query,
        libs,
        &params,
        &cfg.make_flags,
        &cfg.work_dir,
    )
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_point_follows_store_basename() {
        assert_eq!(Resume::from_path(None).unwrap(), Resume::None);
        assert_eq!(
            Resume::from_path(Some(Path::new("/tmp/x/forward.db"))).unwrap(),
            Resume::Forward
        );
        assert_eq!(
            Resume::from_path(Some(Path::new("regions.db"))).unwrap(),
            Resume::Regions
        );
        assert_eq!(
            Resume::from_path(Some(Path::new("work/reverse.db"))).unwrap(),
            Resume::Reverse
        );
        assert!(Resume::from_path(Some(Path::new("work/other.db"))).is_err());
    }
}
