use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::Result;
use clap::ValueEnum;
use log::info;

use repfind::blast::{self, SearchMode};
use repfind::pipeline::{self, Resume, RunConfig};
use repfind::store::Store;
use repfind::{library, mask, report, Hit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Sensitive,
    Normal,
    Rough,
    /// No preset BLAST parameters; supply them via the pass-through flags
    User,
}

impl From<Mode> for SearchMode {
    fn from(mode: Mode) -> SearchMode {
        match mode {
            Mode::Sensitive => SearchMode::Sensitive,
            Mode::Normal => SearchMode::Normal,
            Mode::Rough => SearchMode::Rough,
            Mode::User => SearchMode::User,
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    /// Query genome FASTA file
    #[arg(short, long)]
    pub query: PathBuf,
    /// Repeat library FASTA file (may be given more than once)
    #[arg(short, long = "lib", required = true)]
    pub libs: Vec<PathBuf>,
    /// Search mode
    #[arg(long, value_enum, default_value_t = Mode::Normal)]
    pub mode: Mode,
    /// Emit newline-delimited JSON instead of GTF
    #[arg(long)]
    pub json: bool,
    /// Discard lower scoring nested features
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub cull: bool,
    /// Pool all libraries into a single search
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub pool: bool,
    /// Maximum number of cores for BLAST searches (0 = all cores)
    #[arg(long, default_value_t = 0)]
    pub cores: usize,
    /// Keep temporary files
    #[arg(long)]
    pub work: bool,
    /// Resume from an existing {forward,regions,reverse}.db store
    #[arg(long)]
    pub recover: Option<PathBuf>,
    /// Flags passed through to makeblastdb
    #[arg(long, value_name = "FLAGS")]
    pub makeblastdb_flags: Option<String>,
    /// Flags passed through to blastn
    #[arg(long, value_name = "FLAGS")]
    pub blastn_flags: Option<String>,
}

pub fn run(args: SearchArgs) -> Result<()> {
    let make_flags = split_flags(args.makeblastdb_flags.as_deref());
    let blast_flags = split_flags(args.blastn_flags.as_deref());
    // Bad arguments exit 2, matching clap's own parse failures.
    if let Err(err) = blast::check_flags(&blast_flags, blast::RESERVED_BLASTN)
        .and_then(|_| blast::check_flags(&make_flags, blast::RESERVED_MAKEDB))
        .and_then(|_| Resume::from_path(args.recover.as_deref()).map(|_| ()))
    {
        eprintln!("repfind: {err}");
        exit(2);
    }

    let tmp = tempfile::Builder::new().prefix("repfind-").tempdir()?;
    info!("working in {}", tmp.path().display());

    let mut cfg = RunConfig::new(
        args.query.clone(),
        args.libs.clone(),
        tmp.path().to_path_buf(),
    );
    cfg.mode = args.mode.into();
    cfg.pool = args.pool;
    cfg.cull = args.cull;
    cfg.keep_work = args.work;
    cfg.threads = args.cores;
    cfg.make_flags = make_flags;
    cfg.blast_flags = blast_flags;
    cfg.recover = args.recover.clone();

    let reverse = pipeline::run(&cfg)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.json {
        report::write_json(&reverse, &mut out)?;
    } else {
        let details = library::details(&args.libs)?;
        report::write_gtf(&reverse, &details, &mut out)?;
    }
    out.flush()?;

    let hits = collect_hits(&reverse)?;
    let masked = masked_name(&args.query);
    mask::mask_copy(&args.query, &masked, &hits, b'N')?;
    info!("masked sequence in {}", masked.display());
    drop(reverse);

    if args.work {
        let kept = tmp.keep();
        info!("keeping work in {}", kept.display());
    }
    Ok(())
}

fn collect_hits(store: &Store) -> Result<Vec<Hit>> {
    let mut hits = Vec::new();
    for kv in store.iter()? {
        let (_, v) = kv?;
        hits.push(serde_json::from_slice(&v)?);
    }
    Ok(hits)
}

/// The masked copy sits in the working directory of the invocation, named
/// after the query file.
fn masked_name(query: &Path) -> PathBuf {
    let base = query
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "query".to_string());
    PathBuf::from(format!("{base}-masked.fasta"))
}

fn split_flags(flags: Option<&str>) -> Vec<String> {
    flags
        .map(|f| f.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}
