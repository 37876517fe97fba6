//! Invocation of the NCBI BLAST+ executables.
//!
//! The pipeline shells out to `makeblastdb` and `blastn`; this module builds
//! their command lines, feeds pooled libraries over stdin, drains child
//! stdout into the parsers and pumps stderr to the logger. A failing child
//! is fatal (`Error::ExternalCommand`); there is no retry.

pub mod tabular;
pub mod xml;

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{ChildStdout, Command, Stdio};
use std::thread;

use log::debug;

use crate::library::Library;
use crate::{Error, Hit, Result};

/// blastn `-outfmt` for the forward (tabular) pass.
pub const TAB_FORMAT: u32 = 6;
/// blastn `-outfmt` for the reciprocal (XML) pass.
pub const XML_FORMAT: u32 = 5;

/// Flags the driver always sets on blastn itself.
pub const RESERVED_BLASTN: &[&str] = &["-db", "-query", "-outfmt"];
/// Flags the driver always sets on makeblastdb itself.
pub const RESERVED_MAKEDB: &[&str] = &["-in", "-out", "-dbtype"];

/// Rejects operator pass-through flags that would duplicate driver-owned
/// ones.
pub fn check_flags(flags: &[String], reserved: &[&str]) -> Result<()> {
    for f in flags {
        if reserved.contains(&f.as_str()) {
            return Err(Error::ParseFormat(format!(
                "flag {f} is set by the driver and cannot be passed through"
            )));
        }
    }
    Ok(())
}

/// Resolves the blastn thread count from the operator ceiling: the ceiling
/// capped at the core count, or all cores when the ceiling is zero.
pub fn thread_count(ceiling: usize) -> usize {
    let all = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    if ceiling > 0 {
        ceiling.min(all)
    } else {
        all
    }
}

/// First-pass search presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Sensitive,
    Normal,
    Rough,
    /// No parameters are pre-set; the operator supplies every BLAST flag.
    User,
}

impl SearchMode {
    /// The forward-pass parameter bundle.
    pub fn forward(self, threads: usize) -> BlastnParams {
        match self {
            SearchMode::Sensitive => preset(3e-5, 9, threads),
            SearchMode::Normal => preset(2e-5, 10, threads),
            SearchMode::Rough => preset(1e-5, 11, threads),
            SearchMode::User => BlastnParams {
                out_format: TAB_FORMAT,
                ..BlastnParams::default()
            },
        }
    }

    /// The reciprocal-pass parameter bundle: identical across the preset
    /// modes, with DUST and soft masking enabled and XML output.
    pub fn reciprocal(self, threads: usize) -> BlastnParams {
        match self {
            SearchMode::User => BlastnParams {
                out_format: XML_FORMAT,
                ..BlastnParams::default()
            },
            _ => BlastnParams {
                xdrop_gap: 150,
                dust: Some(Dust::yes()),
                soft_masking: Some(true),
                out_format: XML_FORMAT,
                ..preset(1e-5, 11, threads)
            },
        }
    }
}

fn preset(e_value: f64, word_size: u32, threads: usize) -> BlastnParams {
    BlastnParams {
        e_value,
        word_size,
        reward: 3,
        penalty: -4,
        gap_open: 30,
        gap_extend: 6,
        xdrop_ungap: 80,
        xdrop_gap: 130,
        xdrop_gap_final: 150,
        num_alignments: 10_000_000,
        search_space: 1_000_000,
        parse_deflines: true,
        threads,
        out_format: TAB_FORMAT,
        ..BlastnParams::default()
    }
}

/// DUST low-complexity filter settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dust {
    pub filter: bool,
    pub level: u32,
    pub window: u32,
    pub linker: u32,
}

impl Dust {
    /// DUST with its built-in defaults.
    pub fn yes() -> Dust {
        Dust {
            filter: true,
            ..Dust::default()
        }
    }

    fn arg(&self) -> String {
        if !self.filter {
            "no".to_string()
        } else if self.level == 0 && self.window == 0 && self.linker == 0 {
            "yes".to_string()
        } else {
            format!("{} {} {}", self.level, self.window, self.linker)
        }
    }
}

/// blastn parameters. Zero-valued fields are omitted from the command line,
/// so the user-mode bundle adds nothing beyond `-db`, `-query` and
/// `-outfmt`.
#[derive(Debug, Clone, Default)]
pub struct BlastnParams {
    pub e_value: f64,
    pub word_size: u32,
    pub dust: Option<Dust>,
    pub soft_masking: Option<bool>,
    pub reward: i32,
    pub penalty: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
    pub xdrop_ungap: i32,
    pub xdrop_gap: i32,
    pub xdrop_gap_final: i32,
    pub num_alignments: u64,
    pub search_space: u64,
    pub parse_deflines: bool,
    pub threads: usize,
    pub out_format: u32,
    /// Operator flags appended verbatim.
    pub extra: Vec<String>,
}

impl BlastnParams {
    /// Builds the blastn command line against database `db` for the library
    /// named by `query` (`-` reads the library from stdin).
    pub fn command(&self, db: &Path, query: &str) -> Command {
        let mut cmd = Command::new("blastn");
        cmd.arg("-db").arg(db);
        cmd.arg("-query").arg(query);
        cmd.arg("-outfmt").arg(self.out_format.to_string());
        if self.e_value > 0.0 {
            cmd.arg("-evalue").arg(self.e_value.to_string());
        }
        if self.word_size > 0 {
            cmd.arg("-word_size").arg(self.word_size.to_string());
        }
        if let Some(dust) = &self.dust {
            cmd.arg("-dust").arg(dust.arg());
        }
        if let Some(soft) = self.soft_masking {
            cmd.arg("-soft_masking").arg(soft.to_string());
        }
        if self.reward != 0 {
            cmd.arg("-reward").arg(self.reward.to_string());
        }
        if self.penalty != 0 {
            cmd.arg("-penalty").arg(self.penalty.to_string());
        }
        if self.xdrop_ungap > 0 {
            cmd.arg("-xdrop_ungap").arg(self.xdrop_ungap.to_string());
        }
        if self.xdrop_gap > 0 {
            cmd.arg("-xdrop_gap").arg(self.xdrop_gap.to_string());
        }
        if self.xdrop_gap_final > 0 {
            cmd.arg("-xdrop_gap_final").arg(self.xdrop_gap_final.to_string());
        }
        if self.gap_open != 0 {
            cmd.arg("-gapopen").arg(self.gap_open.to_string());
        }
        if self.gap_extend != 0 {
            cmd.arg("-gapextend").arg(self.gap_extend.to_string());
        }
        if self.num_alignments > 0 {
            cmd.arg("-num_alignments").arg(self.num_alignments.to_string());
        }
        if self.search_space > 0 {
            cmd.arg("-searchsp").arg(self.search_space.to_string());
        }
        if self.parse_deflines {
            cmd.arg("-parse_deflines");
        }
        if self.threads > 0 {
            cmd.arg("-num_threads").arg(self.threads.to_string());
        }
        cmd.args(&self.extra);
        cmd
    }
}

/// Input source for makeblastdb.
pub enum DbInput<'a> {
    Path(&'a Path),
    /// FASTA text piped over stdin.
    Stdin(&'a [u8]),
}

/// Builds a nucleotide BLAST database at `out`.
pub fn run_make_db(input: DbInput<'_>, out: &Path, title: Option<&str>, extra: &[String]) -> Result<()> {
    let mut cmd = Command::new("makeblastdb");
    cmd.arg("-dbtype").arg("nucl");
    match &input {
        DbInput::Path(p) => cmd.arg("-in").arg(p),
        DbInput::Stdin(_) => cmd.arg("-in").arg("-"),
    };
    cmd.arg("-out").arg(out);
    if let Some(title) = title {
        cmd.arg("-title").arg(title);
    }
    cmd.args(extra);
    debug!("{cmd:?}");

    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(match input {
        DbInput::Stdin(_) => Stdio::piped(),
        DbInput::Path(_) => Stdio::null(),
    });
    let mut child = cmd.spawn()?;
    let out_pump = pump_to_log("makeblastdb", child.stdout.take());
    let err_pump = pump_to_log("makeblastdb", child.stderr.take());
    if let DbInput::Stdin(bytes) = input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(bytes)?;
        }
    }
    let status = child.wait()?;
    join_pump(out_pump);
    join_pump(err_pump);
    if !status.success() {
        return Err(Error::ExternalCommand {
            program: "makeblastdb".to_string(),
            status,
        });
    }
    Ok(())
}

/// Runs a forward-pass blastn search and parses its tabular output, tagging
/// hits with `iteration`.
pub fn run_blastn_tabular(params: &BlastnParams, db: &Path, lib: &Library, iteration: i64) -> Result<Vec<Hit>> {
    run_blastn(params, db, lib, |stdout| {
        tabular::parse(BufReader::new(stdout), iteration)
    })
}

/// Runs a reciprocal blastn search and decodes its XML output.
pub fn run_blastn_xml(params: &BlastnParams, db: &Path, lib: &Library) -> Result<xml::Output> {
    run_blastn(params, db, lib, |stdout| {
        let mut text = String::new();
        BufReader::new(stdout).read_to_string(&mut text)?;
        xml::parse(&text)
    })
}

fn run_blastn<T>(
    params: &BlastnParams,
    db: &Path,
    lib: &Library,
    parse: impl FnOnce(ChildStdout) -> Result<T>,
) -> Result<T> {
    let mut cmd = params.command(db, &lib.query_arg());
    debug!("{cmd:?}");
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if lib.uses_stdin() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    let mut child = cmd.spawn()?;
    let err_pump = pump_to_log("blastn", child.stderr.take());

    // Pooled libraries are written from their own thread so that the output
    // pipe drains concurrently.
    let feeder = if lib.uses_stdin() {
        child.stdin.take().map(|mut stdin| {
            let lib = lib.clone();
            thread::spawn(move || lib.feed(&mut stdin))
        })
    } else {
        None
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Io(io::Error::other("blastn stdout unavailable")))?;
    let parsed = parse(stdout);

    let status = child.wait()?;
    join_pump(err_pump);
    let fed = feeder.map(|h| h.join());
    if !status.success() {
        return Err(Error::ExternalCommand {
            program: "blastn".to_string(),
            status,
        });
    }
    if let Some(Ok(Err(err))) = fed {
        if parsed.is_ok() {
            return Err(err.into());
        }
    }
    parsed
}

fn pump_to_log<R: Read + Send + 'static>(tag: &'static str, r: Option<R>) -> Option<thread::JoinHandle<()>> {
    let r = r?;
    Some(thread::spawn(move || {
        for line in BufReader::new(r).lines().map_while(|l| l.ok()) {
            if line.trim().is_empty() {
                continue;
            }
            debug!("{tag}: {line}");
        }
    }))
}

fn join_pump(handle: Option<thread::JoinHandle<()>>) {
    if let Some(handle) = handle {
        let _ = handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(OsStr::to_string_lossy)
            .map(String::from)
            .collect()
    }

    fn flag_value(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    }

    #[test]
    fn normal_mode_sets_the_full_parameter_bundle() {
        let params = SearchMode::Normal.forward(4);
        let cmd = params.command(Path::new("work/genome"), "lib.fa");
        let args = args_of(&cmd);
        assert_eq!(flag_value(&args, "-db"), Some("work/genome".to_string()));
        assert_eq!(flag_value(&args, "-query"), Some("lib.fa".to_string()));
        assert_eq!(flag_value(&args, "-outfmt"), Some("6".to_string()));
        assert_eq!(flag_value(&args, "-evalue"), Some("0.00002".to_string()));
        assert_eq!(flag_value(&args, "-word_size"), Some("10".to_string()));
        assert_eq!(flag_value(&args, "-reward"), Some("3".to_string()));
        assert_eq!(flag_value(&args, "-penalty"), Some("-4".to_string()));
        assert_eq!(flag_value(&args, "-gapopen"), Some("30".to_string()));
        assert_eq!(flag_value(&args, "-gapextend"), Some("6".to_string()));
        assert_eq!(flag_value(&args, "-xdrop_gap"), Some("130".to_string()));
        assert_eq!(flag_value(&args, "-num_alignments"), Some("10000000".to_string()));
        assert_eq!(flag_value(&args, "-searchsp"), Some("1000000".to_string()));
        assert_eq!(flag_value(&args, "-num_threads"), Some("4".to_string()));
        assert!(args.contains(&"-parse_deflines".to_string()));
        assert!(!args.contains(&"-dust".to_string()));
    }

    #[test]
    fn reciprocal_mode_enables_dust_and_soft_masking() {
        let params = SearchMode::Normal.reciprocal(1);
        let cmd = params.command(Path::new("db"), "-");
        let args = args_of(&cmd);
        assert_eq!(flag_value(&args, "-outfmt"), Some("5".to_string()));
        assert_eq!(flag_value(&args, "-dust"), Some("yes".to_string()));
        assert_eq!(flag_value(&args, "-soft_masking"), Some("true".to_string()));
        assert_eq!(flag_value(&args, "-xdrop_gap"), Some("150".to_string()));
        assert_eq!(flag_value(&args, "-word_size"), Some("11".to_string()));
    }

    #[test]
    fn user_mode_presets_nothing() {
        let mut params = SearchMode::User.forward(8);
        params.extra = vec!["-evalue".to_string(), "1e-9".to_string()];
        let cmd = params.command(Path::new("db"), "lib.fa");
        let args = args_of(&cmd);
        assert_eq!(
            args,
            vec!["-db", "db", "-query", "lib.fa", "-outfmt", "6", "-evalue", "1e-9"]
        );
    }

    #[test]
    fn dust_arg_forms() {
        assert_eq!(Dust::yes().arg(), "yes");
        assert_eq!(Dust::default().arg(), "no");
        let tuned = Dust {
            filter: true,
            level: 20,
            window: 64,
            linker: 1,
        };
        assert_eq!(tuned.arg(), "20 64 1");
    }

    #[test]
    fn reserved_flags_are_rejected() {
        let flags = vec!["-max_target_seqs".to_string(), "-db".to_string()];
        assert!(check_flags(&flags, RESERVED_BLASTN).is_err());
        assert!(check_flags(&flags[..1], RESERVED_BLASTN).is_ok());
    }
}
