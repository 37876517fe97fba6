use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(
    name = "repfind",
    version,
    about = "Find interspersed repeat elements in a genome with NCBI BLAST+"
)]
struct Cli {
    /// Increase log verbosity (-v for BLAST commands, -vv for child chatter)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search repeat libraries against a query genome
    Search(commands::search::SearchArgs),
    /// Dump a pipeline store as a JSON stream
    Audit {
        /// Store to audit; the basename selects the decoding and must be
        /// one of forward.db, regions.db or reverse.db
        #[arg(long)]
        db: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .init();

    match cli.command {
        Commands::Search(args) => commands::search::run(args),
        Commands::Audit { db } => commands::audit::run(&db),
    }
}
