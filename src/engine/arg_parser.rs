use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::config::PackagePaths;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Deterministic document pipeline with a tamper-evident audit ledger.
#[derive(Clone, Parser)]
#[command(name = "veridex")]
#[command(about = "Process a document root into a verifiable index; `verify` checks a ledger offline.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Subcommand)]
pub enum Command {
    /// Discover, process, and index every document under DIR.
    Run {
        /// Document root. Default: current directory.
        #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
        dir: PathBuf,

        /// Index database path. Default: `.veridex.db` in DIR.
        #[arg(long)]
        index: Option<PathBuf>,

        /// Audit ledger path. Default: `.veridex.audit` in DIR.
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Worker pool size. Default: available parallelism minus one.
        #[arg(long, short = 'w')]
        workers: Option<usize>,

        /// Documents per index commit batch.
        #[arg(long, short = 'b')]
        batch_size: Option<usize>,

        /// Follow symbolic links (targets re-checked against DIR).
        #[arg(long, short = 'f')]
        follow_links: bool,

        /// Exclude patterns (glob syntax). Can specify multiple: -e pattern1 pattern2
        #[arg(long, short = 'e', num_args = 1..)]
        exclude: Vec<String>,

        /// Strict mode: fail on first walk error instead of skipping.
        #[arg(long)]
        strict: bool,

        /// Verbose output.
        #[arg(long, short = 'v')]
        verbose: bool,
    },
    /// Verify a ledger's hash chain and MACs offline.
    Verify {
        /// Ledger file to verify.
        #[arg(value_name = "LEDGER")]
        ledger: PathBuf,

        /// Start verification at this sequence number.
        #[arg(long, default_value_t = 0)]
        from: u64,

        /// Verbose output.
        #[arg(long, short = 'v')]
        verbose: bool,
    },
}

/// Resolve the index path for a run, defaulting into the root.
pub fn index_path_for(dir: &std::path::Path, index: &Option<PathBuf>) -> PathBuf {
    index
        .clone()
        .unwrap_or_else(|| dir.join(PackagePaths::get().index_filename()))
}

/// Resolve the ledger path for a run, defaulting into the root.
pub fn ledger_path_for(dir: &std::path::Path, ledger: &Option<PathBuf>) -> PathBuf {
    ledger
        .clone()
        .unwrap_or_else(|| dir.join(PackagePaths::get().ledger_filename()))
}
