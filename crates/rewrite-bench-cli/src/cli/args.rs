use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rewrite-bench",
    version,
    about = "Evaluate LLM-rewritten SQL for correctness and performance"
)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Rewrite, execute and compare every query of the corpus
    Run(RunArgs),
    /// Aggregate persisted records into summary statistics
    Stats(StatsArgs),
    /// Write a sample config and corpus
    Init(InitArgs),
    Version,
}

#[derive(Parser, Clone, Debug)]
pub struct RunArgs {
    #[arg(long, default_value = "rewrite-bench.yaml")]
    pub config: PathBuf,

    /// Prompt mode override: plain|zero-shot|few-shot|chain-of-thought
    #[arg(long)]
    pub mode: Option<String>,

    /// Results sink override (.csv, or .db/.sqlite/.sqlite3 for SQLite)
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Only evaluate the first N queries
    #[arg(long)]
    pub limit: Option<usize>,

    /// Rewrite failure policy override: skip|record-empty|abort
    #[arg(long)]
    pub on_rewrite_failure: Option<String>,

    /// Reject unknown config keys instead of warning
    #[arg(long)]
    pub strict: bool,

    /// No per-query console lines
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["config", "results"])))]
pub struct StatsArgs {
    /// Read the results path and stats settings from this config
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Results file to aggregate
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Outlier policy: none|fixed-threshold|iqr
    #[arg(long)]
    pub outliers: Option<String>,

    /// Also require same_signature before a record's metrics count
    #[arg(long)]
    pub require_signature: bool,

    /// Output format: text|json
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Write the report here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
pub struct InitArgs {
    #[arg(long, default_value = "rewrite-bench.yaml")]
    pub config: PathBuf,

    #[arg(long, default_value = "queries.sql")]
    pub corpus: PathBuf,

    /// Also write a .gitignore for result files
    #[arg(long)]
    pub gitignore: bool,
}
