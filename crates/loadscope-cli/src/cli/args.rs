use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "loadscope",
    version,
    about = "Load-test session analysis and reporting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one full collection cycle against a captured batch file
    Replay(ReplayArgs),
    /// Recompute aggregates for one session, or for all of them
    Aggregate(AggregateArgs),
    /// Render the text report for a session
    Report(ReportArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReplayArgs {
    /// JSONL capture, one raw batch (object or array) per line
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, env = "REPORT_DB", default_value = "data/perf.db")]
    pub db: PathBuf,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Expected repetitions per job
    #[arg(long)]
    pub depth: u32,

    #[arg(long, env = "BUCKET_SECONDS", default_value_t = 10)]
    pub bucket_seconds: i64,

    /// Inactivity window that closes the session once the capture runs dry
    #[arg(long, env = "ANALYSIS_TIMEOUT_SECONDS", default_value_t = 5.0)]
    pub timeout_seconds: f64,

    #[arg(long, env = "REPORTS_DIR", default_value = "reports")]
    pub reports_dir: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AggregateArgs {
    #[arg(long, env = "REPORT_DB", default_value = "data/perf.db")]
    pub db: PathBuf,

    /// Session to recompute; every session when omitted
    #[arg(long)]
    pub session: Option<i64>,

    #[arg(long, env = "BUCKET_SECONDS", default_value_t = 10)]
    pub bucket_seconds: i64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, env = "REPORT_DB", default_value = "data/perf.db")]
    pub db: PathBuf,

    #[arg(long)]
    pub session: i64,

    #[arg(long, env = "BUCKET_SECONDS", default_value_t = 10)]
    pub bucket_seconds: i64,

    #[arg(long, env = "REPORTS_DIR", default_value = "reports")]
    pub out: PathBuf,

    /// Print the report instead of writing it under the reports dir
    #[arg(long)]
    pub stdout: bool,
}
