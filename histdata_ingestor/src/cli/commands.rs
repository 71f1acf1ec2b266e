use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a TOML config file; defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print reports as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download monthly archives and push their bars to the Pushgateway
    Ingest(IngestArgs),

    /// Remove every group held by the Pushgateway
    Clear {
        /// Only print the groups that would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct IngestArgs {
    /// Currency pair (e.g. "EURUSD")
    #[arg(long, default_value = "EURUSD")]
    pub pair: String,

    #[arg(long, default_value_t = 2023)]
    pub year: i32,

    /// First month, 1-12
    #[arg(long, default_value_t = 1)]
    pub month: u32,

    /// Number of consecutive months to ingest, starting at --month
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub months: u32,

    /// Retries per month after a transient download failure (overrides config)
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Delay before the first retry, doubled for each further retry (overrides config)
    #[arg(long)]
    pub base_delay_ms: Option<u64>,
}
