use clap::{Parser, Subcommand};
use std::path::PathBuf;

use options_enrich::config::DEFAULT_CONFIG_PATH;

/// Options-chain enrichment: fetch chains, derive tenor and relative
/// strike, summarise strike buckets, and price a portfolio from them.
#[derive(Parser)]
#[command(name = "options-enrich", version, about)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Debug-level logging (overrides RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Enrich the option files under <outdir>/<TICKER>/ and write bucket summaries
    Enrich {
        /// Separate `{ "strike_buckets": [...] }` file (default: buckets from the config)
        #[arg(long)]
        buckets: Option<PathBuf>,
    },

    /// Download option chains for the configured tickers
    Fetch,

    /// Move per-ticker output into <outdir>/YYYY/MM/DD/enriched/
    Snapshot,

    /// Annotate the configured portfolio with fair values from bucket summaries
    FairValue,

    /// Annotate every basket portfolio CSV with per-member max tenors and fair values
    BasketFairValue,

    /// Fetch, enrich, snapshot, and price the portfolios, in that order
    Pipeline {
        /// Separate `{ "strike_buckets": [...] }` file (default: buckets from the config)
        #[arg(long)]
        buckets: Option<PathBuf>,
    },

    /// Output the JSON schema for the configuration file
    Schema,
}
