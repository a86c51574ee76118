//! CLI arguments

use clap::Parser;
use std::path::PathBuf;

/// lagwatch - live event handler latency monitor
#[derive(Parser, Debug)]
#[command(name = "lagwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (searched for in the usual places if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Milliseconds between host dispatch rounds, overriding the config
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Act as an observer so `subscribe` delivers notifications here
    #[arg(long)]
    pub observer: bool,
}
