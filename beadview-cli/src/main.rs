//! beadview: live terminal view over the `bd` issue tracker.
//!
//! # Usage
//!
//! ```text
//! beadview list [--all] [--status S,..] [--sort COLUMN [--desc]] [--json]
//! beadview watch [--all] [--no-watch] [--json]
//! beadview probe [--root DIR] [--json]
//! beadview config path|show|init
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand, list::ListArgs, probe::ProbeArgs, watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "beadview",
    version,
    about = "Live, low-overhead view of bd issues",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch once and print the filtered, sorted issue table.
    List(ListArgs),

    /// Keep the view live: print row changes as the store is written.
    Watch(WatchArgs),

    /// Show the write marker and how each file under the store is classified.
    Probe(ProbeArgs),

    /// Inspect or create ~/.beadview/config.yaml.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::List(args) => args.run(),
        Commands::Watch(args) => args.run(),
        Commands::Probe(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
    }
}
