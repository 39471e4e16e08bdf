// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! chklog - checkpointed partition log tooling

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{config, replay};
use output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "chklog",
    version,
    about = "Checkpointed partition log - config validation and workload replay"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Checkpoint configuration
    Config(config::ConfigArgs),
    /// Replay a scripted workload against one partition log
    Replay(replay::ReplayArgs),
}

fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Config(args) => config::handle(args.command, cli.format),
        Commands::Replay(args) => replay::handle(args, cli.format),
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
