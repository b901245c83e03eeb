#![deny(missing_docs)]

//! # BT Gen CLI
//!
//! Command Line Interface for the ROS 2 BehaviorTree plugin generator.
//!
//! Supported Commands:
//! - `plugin`: `.action` definitions -> BehaviorTree.CPP action plugin headers.
//! - `bt`: plugin headers -> host registrations and the design-tool node model.

use bt_gen_core::{AppResult, GeneratorConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod files;
mod nodes;
mod plugin;

#[derive(Parser, Debug)]
#[clap(author, version, about = "ROS 2 BehaviorTree plugin generator")]
struct Cli {
    /// Path to the generator configuration.
    #[clap(
        short,
        long,
        global = true,
        env = "BT_GEN_CONFIG",
        default_value = "assets/config.json"
    )]
    config: PathBuf,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generates or refreshes one plugin header per `.action` file.
    Plugin(plugin::PluginArgs),
    /// Registers plugins with the host source and syncs the node model.
    Bt(nodes::BtArgs),
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = GeneratorConfig::load(&cli.config)?;

    match &cli.command {
        Commands::Plugin(args) => plugin::execute(args, &config)?,
        Commands::Bt(args) => nodes::execute(args, &config)?,
    }

    Ok(())
}
