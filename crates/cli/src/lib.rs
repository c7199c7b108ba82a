pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rackbot_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "rackbot",
    about = "Rackbot operator CLI",
    long_about = "Inspect configuration, check readiness, and list the stores and racks of the inventory spreadsheet.",
    after_help = "Examples:\n  rackbot doctor --json\n  rackbot config\n  rackbot stores"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file to use instead of rackbot.toml")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, sheets credentials, and spreadsheet reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List stores with their racks (read-only)")]
    Stores {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
        Command::Stores { json } => commands::stores::run(&options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
