pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "hrflow",
    about = "hrflow operator CLI",
    long_about = "Operate the hrflow approval engine: migrations, demo data, config inspection, readiness checks, and one-shot background jobs.",
    after_help = "Examples:\n  hrflow doctor --json\n  hrflow chains\n  hrflow sweep"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo org directory, approval chains, and leave balances")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, and approval chain coverage")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the configured approval chain for every request type")]
    Chains,
    #[command(about = "Run the stale-request auto-approval sweep once")]
    Sweep,
    #[command(about = "Deliver pending outbox notifications once")]
    Dispatch,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Chains => commands::chains::run(),
        Command::Sweep => commands::sweep::run(),
        Command::Dispatch => commands::dispatch::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
