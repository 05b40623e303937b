pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "storesight",
    about = "Storesight operator CLI",
    long_about = "Ask store analytics questions, inspect effective configuration, and run smoke validation.",
    after_help = "Examples:\n  storesight ask \"What were my top 5 selling products last week?\"\n  storesight ask \"Who are my repeat customers?\" --store demo-store.myshopify.com\n  storesight config\n  storesight smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Answer a natural-language question and print the answer as JSON")]
    Ask {
        question: String,
        #[arg(long, help = "Registered store domain; defaults to the first configured store")]
        store: Option<String>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Run end-to-end readiness checks with per-check timing details")]
    Smoke,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ask { question, store } => commands::ask::run(&question, store.as_deref()),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Smoke => commands::smoke::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
