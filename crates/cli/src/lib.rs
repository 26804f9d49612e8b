pub mod adapters;
pub mod commands;

use std::process::ExitCode;

use canho_core::config::{AppConfig, ConfigError};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "canho",
    about = "Vietnamese apartment consultant chatbot CLI",
    long_about = "Chat with the apartment consultant, debug NLU extraction, and inspect configuration.",
    after_help = "Examples:\n  canho chat\n  canho nlu \"tìm căn 2 phòng ngủ dưới 3 tỷ\"\n  canho config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive consulting session on stdin")]
    Chat {
        #[arg(long, help = "Reuse an explicit session id instead of generating one")]
        session: Option<String>,
    },
    #[command(about = "Run one message through NLU extraction and print the result as JSON")]
    Nlu {
        #[arg(help = "The user message to analyze")]
        message: String,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

/// Dispatch on the already-loaded configuration; `main` loads it once and
/// hands the result through so commands never reload it.
pub async fn run(config: Result<AppConfig, ConfigError>) -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { session } => match &config {
            Ok(config) => commands::chat::run(config, session).await,
            Err(error) => config_failure(error),
        },
        Command::Nlu { message } => match &config {
            Ok(config) => commands::nlu::run(config, &message).await,
            Err(error) => config_failure(error),
        },
        Command::Config => commands::config::run(&config),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn config_failure(error: &ConfigError) -> commands::CommandResult {
    commands::CommandResult::failure(format!("config error: {error}"))
}
