mod check;
mod run;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ntfy-client")]
#[command(about = "Dispatch push notifications to commands, parsers and shell triggers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read NDJSON notifications and dispatch them through a rules file.
    Run(run::Args),
    /// Validate a rules file and print what it registers.
    Check(check::Args),
}

#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Run(#[from] run::Error),
    #[error(transparent)]
    Check(#[from] ntfy_client::ConfigError),
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            run::run(args)?;
        }
        Command::Check(args) => check::run(args)?,
    }
    Ok(())
}
