//! CLI entry point.
//!
//! Parses arguments, sets up logging and routes each command to its
//! handler. Infrastructure is wired only through `bootstrap`.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use unattend_cli::{Cli, CliError, Commands, handlers, load_settings};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli, command: Commands) -> anyhow::Result<bool> {
    let settings = load_settings(cli.config.as_deref())?;

    match command {
        Commands::Run {
            manifest,
            max_visible,
        } => {
            let summary = handlers::run::execute(settings, &manifest, max_visible).await?;
            Ok(summary.all_succeeded())
        }
        Commands::Resolve { manifest, name } => {
            handlers::resolve::execute(&settings, &manifest, &name).await?;
            Ok(true)
        }
        Commands::Normalize { name } => {
            handlers::normalize::execute(&name);
            Ok(true)
        }
        Commands::Config => {
            handlers::config::execute(&settings)?;
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let mut cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command.take() else {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    match dispatch(cli, command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
