//! Root CLI parser with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Unattended installer for drivers, programs and games.
#[derive(Parser)]
#[command(name = "unattend")]
#[command(about = "Install a list of programs and games without user interaction")]
#[command(version)]
pub struct Cli {
    /// Settings file (JSON). Missing fields take their defaults.
    #[arg(long, global = true, env = "UNATTEND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "unattend",
            "--verbose",
            "--config",
            "/tmp/settings.json",
            "normalize",
            "Hades",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/settings.json")));
        assert!(matches!(cli.command, Some(Commands::Normalize { .. })));
    }

    #[test]
    fn test_run_requires_manifest() {
        assert!(Cli::try_parse_from(["unattend", "run"]).is_err());
        let cli = Cli::try_parse_from(["unattend", "run", "--manifest", "items.json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run { .. })));
    }
}
