use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CliOverrides;

#[derive(Parser)]
#[command(name = "sheet-sync")]
#[command(version, about = "Sync machine-generated text tables into a remote spreadsheet", long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync the newest input file into the worksheet
    Sync(SyncArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Path to the config file (defaults to the user config directory)
    pub config: Option<PathBuf>,

    /// Plan and report writes without touching the sheet
    #[arg(long)]
    pub dry_run: bool,

    /// Keep running and sync whenever new input arrives
    #[arg(long)]
    pub watch: bool,

    /// Override the worksheet title
    #[arg(long, value_name = "TITLE")]
    pub worksheet: Option<String>,

    /// Print the final pass report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            dry_run: self.dry_run,
            watch: self.watch,
            worksheet: self.worksheet.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_flags() {
        let cli = Cli::parse_from([
            "sheet-sync",
            "sync",
            "conf.toml",
            "--dry-run",
            "--worksheet",
            "Orders",
            "-v",
        ]);
        assert!(cli.verbose);

        let Commands::Sync(args) = cli.command;
        assert_eq!(args.config, Some(PathBuf::from("conf.toml")));
        assert!(args.dry_run);
        assert!(!args.watch);

        let overrides = args.overrides();
        assert_eq!(overrides.worksheet.as_deref(), Some("Orders"));
        assert!(overrides.dry_run);
    }
}
