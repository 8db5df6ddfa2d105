//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// linode-provider - plan and apply Linode resources from YAML files.
#[derive(Parser, Debug)]
#[command(name = "linode-provider")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the provider configuration file.
    #[arg(short, long, global = true, env = "LINODE_PROVIDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the state file.
    #[arg(long, global = true, env = "LINODE_PROVIDER_STATE")]
    pub state: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the resource and data source types.
    Resources,

    /// Show the schema of a resource or data source type.
    Schema {
        /// Type name, e.g. `linode_domain`.
        type_name: String,
    },

    /// Validate a resource file without calling the API.
    Validate {
        /// Resource file.
        file: PathBuf,
    },

    /// Show what applying a resource file would change.
    Plan {
        /// Resource file.
        file: PathBuf,

        /// Refresh stored resources before planning.
        #[arg(long)]
        refresh: bool,
    },

    /// Apply a resource file.
    Apply {
        /// Resource file.
        file: PathBuf,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Refresh stored resources before planning.
        #[arg(long)]
        refresh: bool,

        /// Keep going after a failed step.
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Re-read stored resources from the API.
    Refresh {
        /// Only refresh this address.
        #[arg(long)]
        target: Option<String>,
    },

    /// Destroy stored resources.
    Destroy {
        /// Only destroy this address.
        #[arg(long)]
        target: Option<String>,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Inspect the state.
    State {
        /// State subcommand.
        #[command(subcommand)]
        command: StateCommands,
    },
}

/// State subcommands.
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Show stored resources, or a single one.
    Show {
        /// Address to show.
        address: Option<String>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["linode-provider", "-v", "apply", "main.yaml", "--yes"])
            .expect("parse");
        assert!(cli.verbose);
        match cli.command {
            Commands::Apply { file, yes, refresh, .. } => {
                assert_eq!(file, PathBuf::from("main.yaml"));
                assert!(yes);
                assert!(!refresh);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_state_show() {
        let cli = Cli::try_parse_from([
            "linode-provider",
            "--output",
            "json",
            "state",
            "show",
            "linode_domain.main",
        ])
        .expect("parse");
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::State { command: StateCommands::Show { address: Some(_) } }
        ));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
