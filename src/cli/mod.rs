pub mod commands;
pub mod output;

use crate::errors::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "patchstack")]
#[command(about = "Apply and maintain an ordered stack of local patches on an upstream tree")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Target source tree (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply patches from the patch directory on top of the current stack
    Apply {
        /// The tree is not a git checkout (ebuild); implies --no-commit
        #[arg(long)]
        ebuild: bool,

        /// Do not create a commit per patch
        #[arg(long)]
        no_commit: bool,

        /// First patch to apply (inclusive), as a file name or a path in the patch directory
        #[arg(long, value_name = "PATCH")]
        first: Option<String>,

        /// Last patch to apply (inclusive), as a file name or a path in the patch directory
        #[arg(long, value_name = "PATCH")]
        last: Option<String>,

        /// Log what would be done without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Override the configured patch directory
        #[arg(long, value_name = "DIR")]
        patch_dir: Option<PathBuf>,
    },

    /// Turn applied patch commits back into patch files and reset the branch
    Format {
        /// Keep the patch commits on a new backup branch before resetting
        #[arg(long, short = 'b')]
        backup_branch: bool,

        /// Log what would be done without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the applied and pending patches
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., git.marker_tag)
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// List all configuration values
    List,

    /// Reset a configuration value to its default
    Unset {
        /// Configuration key
        key: String,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        self.setup_logging();

        let path = self.path;
        match self.command {
            Commands::Apply {
                ebuild,
                no_commit,
                first,
                last,
                dry_run,
                patch_dir,
            } => commands::apply::run(commands::apply::ApplyArgs {
                path,
                ebuild,
                no_commit,
                first,
                last,
                dry_run,
                patch_dir,
            }),
            Commands::Format {
                backup_branch,
                dry_run,
            } => commands::format::run(path, backup_branch, dry_run),
            Commands::Status => commands::status::run(path),
            Commands::Config { action } => commands::config::run(path, action),
            Commands::Completions { shell } => commands::completions::generate_completions(shell),
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr);

        // A subscriber may already be installed when embedded in tests.
        if self.no_color {
            console::set_colors_enabled(false);
            let _ = subscriber.with_ansi(false).try_init();
        } else {
            let _ = subscriber.try_init();
        }
    }
}
