//! Command-line arguments and the settings derived from them.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stratum_core::{MigratorConfig, Version};
use stratum_pg::LedgerConfig;

use crate::formatter::OutputFormat;

/// Stratum schema migrations
#[derive(Parser, Debug)]
#[command(name = "stratum")]
#[command(version, about = "Versioned schema and data migrations")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Project directory holding `roadmap/` and `scripts/`
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Roadmap directory (defaults to `<project>/roadmap`)
    #[arg(long, global = true)]
    pub roadmap: Option<PathBuf>,

    /// Script directory (defaults to `<project>/scripts`)
    #[arg(long, global = true)]
    pub scripts: Option<PathBuf>,

    /// Database connection URL
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Schema holding the ledger table
    #[arg(long, global = true, default_value = stratum_pg::config::DEFAULT_LEDGER_SCHEMA)]
    pub ledger_schema: String,

    /// Ledger table name
    #[arg(long, global = true, default_value = stratum_pg::config::DEFAULT_LEDGER_TABLE)]
    pub ledger_table: String,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Prefix every output line with `info:`, `data:` or `error:`
    #[arg(long, global = true)]
    pub prefix_output: bool,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Apply pending phases
    Migrate {
        /// Version to migrate to (defaults to the latest roadmap version)
        #[arg(short, long)]
        target: Option<Version>,

        /// Skip the offline check of the whole roadmap
        #[arg(long)]
        no_build: bool,

        /// Plan and render every step without executing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show what a migration would do
    Plan {
        /// Version to plan for (defaults to the latest roadmap version)
        #[arg(short, long)]
        target: Option<Version>,

        /// Output format
        #[arg(long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// List applied and pending phases
    Status {
        /// Output format
        #[arg(long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Check the roadmap and scripts without a database
    Verify {
        /// Output format
        #[arg(long, default_value = "table", value_enum)]
        format: OutputFormat,
    },
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Directory of phase documents.
    pub roadmap_dir: PathBuf,
    /// Directory of phase scripts.
    pub scripts_dir: PathBuf,
    /// Connection URL, if one was given.
    pub database_url: Option<String>,
    /// Ledger location.
    pub ledger: LedgerConfig,
    /// Prefix output lines with their channel.
    pub prefix_output: bool,
}

impl Args {
    /// Resolve the shared settings.
    pub fn to_config(&self) -> CliConfig {
        CliConfig {
            roadmap_dir: self
                .roadmap
                .clone()
                .unwrap_or_else(|| self.project.join("roadmap")),
            scripts_dir: self
                .scripts
                .clone()
                .unwrap_or_else(|| self.project.join("scripts")),
            database_url: self.database_url.clone(),
            ledger: LedgerConfig::default()
                .with_schema(self.ledger_schema.clone())
                .with_table(self.ledger_table.clone()),
            prefix_output: self.prefix_output,
        }
    }

    /// Default log filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "stratum=debug,stratum_core=debug,stratum_pg=debug"
        } else {
            "stratum=info,stratum_core=info,stratum_pg=info"
        }
    }
}

impl CliConfig {
    /// Migrator settings for a `migrate` or `plan` run.
    pub fn migrator_config(&self, dry_run: bool) -> MigratorConfig {
        MigratorConfig::default().with_dry_run(dry_run)
    }
}
