//! CLI error types.

use stratum_core::MigrationError;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Error from the migration engine.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// No connection URL was configured.
    #[error("no database URL: pass --database-url or set DATABASE_URL")]
    MissingDatabaseUrl,
}

impl CliError {
    /// Whether the command should still exit successfully.
    pub fn is_benign(&self) -> bool {
        matches!(self, CliError::Migration(e) if e.is_benign())
    }

    /// Short label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Migration(e) => e.kind(),
            CliError::MissingDatabaseUrl => "ConfigurationError",
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_benign() {
            0
        } else {
            1
        }
    }
}
