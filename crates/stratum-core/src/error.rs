//! Error types for roadmap loading, reconciliation and execution.

use crate::version::Version;
use thiserror::Error;

/// The guideline collection an instruction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `create` instruction.
    Create,
    /// `update` instruction.
    Update,
    /// `delete` instruction.
    Delete,
    /// `transfer` instruction.
    Transfer,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::Transfer => write!(f, "transfer"),
        }
    }
}

/// A roadmap instruction contradicts the cumulative map built so far.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    /// The instruction references a table that does not exist at that point.
    #[error("phase {version}: cannot {operation} table '{table}': table does not exist")]
    UnknownTable {
        /// Phase that carries the instruction.
        version: Version,
        /// Referenced table.
        table: String,
        /// Instruction kind.
        operation: Operation,
    },

    /// The instruction references a column that does not exist at that point.
    #[error("phase {version}: cannot {operation} column '{table}.{column}': column does not exist")]
    UnknownColumn {
        /// Phase that carries the instruction.
        version: Version,
        /// Table of the column.
        table: String,
        /// Referenced column.
        column: String,
        /// Instruction kind.
        operation: Operation,
    },

    /// A column deletion removes a column a pending transfer still reads or writes.
    #[error(
        "phase {version}: column '{table}.{column}' is deleted but a pending transfer still references it"
    )]
    TransferColumnDeleted {
        /// Phase that deletes the column.
        version: Version,
        /// Table of the column.
        table: String,
        /// Deleted column.
        column: String,
    },
}

/// Errors surfaced by the migration engine.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A roadmap document could not be parsed.
    #[error("format error in {source_name}: {message}")]
    Format {
        /// Document path or label.
        source_name: String,
        /// Parser message.
        message: String,
    },

    /// A parsed phase violates basic shape rules.
    #[error("validation error in {source_name}: {message}")]
    Validation {
        /// Document path or label.
        source_name: String,
        /// Description of the violation.
        message: String,
    },

    /// Folding the roadmap violated a cumulative-map invariant.
    #[error("reconciliation failed: {0}")]
    Reconciliation(#[from] ReconciliationError),

    /// The database is already at the target version.
    #[error("no pending migrations: database is at {current}, target is {target}")]
    NoPendingMigrations {
        /// Version recorded in the ledger.
        current: Version,
        /// Requested target version.
        target: Version,
    },

    /// The requested target does not name a phase in the roadmap.
    #[error("target version {0} is not part of the roadmap")]
    UnknownTargetVersion(Version),

    /// The roadmap contains no phases at all.
    #[error("roadmap is empty")]
    EmptyRoadmap,

    /// No DDL script is registered for a selected phase.
    #[error("no script found for phase {version}")]
    MissingScript {
        /// Phase missing its script.
        version: Version,
    },

    /// The orchestrator was driven out of order.
    #[error("invalid migration state: {0}")]
    InvalidState(String),

    /// A DDL script or data transfer failed against the database.
    #[error("phase {version} failed: {message}")]
    Execution {
        /// Phase being applied.
        version: Version,
        /// Driver or engine message.
        message: String,
    },

    /// Reading or writing the schema ledger failed.
    #[error("schema ledger error: {0}")]
    Ledger(String),

    /// The run was cancelled.
    #[error("migration cancelled (last applied version: {})", display_version(.last_applied))]
    Cancelled {
        /// Version recorded last before cancellation took effect.
        last_applied: Option<Version>,
    },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Whether the error is a no-op signal rather than a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, MigrationError::NoPendingMigrations { .. })
    }

    /// Short label for the error kind, as reported by the CLI.
    pub fn kind(&self) -> &'static str {
        match self {
            MigrationError::Format { .. } => "FormatError",
            MigrationError::Validation { .. } => "ValidationError",
            MigrationError::Reconciliation(_) => "ReconciliationError",
            MigrationError::NoPendingMigrations { .. } => "NoPendingMigrationsError",
            MigrationError::UnknownTargetVersion(_)
            | MigrationError::EmptyRoadmap
            | MigrationError::MissingScript { .. }
            | MigrationError::InvalidState(_) => "PlanningError",
            MigrationError::Execution { .. } => "ExecutionError",
            MigrationError::Ledger(_) => "LedgerError",
            MigrationError::Cancelled { .. } => "Cancelled",
            MigrationError::Io(_) => "IoError",
        }
    }
}

fn display_version(version: &Option<Version>) -> String {
    match version {
        Some(v) => v.to_string(),
        None => "none".to_string(),
    }
}
