//! Stratum Core - Roadmap model, reconciliation engine and migration orchestrator.
//!
//! A roadmap is an ordered set of versioned phases. Each phase declares the
//! tables and columns it creates, updates and deletes, plus the data it moves
//! between layouts. This crate folds phases into a [`DataTransactionMap`],
//! compares it against what a database has recorded in its schema ledger,
//! and applies the pending phases in order.

pub mod error;
pub mod migration;
pub mod phase;
pub mod provider;
pub mod reconcile;
pub mod version;

pub use error::{MigrationError, Operation, ReconciliationError};
pub use migration::{
    verify_roadmap, DirectoryScripts, MemoryScripts, MemoryTarget, MigrationOperationInformation,
    MigrationReport, MigrationTarget, Migrator, MigratorConfig, MigratorState, PhaseReport,
    PhaseTransaction, SchemaLedger, SchemaPhase, ScriptSource,
};
pub use phase::{MigrationPhase, PhaseGuidelines, PhaseSource, Roadmap, YamlPhaseSource};
pub use provider::Provider;
pub use reconcile::{DataTransactionMap, DataTransactionRule, SchemaChanges, TableRules};
pub use version::{ParseVersionError, Version};
