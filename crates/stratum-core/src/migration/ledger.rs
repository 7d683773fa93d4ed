//! Schema ledger and migration target contracts.
//!
//! The ledger records which phases were applied to a database. A
//! [`MigrationTarget`] is a database that owns a ledger and can open one
//! [`PhaseTransaction`] per phase, so that a phase's DDL, its data transfer
//! and its ledger row commit or roll back together.

use crate::error::MigrationError;
use crate::version::Version;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One applied phase, as persisted in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaPhase {
    /// Phase version (natural key).
    pub version: Version,
    /// Phase title.
    pub title: String,
    /// Phase description.
    pub description: Option<String>,
    /// Computed summary of what the phase did.
    pub summary: String,
    /// When the phase was recorded.
    pub applied: DateTime<Utc>,
}

impl SchemaPhase {
    /// Create a ledger row stamped with the current time.
    pub fn new(
        version: Version,
        title: impl Into<String>,
        description: Option<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            version,
            title: title.into(),
            description,
            summary: summary.into(),
            applied: Utc::now(),
        }
    }
}

/// Persisted record of applied phases. Rows are append-only.
#[async_trait]
pub trait SchemaLedger: Send + Sync {
    /// Create the ledger table if it does not exist yet.
    async fn ensure_ledger_table_exists(&self) -> Result<(), MigrationError>;

    /// Highest recorded version; `None` for an unversioned database.
    async fn latest_applied_version(&self) -> Result<Option<Version>, MigrationError>;

    /// Every recorded phase, ascending by version.
    async fn list_applied_phases(&self) -> Result<Vec<SchemaPhase>, MigrationError>;

    /// Record a phase outside of any phase transaction.
    async fn record_applied(&self, phase: &SchemaPhase) -> Result<(), MigrationError>;
}

/// A database migrations are applied to.
#[async_trait]
pub trait MigrationTarget: SchemaLedger {
    /// Open the commit boundary for one phase.
    async fn begin_phase(
        &self,
        version: Version,
    ) -> Result<Box<dyn PhaseTransaction>, MigrationError>;
}

/// The unit of work for one phase.
///
/// Nothing executed through it is visible, and no ledger row exists, until
/// [`commit`](PhaseTransaction::commit) succeeds.
#[async_trait]
pub trait PhaseTransaction: Send {
    /// Execute the phase's DDL script.
    async fn execute_script(&mut self, script: &str) -> Result<(), MigrationError>;

    /// Execute one data-transfer statement; returns the number of rows copied.
    async fn execute_transfer(&mut self, statement: &str) -> Result<u64, MigrationError>;

    /// Insert the ledger row for this phase.
    async fn record_applied(&mut self, phase: &SchemaPhase) -> Result<(), MigrationError>;

    /// Commit everything.
    async fn commit(self: Box<Self>) -> Result<(), MigrationError>;

    /// Discard everything.
    async fn rollback(self: Box<Self>) -> Result<(), MigrationError>;
}
