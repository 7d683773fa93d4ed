//! In-memory migration target.
//!
//! Keeps the ledger and a log of committed statements in memory. Failures
//! and cancellations can be injected per phase to exercise rollback and
//! resume paths.

use super::ledger::{MigrationTarget, PhaseTransaction, SchemaLedger, SchemaPhase};
use crate::error::MigrationError;
use crate::version::Version;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which step of a phase an injected failure or cancellation hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// The DDL script.
    Script,
    /// The first transfer statement.
    Transfer,
    /// The ledger insert.
    Record,
}

/// A statement committed to the in-memory target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutedStatement {
    /// A DDL script.
    Script {
        /// Phase version.
        version: Version,
        /// Script text.
        sql: String,
    },
    /// A transfer statement.
    Transfer {
        /// Phase version.
        version: Version,
        /// Statement text.
        sql: String,
    },
}

#[derive(Debug, Default)]
struct MemoryState {
    ledger_table_created: bool,
    ledger: Vec<SchemaPhase>,
    executed: Vec<ExecutedStatement>,
    failures: HashMap<Version, FailurePoint>,
    cancellations: HashMap<Version, (FailurePoint, CancellationToken)>,
    rows_per_transfer: u64,
    rollbacks: usize,
}

/// Migration target backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTarget {
    /// Create an empty target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows every transfer statement reports.
    pub fn with_rows_per_transfer(self, rows: u64) -> Self {
        self.state.lock().rows_per_transfer = rows;
        self
    }

    /// Make the given phase fail at a step.
    pub fn fail_at(&self, version: Version, point: FailurePoint) {
        self.state.lock().failures.insert(version, point);
    }

    /// Remove an injected failure.
    pub fn clear_failure(&self, version: Version) {
        self.state.lock().failures.remove(&version);
    }

    /// Cancel `token` when the given phase reaches a step. The step itself
    /// still runs.
    pub fn cancel_at(&self, version: Version, point: FailurePoint, token: CancellationToken) {
        self.state.lock().cancellations.insert(version, (point, token));
    }

    /// Statements committed so far.
    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.state.lock().executed.clone()
    }

    /// Versions recorded in the ledger, in insertion order.
    pub fn recorded_versions(&self) -> Vec<Version> {
        self.state.lock().ledger.iter().map(|p| p.version).collect()
    }

    /// Number of phase transactions rolled back.
    pub fn rollbacks(&self) -> usize {
        self.state.lock().rollbacks
    }

    /// Whether the ledger table was created.
    pub fn ledger_table_created(&self) -> bool {
        self.state.lock().ledger_table_created
    }

    fn insert_row(state: &mut MemoryState, phase: &SchemaPhase) -> Result<(), MigrationError> {
        if state.ledger.iter().any(|p| p.version == phase.version) {
            return Err(MigrationError::Ledger(format!(
                "version {} is already recorded",
                phase.version
            )));
        }
        state.ledger.push(phase.clone());
        Ok(())
    }
}

#[async_trait]
impl SchemaLedger for MemoryTarget {
    async fn ensure_ledger_table_exists(&self) -> Result<(), MigrationError> {
        self.state.lock().ledger_table_created = true;
        Ok(())
    }

    async fn latest_applied_version(&self) -> Result<Option<Version>, MigrationError> {
        Ok(self.state.lock().ledger.iter().map(|p| p.version).max())
    }

    async fn list_applied_phases(&self) -> Result<Vec<SchemaPhase>, MigrationError> {
        let mut phases = self.state.lock().ledger.clone();
        phases.sort_by_key(|p| p.version);
        Ok(phases)
    }

    async fn record_applied(&self, phase: &SchemaPhase) -> Result<(), MigrationError> {
        Self::insert_row(&mut self.state.lock(), phase)
    }
}

#[async_trait]
impl MigrationTarget for MemoryTarget {
    async fn begin_phase(
        &self,
        version: Version,
    ) -> Result<Box<dyn PhaseTransaction>, MigrationError> {
        let (failure, cancellation) = {
            let state = self.state.lock();
            (
                state.failures.get(&version).copied(),
                state.cancellations.get(&version).cloned(),
            )
        };
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            version,
            failure,
            cancellation,
            pending: Vec::new(),
            row: None,
        }))
    }
}

struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    version: Version,
    failure: Option<FailurePoint>,
    cancellation: Option<(FailurePoint, CancellationToken)>,
    pending: Vec<ExecutedStatement>,
    row: Option<SchemaPhase>,
}

impl MemoryTransaction {
    fn check(&self, point: FailurePoint) -> Result<(), MigrationError> {
        if let Some((at, token)) = &self.cancellation {
            if *at == point {
                token.cancel();
            }
        }
        if self.failure == Some(point) {
            return Err(MigrationError::Execution {
                version: self.version,
                message: format!("injected {:?} failure", point),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PhaseTransaction for MemoryTransaction {
    async fn execute_script(&mut self, script: &str) -> Result<(), MigrationError> {
        self.check(FailurePoint::Script)?;
        self.pending.push(ExecutedStatement::Script {
            version: self.version,
            sql: script.to_string(),
        });
        Ok(())
    }

    async fn execute_transfer(&mut self, statement: &str) -> Result<u64, MigrationError> {
        self.check(FailurePoint::Transfer)?;
        self.pending.push(ExecutedStatement::Transfer {
            version: self.version,
            sql: statement.to_string(),
        });
        Ok(self.state.lock().rows_per_transfer)
    }

    async fn record_applied(&mut self, phase: &SchemaPhase) -> Result<(), MigrationError> {
        self.check(FailurePoint::Record)?;
        self.row = Some(phase.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), MigrationError> {
        let MemoryTransaction {
            state, pending, row, ..
        } = *self;
        let mut state = state.lock();
        if let Some(row) = &row {
            MemoryTarget::insert_row(&mut state, row)?;
        }
        state.executed.extend(pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), MigrationError> {
        self.state.lock().rollbacks += 1;
        Ok(())
    }
}
