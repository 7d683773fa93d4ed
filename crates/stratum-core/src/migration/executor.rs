//! Migration orchestrator.
//!
//! Plans a run from the roadmap and the ledger, then applies the selected
//! phases one at a time, each inside its own phase transaction.

use super::ledger::{MigrationTarget, PhaseTransaction, SchemaPhase};
use super::plan::{MigrationOperationInformation, MigrationReport, PhaseReport, PhaseSummary};
use super::script::ScriptSource;
use super::transfer::TransferStatement;
use crate::error::MigrationError;
use crate::phase::{MigrationPhase, Roadmap};
use crate::provider::Provider;
use crate::reconcile::{DataTransactionMap, SchemaChanges};
use crate::version::Version;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default suffix of the relation a phase script leaves the old rows in.
pub const DEFAULT_BACKUP_SUFFIX: &str = "__backup";

/// Configuration for migration execution.
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Render and log every step without executing anything.
    pub dry_run: bool,
    /// Engine used for type mapping and quoting in transfer statements.
    pub provider: Provider,
    /// Suffix of the backup relation transfers read from by default.
    pub backup_suffix: String,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            provider: Provider::Postgres,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
        }
    }
}

impl MigratorConfig {
    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the provider.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Set the backup relation suffix.
    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.backup_suffix = suffix.into();
        self
    }
}

/// Fold a whole roadmap and check that every phase has a script.
///
/// Touches no database. Returns the schema the roadmap ends at.
pub fn verify_roadmap(
    roadmap: &Roadmap,
    scripts: &dyn ScriptSource,
) -> Result<DataTransactionMap, MigrationError> {
    if roadmap.is_empty() {
        return Err(MigrationError::EmptyRoadmap);
    }
    let map = DataTransactionMap::build(roadmap.phases())?;
    for phase in roadmap.phases() {
        if scripts.script(phase.version)?.is_none() {
            return Err(MigrationError::MissingScript {
                version: phase.version,
            });
        }
    }
    Ok(map)
}

/// Lifecycle of a single migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigratorState {
    /// No plan yet.
    Uninitialized,
    /// `initialize` succeeded; ready to apply.
    Planned,
    /// Phases are being applied.
    Applying,
    /// Every selected phase was applied.
    Applied,
    /// A phase failed or the run was cancelled.
    Failed,
}

impl std::fmt::Display for MigratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigratorState::Uninitialized => write!(f, "uninitialized"),
            MigratorState::Planned => write!(f, "planned"),
            MigratorState::Applying => write!(f, "applying"),
            MigratorState::Applied => write!(f, "applied"),
            MigratorState::Failed => write!(f, "failed"),
        }
    }
}

struct PlannedPhase {
    phase: MigrationPhase,
    script: String,
}

struct PlannedMigration {
    info: MigrationOperationInformation,
    /// Live schema at the current version.
    seed: DataTransactionMap,
    /// Schema after every selected phase.
    planned: DataTransactionMap,
    steps: Vec<PlannedPhase>,
}

/// Drives a roadmap against a migration target.
pub struct Migrator {
    roadmap: Roadmap,
    scripts: Arc<dyn ScriptSource>,
    target: Arc<dyn MigrationTarget>,
    config: MigratorConfig,
    state: MigratorState,
    plan: Option<PlannedMigration>,
}

impl Migrator {
    /// Create a new migrator.
    pub fn new(
        roadmap: Roadmap,
        scripts: Arc<dyn ScriptSource>,
        target: Arc<dyn MigrationTarget>,
        config: MigratorConfig,
    ) -> Self {
        Self {
            roadmap,
            scripts,
            target,
            config,
            state: MigratorState::Uninitialized,
            plan: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MigratorState {
        self.state
    }

    /// The roadmap being applied.
    pub fn roadmap(&self) -> &Roadmap {
        &self.roadmap
    }

    /// Fold the whole roadmap and check that every phase has a script.
    pub fn verify(&self) -> Result<DataTransactionMap, MigrationError> {
        verify_roadmap(&self.roadmap, self.scripts.as_ref())
    }

    /// Plan a run up to `target_version` (the latest roadmap version if `None`).
    ///
    /// Calling it again replaces the previous plan; with no intervening
    /// `migrate_data` the result is identical.
    pub async fn initialize(
        &mut self,
        target_version: Option<Version>,
    ) -> Result<MigrationOperationInformation, MigrationError> {
        self.plan = None;
        self.state = MigratorState::Uninitialized;

        let plan = self.build_plan(target_version).await?;
        let info = plan.info.clone();
        self.plan = Some(plan);
        self.state = MigratorState::Planned;
        Ok(info)
    }

    async fn build_plan(
        &self,
        requested: Option<Version>,
    ) -> Result<PlannedMigration, MigrationError> {
        let latest_version = self
            .roadmap
            .latest_version()
            .ok_or(MigrationError::EmptyRoadmap)?;
        let target_version = match requested {
            Some(v) if self.roadmap.get(v).is_none() => {
                return Err(MigrationError::UnknownTargetVersion(v))
            }
            Some(v) => v,
            None => latest_version,
        };

        // Reject a contradictory roadmap before talking to the database.
        DataTransactionMap::build(self.roadmap.up_to(target_version))?;

        self.target.ensure_ledger_table_exists().await?;
        let current_version = self.target.latest_applied_version().await?;

        if let Some(current) = current_version {
            if current == target_version {
                return Err(MigrationError::NoPendingMigrations {
                    current,
                    target: target_version,
                });
            }
            if current > target_version {
                return Err(MigrationError::InvalidState(format!(
                    "database is at {}, which is newer than target {}; downgrades are not supported",
                    current, target_version
                )));
            }
            if self.roadmap.get(current).is_none() {
                tracing::warn!(
                    version = %current,
                    "ledger version is not part of the roadmap"
                );
            }
        }

        let mut seed = match current_version {
            Some(current) => DataTransactionMap::build(self.roadmap.up_to(current))?,
            None => DataTransactionMap::new(),
        };
        seed.settle();

        let selected = self.roadmap.between(current_version, target_version);
        let planned = DataTransactionMap::fold(seed.clone(), selected.iter().copied())?;

        let mut steps = Vec::with_capacity(selected.len());
        for phase in &selected {
            let script = self
                .scripts
                .script(phase.version)?
                .ok_or(MigrationError::MissingScript {
                    version: phase.version,
                })?;
            steps.push(PlannedPhase {
                phase: (*phase).clone(),
                script,
            });
        }

        let (title, description) = MigrationOperationInformation::describe(&selected);
        let info = MigrationOperationInformation {
            current_version,
            target_version,
            latest_version,
            title,
            description,
            schema_changes: SchemaChanges::compute(&seed, &planned).to_string(),
            phases: selected.iter().map(|p| p.version).collect(),
        };

        tracing::info!(
            current = ?current_version.map(|v| v.to_string()),
            target = %target_version,
            phases = steps.len(),
            "migration planned"
        );

        Ok(PlannedMigration {
            info,
            seed,
            planned,
            steps,
        })
    }

    /// Apply the planned phases in ascending version order.
    ///
    /// The first failing phase is rolled back and ends the run; phases before
    /// it stay recorded. `cancel` is honored before each phase and between
    /// the steps of a phase.
    pub async fn migrate_data(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<MigrationReport, MigrationError> {
        if self.state != MigratorState::Planned {
            return Err(MigrationError::InvalidState(format!(
                "migrate_data requires a planned migration, state is {}",
                self.state
            )));
        }
        let plan = self
            .plan
            .take()
            .ok_or_else(|| MigrationError::InvalidState("plan missing".to_string()))?;

        self.state = MigratorState::Applying;
        let result = self.apply_plan(&plan, cancel).await;
        self.state = match &result {
            Ok(_) => MigratorState::Applied,
            Err(_) => MigratorState::Failed,
        };
        result
    }

    async fn apply_plan(
        &self,
        plan: &PlannedMigration,
        cancel: &CancellationToken,
    ) -> Result<MigrationReport, MigrationError> {
        let mut report = MigrationReport::default();
        let mut working = plan.seed.clone();
        let mut last_applied = plan.info.current_version;

        for step in &plan.steps {
            if cancel.is_cancelled() {
                tracing::info!(next = %step.phase.version, "cancellation requested, stopping");
                return Err(MigrationError::Cancelled { last_applied });
            }

            working.apply(&step.phase)?;
            let statements = self.transfer_statements(&step.phase, &working, &plan.planned);

            let phase_report = if self.config.dry_run {
                self.describe_dry_run(step, &statements)
            } else {
                self.apply_phase(step, &statements, cancel, last_applied)
                    .await?
            };

            if phase_report.committed {
                last_applied = Some(step.phase.version);
            }
            report.phases.push(phase_report);
        }

        Ok(report)
    }

    fn transfer_statements(
        &self,
        phase: &MigrationPhase,
        working: &DataTransactionMap,
        planned: &DataTransactionMap,
    ) -> Vec<TransferStatement> {
        phase
            .guidelines
            .transfer
            .iter()
            .filter_map(|transfer| {
                // A later drop, or a re-creation with its own transfer, supersedes this one.
                if planned.transfer_origin(&transfer.table) != Some(phase.version) {
                    tracing::warn!(
                        version = %phase.version,
                        table = %transfer.table,
                        "transfer skipped, superseded by a later phase"
                    );
                    return None;
                }
                let rules = working.table(&transfer.table)?;
                Some(TransferStatement::render(
                    rules,
                    &transfer.definition,
                    self.config.provider,
                    &self.config.backup_suffix,
                ))
            })
            .collect()
    }

    fn describe_dry_run(&self, step: &PlannedPhase, statements: &[TransferStatement]) -> PhaseReport {
        tracing::info!(
            version = %step.phase.version,
            title = %step.phase.title,
            script_bytes = step.script.len(),
            transfers = statements.len(),
            "dry run, phase not executed"
        );
        for statement in statements {
            tracing::debug!(table = %statement.table, sql = %statement.sql, "transfer");
        }

        PhaseReport {
            version: step.phase.version,
            title: step.phase.title.clone(),
            summary: PhaseSummary::from_phase(&step.phase).to_string(),
            transfer_statements: statements.iter().map(|s| s.sql.clone()).collect(),
            transferred_rows: 0,
            committed: false,
        }
    }

    async fn apply_phase(
        &self,
        step: &PlannedPhase,
        statements: &[TransferStatement],
        cancel: &CancellationToken,
        last_applied: Option<Version>,
    ) -> Result<PhaseReport, MigrationError> {
        let phase = &step.phase;
        tracing::info!(version = %phase.version, title = %phase.title, "applying phase");

        let mut tx = self.target.begin_phase(phase.version).await?;
        let summary =
            match Self::run_phase(tx.as_mut(), step, statements, cancel, last_applied).await {
                Ok(summary) => summary,
                Err(e) => {
                    Self::abort(tx, phase.version, &e).await;
                    return Err(e);
                }
            };

        let row = SchemaPhase::new(
            phase.version,
            phase.title.clone(),
            phase.description.clone(),
            summary.to_string(),
        );
        if let Err(e) = tx.record_applied(&row).await {
            Self::abort(tx, phase.version, &e).await;
            return Err(e);
        }
        tx.commit().await?;

        tracing::info!(
            version = %phase.version,
            rows = summary.transferred_rows(),
            summary = %row.summary,
            "phase applied"
        );

        Ok(PhaseReport {
            version: phase.version,
            title: phase.title.clone(),
            summary: row.summary,
            transfer_statements: statements.iter().map(|s| s.sql.clone()).collect(),
            transferred_rows: summary.transferred_rows(),
            committed: true,
        })
    }

    async fn run_phase(
        tx: &mut dyn PhaseTransaction,
        step: &PlannedPhase,
        statements: &[TransferStatement],
        cancel: &CancellationToken,
        last_applied: Option<Version>,
    ) -> Result<PhaseSummary, MigrationError> {
        tx.execute_script(&step.script).await?;
        tracing::debug!(version = %step.phase.version, "script executed");

        let mut summary = PhaseSummary::from_phase(&step.phase);
        for statement in statements {
            let rows = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(MigrationError::Cancelled { last_applied });
                }
                rows = tx.execute_transfer(&statement.sql) => rows?,
            };
            tracing::debug!(table = %statement.table, rows, "transfer executed");
            summary.record_transfer(&statement.table, rows);
        }

        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled { last_applied });
        }
        Ok(summary)
    }

    async fn abort(tx: Box<dyn PhaseTransaction>, version: Version, cause: &MigrationError) {
        tracing::error!(version = %version, error = %cause, "phase failed, rolling back");
        if let Err(e) = tx.rollback().await {
            tracing::error!(version = %version, error = %e, "rollback failed");
        }
    }
}
