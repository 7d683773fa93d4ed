//! Planning and reporting values.

use crate::phase::MigrationPhase;
use crate::version::Version;
use serde::Serialize;

/// Summary of a planned migration, produced by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOperationInformation {
    /// Version recorded in the ledger; `None` for an unversioned database.
    pub current_version: Option<Version>,
    /// Version the run migrates to.
    pub target_version: Version,
    /// Highest version in the roadmap.
    pub latest_version: Version,
    /// Titles of the selected phases.
    pub title: String,
    /// Descriptions of the selected phases, one line per phase.
    pub description: String,
    /// Human-readable diff of the live schema against the planned one.
    pub schema_changes: String,
    /// Versions of the selected phases, ascending.
    pub phases: Vec<Version>,
}

impl MigrationOperationInformation {
    pub(crate) fn describe(phases: &[&MigrationPhase]) -> (String, String) {
        let title = phases
            .iter()
            .map(|p| p.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let description = phases
            .iter()
            .map(|p| match &p.description {
                Some(d) => format!("{}: {}", p.version, d.trim()),
                None => format!("{}: {}", p.version, p.title),
            })
            .collect::<Vec<_>>()
            .join("\n");
        (title, description)
    }
}

/// Counts describing what one phase did; stored as the ledger summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    /// Tables named in `create`.
    pub created_tables: usize,
    /// Columns declared in `create`.
    pub created_columns: usize,
    /// Columns changed by `update`.
    pub updated_columns: usize,
    /// Columns dropped by `delete`.
    pub deleted_columns: usize,
    /// Tables dropped by `delete`.
    pub deleted_tables: usize,
    /// Conditional create entries.
    pub conditional_creates: usize,
    /// Rows copied per table.
    pub transferred: Vec<(String, u64)>,
}

impl PhaseSummary {
    /// Count the structural instructions of a phase.
    pub fn from_phase(phase: &MigrationPhase) -> Self {
        let g = &phase.guidelines;
        Self {
            created_tables: g.create.len(),
            created_columns: g.create.iter().map(|c| c.columns.len()).sum(),
            updated_columns: g.update.iter().map(|u| u.rules.len()).sum(),
            deleted_columns: g.delete.iter().map(|d| d.columns.len()).sum(),
            deleted_tables: g.delete.iter().filter(|d| d.is_whole_table()).count(),
            conditional_creates: g.create.iter().filter(|c| c.condition.is_some()).count(),
            transferred: Vec::new(),
        }
    }

    /// Record rows copied into a table.
    pub fn record_transfer(&mut self, table: impl Into<String>, rows: u64) {
        self.transferred.push((table.into(), rows));
    }

    /// Total rows copied.
    pub fn transferred_rows(&self) -> u64 {
        self.transferred.iter().map(|(_, rows)| rows).sum()
    }
}

impl std::fmt::Display for PhaseSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.created_columns > 0 {
            let mut part = format!(
                "created {} column(s) in {} table(s)",
                self.created_columns, self.created_tables
            );
            if self.conditional_creates > 0 {
                part.push_str(&format!(", {} conditional", self.conditional_creates));
            }
            parts.push(part);
        }
        if self.updated_columns > 0 {
            parts.push(format!("updated {} column(s)", self.updated_columns));
        }
        if self.deleted_columns > 0 {
            parts.push(format!("deleted {} column(s)", self.deleted_columns));
        }
        if self.deleted_tables > 0 {
            parts.push(format!("dropped {} table(s)", self.deleted_tables));
        }
        for (table, rows) in &self.transferred {
            parts.push(format!("transferred {} row(s) into {}", rows, table));
        }

        if parts.is_empty() {
            write!(f, "no changes")
        } else {
            write!(f, "{}", parts.join("; "))
        }
    }
}

/// Outcome of one phase in a `migrate_data` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    /// Phase version.
    pub version: Version,
    /// Phase title.
    pub title: String,
    /// Ledger summary.
    pub summary: String,
    /// Rendered transfer statements, in execution order.
    pub transfer_statements: Vec<String>,
    /// Rows copied by the transfers.
    pub transferred_rows: u64,
    /// Whether the phase was committed and recorded (false for dry runs).
    pub committed: bool,
}

/// Outcome of a whole `migrate_data` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Phases processed, ascending.
    pub phases: Vec<PhaseReport>,
}

impl MigrationReport {
    /// Last version committed by the run.
    pub fn last_committed(&self) -> Option<Version> {
        self.phases
            .iter()
            .filter(|p| p.committed)
            .map(|p| p.version)
            .last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{
        ColumnDefinition, ColumnsDefinition, PhaseGuidelines, RuleUpdate, TableDelete,
        TableUpdate,
    };

    #[test]
    fn test_summary_text() {
        let phase = MigrationPhase::new(Version::new(2, 0, 0), "rework").with_guidelines(
            PhaseGuidelines::new()
                .with_create(
                    ColumnsDefinition::new("Orders")
                        .with_column(ColumnDefinition::new("Id", "int"))
                        .with_column(ColumnDefinition::new("Total", "money"))
                        .with_condition("1 = 1"),
                )
                .with_update(
                    TableUpdate::new("Users").with_rule(RuleUpdate::new("Id").with_type("bigint")),
                )
                .with_delete(TableDelete::table("Legacy")),
        );

        let mut summary = PhaseSummary::from_phase(&phase);
        summary.record_transfer("Users", 42);

        assert_eq!(
            summary.to_string(),
            "created 2 column(s) in 1 table(s), 1 conditional; updated 1 column(s); \
             dropped 1 table(s); transferred 42 row(s) into Users"
        );
        assert_eq!(summary.transferred_rows(), 42);
    }

    #[test]
    fn test_describe_phases() {
        let a = MigrationPhase::new(Version::new(1, 0, 0), "Users").with_description("user table");
        let b = MigrationPhase::new(Version::new(2, 0, 0), "Orders");
        let (title, description) = MigrationOperationInformation::describe(&[&a, &b]);
        assert_eq!(title, "Users, Orders");
        assert_eq!(description, "1.0.0: user table\n2.0.0: Orders");
    }
}
