//! Roadmap phases and the documents they are loaded from.
//!
//! A phase is one versioned unit of declared schema and data change. Phases
//! are authored as YAML documents, one per version, and collected into a
//! [`Roadmap`]:
//!
//! ```yaml
//! version: 2.0.0
//! title: Split user names
//! guidelines:
//!   create:
//!     Users:
//!       FirstName: text
//!       LastName: { type: text, value: "''" }
//!   update:
//!     Users:
//!       CreateDate: timestamptz
//!   delete:
//!     Legacy: []
//!   transfer:
//!     Users:
//!       columns: { FirstName: "split_part(Name, ' ', 1)" }
//! ```

pub mod guidelines;
pub mod roadmap;
pub mod source;

pub use guidelines::{
    ColumnDefinition, ColumnsDefinition, DataTransferDefinition, PhaseGuidelines, RuleUpdate,
    TableDelete, TableTransfer, TableUpdate, TransferColumn,
};
pub use roadmap::Roadmap;
pub use source::{PhaseSource, YamlPhaseSource};

use crate::version::Version;

/// One versioned unit of declared change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPhase {
    /// Phase version.
    pub version: Version,
    /// Short title (non-empty).
    pub title: String,
    /// Longer description.
    pub description: Option<String>,
    /// Instructions.
    pub guidelines: PhaseGuidelines,
}

impl MigrationPhase {
    /// Create a phase with empty guidelines.
    pub fn new(version: Version, title: impl Into<String>) -> Self {
        Self {
            version,
            title: title.into(),
            description: None,
            guidelines: PhaseGuidelines::default(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the guidelines.
    pub fn with_guidelines(mut self, guidelines: PhaseGuidelines) -> Self {
        self.guidelines = guidelines;
        self
    }

    /// Check the shape rules every phase must satisfy.
    ///
    /// Returns a description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err(format!("phase {} has an empty title", self.version));
        }
        if !self.guidelines.has_structural_changes() {
            return Err(format!(
                "phase {} declares no create, update or delete guidelines",
                self.version
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_title() {
        let phase = MigrationPhase::new(Version::new(1, 0, 0), "  ").with_guidelines(
            PhaseGuidelines::new().with_delete(TableDelete::table("Users")),
        );
        assert!(phase.validate().unwrap_err().contains("empty title"));
    }

    #[test]
    fn test_validate_rejects_transfer_only() {
        let phase = MigrationPhase::new(Version::new(1, 0, 0), "copy").with_guidelines(
            PhaseGuidelines::new()
                .with_transfer("Users", DataTransferDefinition::new().with_column("Id", "Id")),
        );
        assert!(phase.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_structural_phase() {
        let phase = MigrationPhase::new(Version::new(1, 0, 0), "init").with_guidelines(
            PhaseGuidelines::new().with_create(
                ColumnsDefinition::new("Users").with_column(ColumnDefinition::new("Id", "int")),
            ),
        );
        assert!(phase.validate().is_ok());
    }
}
