//! Instruction collections carried by a phase.

/// A column to add to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Column name (case-sensitive).
    pub name: String,
    /// Declared column type, as authored.
    pub column_type: String,
    /// Default or cast expression.
    pub value: Option<String>,
    /// Whether the type names a user-defined enum.
    pub is_enum: bool,
}

impl ColumnDefinition {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            value: None,
            is_enum: false,
        }
    }

    /// Set the default expression.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Mark the type as an enum.
    pub fn as_enum(mut self) -> Self {
        self.is_enum = true;
        self
    }
}

/// The `create` entry for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnsDefinition {
    /// Target table.
    pub table: String,
    /// Columns to add, in declaration order.
    pub columns: Vec<ColumnDefinition>,
    /// SQL predicate gating whether the creation applies.
    pub condition: Option<String>,
    /// Existing column the new columns are positioned ahead of.
    pub before: Option<String>,
}

impl ColumnsDefinition {
    /// Create an empty definition for a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            condition: None,
            before: None,
        }
    }

    /// Add a column.
    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the gating condition.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Position the new columns ahead of an existing column.
    pub fn with_before(mut self, column: impl Into<String>) -> Self {
        self.before = Some(column.into());
        self
    }
}

/// Structural change to one existing column.
///
/// Only the fields that are `Some` are applied over the accumulated rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleUpdate {
    /// Column to update.
    pub column: String,
    /// New target type.
    pub column_type: Option<String>,
    /// Explicit "type today" override.
    pub current_type: Option<String>,
    /// New default or cast expression.
    pub value: Option<String>,
    /// Enum flag.
    pub is_enum: Option<bool>,
    /// Sequence flag.
    pub is_sequence: Option<bool>,
    /// Backing sequence name.
    pub sequence_name: Option<String>,
    /// Parent table for engine-level inheritance.
    pub inherits: Option<String>,
}

impl RuleUpdate {
    /// Create an update touching nothing yet.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Default::default()
        }
    }

    /// Change the target type.
    pub fn with_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    /// Override the current type.
    pub fn with_current_type(mut self, current_type: impl Into<String>) -> Self {
        self.current_type = Some(current_type.into());
        self
    }

    /// Change the default expression.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Back the column by a sequence.
    pub fn with_sequence(mut self, name: impl Into<String>) -> Self {
        self.is_sequence = Some(true);
        self.sequence_name = Some(name.into());
        self
    }

    /// Record a parent table.
    pub fn with_inherits(mut self, parent: impl Into<String>) -> Self {
        self.inherits = Some(parent.into());
        self
    }
}

/// The `update` entry for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableUpdate {
    /// Target table.
    pub table: String,
    /// Per-column changes.
    pub rules: Vec<RuleUpdate>,
}

impl TableUpdate {
    /// Create an empty update for a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rules: Vec::new(),
        }
    }

    /// Add a column change.
    pub fn with_rule(mut self, rule: RuleUpdate) -> Self {
        self.rules.push(rule);
        self
    }
}

/// The `delete` entry for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDelete {
    /// Target table.
    pub table: String,
    /// Columns to drop. Empty means the whole table.
    pub columns: Vec<String>,
}

impl TableDelete {
    /// Delete the whole table.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Delete the named columns.
    pub fn columns<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this entry drops the entire table.
    pub fn is_whole_table(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One column mapping of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferColumn {
    /// Column written in the target table.
    pub target: String,
    /// Source expression (a column name, or any SQL expression over the source rows).
    pub source: String,
}

/// Data-copy instruction into a (possibly restructured) table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTransferDefinition {
    /// Column mappings, in declaration order.
    pub columns: Vec<TransferColumn>,
    /// Optional transformation script producing the source rows.
    pub script: Option<String>,
}

impl DataTransferDefinition {
    /// Create an empty transfer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a target column from a source expression.
    pub fn with_column(mut self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.columns.push(TransferColumn {
            target: target.into(),
            source: source.into(),
        });
        self
    }

    /// Set the transformation script.
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Whether the transfer writes the given target column.
    pub fn references(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.target == column)
    }
}

/// The `transfer` entry for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTransfer {
    /// Target table.
    pub table: String,
    /// The transfer itself.
    pub definition: DataTransferDefinition,
}

impl TableTransfer {
    /// Create a transfer entry.
    pub fn new(table: impl Into<String>, definition: DataTransferDefinition) -> Self {
        Self {
            table: table.into(),
            definition,
        }
    }
}

/// The four independent instruction collections of a phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseGuidelines {
    /// Tables and columns to add.
    pub create: Vec<ColumnsDefinition>,
    /// Changes to existing columns.
    pub update: Vec<TableUpdate>,
    /// Column or table removals.
    pub delete: Vec<TableDelete>,
    /// Data copies into affected tables.
    pub transfer: Vec<TableTransfer>,
}

impl PhaseGuidelines {
    /// Create empty guidelines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a create entry.
    pub fn with_create(mut self, create: ColumnsDefinition) -> Self {
        self.create.push(create);
        self
    }

    /// Add an update entry.
    pub fn with_update(mut self, update: TableUpdate) -> Self {
        self.update.push(update);
        self
    }

    /// Add a delete entry.
    pub fn with_delete(mut self, delete: TableDelete) -> Self {
        self.delete.push(delete);
        self
    }

    /// Add a transfer entry.
    pub fn with_transfer(mut self, table: impl Into<String>, definition: DataTransferDefinition) -> Self {
        self.transfer.push(TableTransfer::new(table, definition));
        self
    }

    /// Whether the phase changes structure: a create with columns, an update
    /// with rules, or any delete (an empty column list drops the whole table).
    pub fn has_structural_changes(&self) -> bool {
        self.create.iter().any(|c| !c.columns.is_empty())
            || self.update.iter().any(|u| !u.rules.is_empty())
            || !self.delete.is_empty()
    }

    /// Whether the phase touches the given table in any collection.
    pub fn affects_table(&self, table: &str) -> bool {
        self.create.iter().any(|c| c.table == table)
            || self.update.iter().any(|u| u.table == table)
            || self.delete.iter().any(|d| d.table == table)
            || self.transfer.iter().any(|t| t.table == table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_only_is_not_structural() {
        let guidelines = PhaseGuidelines::new()
            .with_transfer("Users", DataTransferDefinition::new().with_column("Id", "Id"));
        assert!(!guidelines.has_structural_changes());
        assert!(guidelines.affects_table("Users"));
    }

    #[test]
    fn test_empty_entries_are_not_structural() {
        let guidelines = PhaseGuidelines::new()
            .with_create(ColumnsDefinition::new("Users"))
            .with_update(TableUpdate::new("Users"));
        assert!(!guidelines.has_structural_changes());

        let guidelines = guidelines.with_delete(TableDelete::table("Legacy"));
        assert!(guidelines.has_structural_changes());

        let guidelines = PhaseGuidelines::new()
            .with_create(ColumnsDefinition::new("Users").with_column(ColumnDefinition::new("Id", "int")));
        assert!(guidelines.has_structural_changes());
    }

    #[test]
    fn test_delete_whole_table() {
        assert!(TableDelete::table("Users").is_whole_table());
        assert!(!TableDelete::columns("Users", ["Name"]).is_whole_table());
    }

    #[test]
    fn test_transfer_references_targets_only() {
        let transfer = DataTransferDefinition::new().with_column("FullName", "Name");
        assert!(transfer.references("FullName"));
        assert!(!transfer.references("Name"));
    }
}
