//! Per-column transformation records.

use crate::phase::{ColumnDefinition, RuleUpdate};

/// What a column is today and what it becomes once the plan is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTransactionRule {
    /// Column name (case-sensitive).
    pub column_name: String,
    /// Type the column has before the phase that last changed it.
    pub current_type: String,
    /// Target type.
    pub column_type: String,
    /// Default or cast expression.
    pub value: Option<String>,
    /// Whether the column is introduced by the plan rather than already live.
    pub is_new: bool,
    /// Whether the type names a user-defined enum.
    pub is_enum: bool,
    /// Whether the column is backed by a sequence.
    pub is_sequence: bool,
    /// Backing sequence name.
    pub sequence_name: Option<String>,
    /// Parent table for engine-level inheritance.
    pub inherits: Option<String>,
}

impl DataTransactionRule {
    /// Rule for a freshly created column.
    pub fn created(definition: &ColumnDefinition) -> Self {
        Self {
            column_name: definition.name.clone(),
            current_type: definition.column_type.clone(),
            column_type: definition.column_type.clone(),
            value: definition.value.clone(),
            is_new: true,
            is_enum: definition.is_enum,
            is_sequence: false,
            sequence_name: None,
            inherits: None,
        }
    }

    /// Re-declare an existing column through `create`.
    ///
    /// Behaves like an update of type, value and enum flag. `is_new` is kept.
    /// `phase_start_type` is the column's type before the current phase.
    pub fn redefine(&mut self, definition: &ColumnDefinition, phase_start_type: &str) {
        self.column_type = definition.column_type.clone();
        self.current_type = phase_start_type.to_string();
        if definition.value.is_some() {
            self.value = definition.value.clone();
        }
        self.is_enum = definition.is_enum;
    }

    /// Apply the non-empty fields of an update.
    ///
    /// `current_type` becomes `phase_start_type`, the column's type before the
    /// current phase, unless the update sets it explicitly.
    pub fn apply_update(&mut self, update: &RuleUpdate, phase_start_type: &str) {
        if let Some(column_type) = &update.column_type {
            self.column_type = column_type.clone();
        }
        self.current_type = update
            .current_type
            .clone()
            .unwrap_or_else(|| phase_start_type.to_string());
        if let Some(value) = &update.value {
            self.value = Some(value.clone());
        }
        if let Some(is_enum) = update.is_enum {
            self.is_enum = is_enum;
        }
        if let Some(is_sequence) = update.is_sequence {
            self.is_sequence = is_sequence;
        }
        if let Some(sequence_name) = &update.sequence_name {
            self.sequence_name = Some(sequence_name.clone());
        }
        if let Some(inherits) = &update.inherits {
            self.inherits = Some(inherits.clone());
        }
    }

    /// Whether copying data into this column needs a type cast.
    pub fn needs_cast(&self) -> bool {
        !self.current_type.trim().eq_ignore_ascii_case(self.column_type.trim())
    }

    /// Treat the target state as live: `current_type = type`, not new.
    pub fn settle(&mut self) {
        self.current_type = self.column_type.clone();
        self.is_new = false;
    }
}
