//! Human-readable differences between two transaction maps.
//!
//! Used to describe what a plan will do to the live schema.

use super::map::{DataTransactionMap, TableRules};
use super::rule::DataTransactionRule;
use std::collections::BTreeSet;
use std::fmt;

/// Complete diff between two maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChanges {
    /// Changes to tables, ordered by table name.
    pub table_changes: Vec<TableChange>,
    /// Tables that receive a data transfer, with the number of mapped columns.
    pub transfers: Vec<(String, usize)>,
}

impl SchemaChanges {
    /// Compute the changes that turn `from` into `to`.
    pub fn compute(from: &DataTransactionMap, to: &DataTransactionMap) -> Self {
        let names: BTreeSet<&str> = from
            .tables()
            .chain(to.tables())
            .map(|t| t.name.as_str())
            .collect();

        let mut table_changes = Vec::new();
        for name in names {
            match (from.table(name), to.table(name)) {
                (None, Some(added)) => table_changes.push(TableChange::Added(added.clone())),
                (Some(_), None) => table_changes.push(TableChange::Removed(name.to_string())),
                (Some(before), Some(after)) => {
                    let column_changes = Self::diff_columns(before, after);
                    if !column_changes.is_empty() {
                        table_changes.push(TableChange::Modified {
                            table_name: name.to_string(),
                            column_changes,
                        });
                    }
                }
                (None, None) => {}
            }
        }

        let transfers = to
            .transfer_definitions()
            .map(|(table, def)| (table.to_string(), def.columns.len()))
            .collect();

        SchemaChanges {
            table_changes,
            transfers,
        }
    }

    fn diff_columns(from: &TableRules, to: &TableRules) -> Vec<ColumnChange> {
        let mut changes = Vec::new();

        for rule in &to.rules {
            match from.rule(&rule.column_name) {
                None => changes.push(ColumnChange::Added(rule.clone())),
                Some(old) => {
                    if old.column_type != rule.column_type {
                        changes.push(ColumnChange::TypeChanged {
                            column_name: rule.column_name.clone(),
                            from_type: old.column_type.clone(),
                            to_type: rule.column_type.clone(),
                        });
                    }
                    if old.value != rule.value {
                        changes.push(ColumnChange::DefaultChanged {
                            column_name: rule.column_name.clone(),
                            from_value: old.value.clone(),
                            to_value: rule.value.clone(),
                        });
                    }
                }
            }
        }

        for rule in &from.rules {
            if to.rule(&rule.column_name).is_none() {
                changes.push(ColumnChange::Removed(rule.column_name.clone()));
            }
        }

        changes
    }

    /// Check if there are any changes.
    pub fn is_empty(&self) -> bool {
        self.table_changes.is_empty() && self.transfers.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.table_changes.len() + self.transfers.len()
    }
}

/// Change to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableChange {
    /// Table was added.
    Added(TableRules),
    /// Table was removed.
    Removed(String),
    /// Table columns changed.
    Modified {
        /// Name of the table.
        table_name: String,
        /// Changes to columns.
        column_changes: Vec<ColumnChange>,
    },
}

impl TableChange {
    /// Get the table name for this change.
    pub fn table_name(&self) -> &str {
        match self {
            TableChange::Added(t) => &t.name,
            TableChange::Removed(name) => name,
            TableChange::Modified { table_name, .. } => table_name,
        }
    }
}

/// Change to a column within a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    /// Column was added.
    Added(DataTransactionRule),
    /// Column was removed.
    Removed(String),
    /// Column type was changed.
    TypeChanged {
        /// Name of the column.
        column_name: String,
        /// Original type.
        from_type: String,
        /// New type.
        to_type: String,
    },
    /// Column default expression was changed.
    DefaultChanged {
        /// Name of the column.
        column_name: String,
        /// Original default.
        from_value: Option<String>,
        /// New default.
        to_value: Option<String>,
    },
}

fn describe_rule(rule: &DataTransactionRule) -> String {
    let mut out = format!("{} {}", rule.column_name, rule.column_type);
    if let Some(value) = &rule.value {
        out.push_str(&format!(" default {}", value));
    }
    if rule.is_enum {
        out.push_str(" (enum)");
    }
    out
}

impl fmt::Display for SchemaChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "(no schema changes)");
        }

        for change in &self.table_changes {
            match change {
                TableChange::Added(table) => {
                    writeln!(f, "+ table {}", table.name)?;
                    for rule in &table.rules {
                        writeln!(f, "    + {}", describe_rule(rule))?;
                    }
                }
                TableChange::Removed(name) => writeln!(f, "- table {}", name)?,
                TableChange::Modified {
                    table_name,
                    column_changes,
                } => {
                    writeln!(f, "~ table {}", table_name)?;
                    for column in column_changes {
                        match column {
                            ColumnChange::Added(rule) => {
                                writeln!(f, "    + {}", describe_rule(rule))?
                            }
                            ColumnChange::Removed(name) => writeln!(f, "    - {}", name)?,
                            ColumnChange::TypeChanged {
                                column_name,
                                from_type,
                                to_type,
                            } => writeln!(f, "    ~ {}: {} -> {}", column_name, from_type, to_type)?,
                            ColumnChange::DefaultChanged {
                                column_name,
                                from_value,
                                to_value,
                            } => writeln!(
                                f,
                                "    ~ {} default: {} -> {}",
                                column_name,
                                from_value.as_deref().unwrap_or("none"),
                                to_value.as_deref().unwrap_or("none")
                            )?,
                        }
                    }
                }
            }
        }

        for (table, columns) in &self.transfers {
            writeln!(f, "> transfer into {} ({} column(s))", table, columns)?;
        }
        Ok(())
    }
}
