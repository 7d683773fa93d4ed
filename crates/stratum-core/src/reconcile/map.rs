//! The cumulative table -> column -> rule map.

use super::rule::DataTransactionRule;
use crate::error::{Operation, ReconciliationError};
use crate::phase::{
    ColumnsDefinition, DataTransferDefinition, MigrationPhase, TableDelete, TableTransfer,
    TableUpdate,
};
use crate::version::Version;
use std::collections::{BTreeMap, HashMap};

/// Column types as they were when the current phase started, by table and column.
type PhaseStartTypes = HashMap<(String, String), String>;

/// Rules of one table, in column insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRules {
    /// Table name (case-sensitive).
    pub name: String,
    /// Column rules.
    pub rules: Vec<DataTransactionRule>,
}

impl TableRules {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Get a column rule by name.
    pub fn rule(&self, column: &str) -> Option<&DataTransactionRule> {
        self.rules.iter().find(|r| r.column_name == column)
    }

    fn rule_mut(&mut self, column: &str) -> Option<&mut DataTransactionRule> {
        self.rules.iter_mut().find(|r| r.column_name == column)
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.column_name == column)
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.column_name.as_str())
    }
}

/// Cumulative transformation plan folded from an ordered list of phases.
///
/// Holds one [`TableRules`] per table plus the pending transfer of each table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTransactionMap {
    tables: BTreeMap<String, TableRules>,
    transfers: BTreeMap<String, DataTransferDefinition>,
    /// Version of the phase that declared each pending transfer.
    transfer_origins: BTreeMap<String, Version>,
}

impl DataTransactionMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold phases into a fresh map.
    pub fn build<'a>(
        phases: impl IntoIterator<Item = &'a MigrationPhase>,
    ) -> Result<Self, ReconciliationError> {
        Self::fold(Self::new(), phases)
    }

    /// Fold phases, in ascending version order, on top of a seed map.
    pub fn fold<'a>(
        seed: Self,
        phases: impl IntoIterator<Item = &'a MigrationPhase>,
    ) -> Result<Self, ReconciliationError> {
        let mut ordered: Vec<&MigrationPhase> = phases.into_iter().collect();
        ordered.sort_by_key(|p| p.version);

        ordered.into_iter().try_fold(seed, |mut map, phase| {
            map.apply(phase)?;
            Ok(map)
        })
    }

    /// Apply one phase: create, then update, then delete, then transfer.
    ///
    /// On error the map may be partially updated and should be discarded.
    pub fn apply(&mut self, phase: &MigrationPhase) -> Result<(), ReconciliationError> {
        let version = phase.version;
        let guidelines = &phase.guidelines;
        let start_types = self.phase_start_types(phase);

        for create in &guidelines.create {
            self.apply_create(version, create, &start_types)?;
        }
        for update in &guidelines.update {
            self.apply_update(version, update, &start_types)?;
        }
        for delete in &guidelines.delete {
            self.apply_delete(version, delete)?;
        }
        for transfer in &guidelines.transfer {
            self.apply_transfer(version, transfer)?;
        }

        tracing::trace!(
            version = %version,
            tables = self.tables.len(),
            transfers = self.transfers.len(),
            "folded phase"
        );
        Ok(())
    }

    /// Snapshot the types of every column in a table the phase creates or updates.
    fn phase_start_types(&self, phase: &MigrationPhase) -> PhaseStartTypes {
        let touched = phase
            .guidelines
            .create
            .iter()
            .map(|c| &c.table)
            .chain(phase.guidelines.update.iter().map(|u| &u.table));

        let mut types = PhaseStartTypes::new();
        for name in touched {
            if let Some(table) = self.tables.get(name) {
                for rule in &table.rules {
                    types
                        .entry((name.clone(), rule.column_name.clone()))
                        .or_insert_with(|| rule.column_type.clone());
                }
            }
        }
        types
    }

    fn apply_create(
        &mut self,
        version: Version,
        create: &ColumnsDefinition,
        start_types: &PhaseStartTypes,
    ) -> Result<(), ReconciliationError> {
        let table = self
            .tables
            .entry(create.table.clone())
            .or_insert_with(|| TableRules::new(&create.table));

        let mut insert_at = match &create.before {
            Some(before) => Some(table.position(before).ok_or_else(|| {
                ReconciliationError::UnknownColumn {
                    version,
                    table: create.table.clone(),
                    column: before.clone(),
                    operation: Operation::Create,
                }
            })?),
            None => None,
        };

        for column in &create.columns {
            if let Some(existing) = table.rule_mut(&column.name) {
                let start = start_type(start_types, &create.table, existing);
                existing.redefine(column, &start);
                continue;
            }
            let rule = DataTransactionRule::created(column);
            match insert_at.as_mut() {
                Some(idx) => {
                    table.rules.insert(*idx, rule);
                    *idx += 1;
                }
                None => table.rules.push(rule),
            }
        }
        Ok(())
    }

    fn apply_update(
        &mut self,
        version: Version,
        update: &TableUpdate,
        start_types: &PhaseStartTypes,
    ) -> Result<(), ReconciliationError> {
        let table =
            self.tables
                .get_mut(&update.table)
                .ok_or_else(|| ReconciliationError::UnknownTable {
                    version,
                    table: update.table.clone(),
                    operation: Operation::Update,
                })?;

        for change in &update.rules {
            let rule = table.rule_mut(&change.column).ok_or_else(|| {
                ReconciliationError::UnknownColumn {
                    version,
                    table: update.table.clone(),
                    column: change.column.clone(),
                    operation: Operation::Update,
                }
            })?;
            let start = start_type(start_types, &update.table, rule);
            rule.apply_update(change, &start);
        }
        Ok(())
    }

    fn apply_delete(
        &mut self,
        version: Version,
        delete: &TableDelete,
    ) -> Result<(), ReconciliationError> {
        if !self.tables.contains_key(&delete.table) {
            return Err(ReconciliationError::UnknownTable {
                version,
                table: delete.table.clone(),
                operation: Operation::Delete,
            });
        }

        if delete.is_whole_table() {
            self.tables.remove(&delete.table);
            self.transfer_origins.remove(&delete.table);
            if self.transfers.remove(&delete.table).is_some() {
                tracing::debug!(
                    version = %version,
                    table = %delete.table,
                    "table deleted, pending transfer discarded"
                );
            }
            return Ok(());
        }

        if let Some(table) = self.tables.get_mut(&delete.table) {
            for column in &delete.columns {
                let idx = table.position(column).ok_or_else(|| {
                    ReconciliationError::UnknownColumn {
                        version,
                        table: delete.table.clone(),
                        column: column.clone(),
                        operation: Operation::Delete,
                    }
                })?;
                table.rules.remove(idx);
            }
        }

        if let Some(transfer) = self.transfers.get(&delete.table) {
            if let Some(column) = delete.columns.iter().find(|c| transfer.references(c)) {
                return Err(ReconciliationError::TransferColumnDeleted {
                    version,
                    table: delete.table.clone(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    fn apply_transfer(
        &mut self,
        version: Version,
        transfer: &TableTransfer,
    ) -> Result<(), ReconciliationError> {
        if !self.tables.contains_key(&transfer.table) {
            return Err(ReconciliationError::UnknownTable {
                version,
                table: transfer.table.clone(),
                operation: Operation::Transfer,
            });
        }
        self.transfers
            .insert(transfer.table.clone(), transfer.definition.clone());
        self.transfer_origins.insert(transfer.table.clone(), version);
        Ok(())
    }

    /// Mark the current state as live.
    ///
    /// Every rule's `current_type` becomes its `type`, no column is new, and
    /// pending transfers are dropped since they already ran.
    pub fn settle(&mut self) {
        for table in self.tables.values_mut() {
            for rule in &mut table.rules {
                rule.settle();
            }
        }
        self.transfers.clear();
        self.transfer_origins.clear();
    }

    /// Get a table by name.
    pub fn table(&self, name: &str) -> Option<&TableRules> {
        self.tables.get(name)
    }

    /// Get a column rule.
    pub fn rule(&self, table: &str, column: &str) -> Option<&DataTransactionRule> {
        self.tables.get(table).and_then(|t| t.rule(column))
    }

    /// Whether a table exists.
    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// All tables, ordered by name.
    pub fn tables(&self) -> impl Iterator<Item = &TableRules> {
        self.tables.values()
    }

    /// Number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Pending transfer for a table.
    pub fn transfer(&self, table: &str) -> Option<&DataTransferDefinition> {
        self.transfers.get(table)
    }

    /// Version of the phase that declared the pending transfer for a table.
    pub fn transfer_origin(&self, table: &str) -> Option<Version> {
        self.transfer_origins.get(table).copied()
    }

    /// All pending transfers, ordered by table name.
    pub fn transfer_definitions(&self) -> impl Iterator<Item = (&str, &DataTransferDefinition)> {
        self.transfers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether the map holds no tables and no transfers.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.transfers.is_empty()
    }
}

/// Type a column had when the phase started; columns created by the phase
/// itself fall back to their creation type.
fn start_type(start_types: &PhaseStartTypes, table: &str, rule: &DataTransactionRule) -> String {
    start_types
        .get(&(table.to_string(), rule.column_name.clone()))
        .cloned()
        .unwrap_or_else(|| rule.current_type.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{ColumnDefinition, PhaseGuidelines, RuleUpdate};

    fn v(major: u32) -> Version {
        Version::new(major, 0, 0)
    }

    fn create(table: &str, columns: &[(&str, &str)]) -> ColumnsDefinition {
        columns
            .iter()
            .fold(ColumnsDefinition::new(table), |def, (name, ty)| {
                def.with_column(ColumnDefinition::new(*name, *ty))
            })
    }

    fn phase(major: u32, guidelines: PhaseGuidelines) -> MigrationPhase {
        MigrationPhase::new(v(major), format!("phase {major}")).with_guidelines(guidelines)
    }

    #[test]
    fn test_three_phase_roadmap() {
        let users = phase(
            1,
            PhaseGuidelines::new().with_create(create(
                "Users",
                &[("Id", "int"), ("Name", "text"), ("CreateDate", "timestamp")],
            )),
        );
        let retype = phase(
            2,
            PhaseGuidelines::new().with_update(
                TableUpdate::new("Users")
                    .with_rule(RuleUpdate::new("CreateDate").with_type("timestamptz")),
            ),
        );
        let orders = phase(
            3,
            PhaseGuidelines::new().with_create(create("Orders", &[("Id", "int"), ("Total", "money")])),
        );

        let map = DataTransactionMap::build([&users, &retype, &orders]).unwrap();
        assert_eq!(map.table_count(), 2);
        assert_eq!(map.table("Users").unwrap().rules.len(), 3);

        let created = map.rule("Users", "CreateDate").unwrap();
        assert_eq!(created.current_type, "timestamp");
        assert_eq!(created.column_type, "timestamptz");

        let names: Vec<_> = map.table("Orders").unwrap().column_names().collect();
        assert_eq!(names, vec!["Id", "Total"]);
    }

    #[test]
    fn test_create_then_update_same_phase() {
        let p = phase(
            1,
            PhaseGuidelines::new()
                .with_create(create("Users", &[("Id", "int")]))
                .with_update(
                    TableUpdate::new("Users").with_rule(RuleUpdate::new("Id").with_type("bigint")),
                ),
        );
        let map = DataTransactionMap::build([&p]).unwrap();
        let rule = map.rule("Users", "Id").unwrap();
        assert_eq!(rule.column_type, "bigint");
        assert!(rule.is_new);
    }

    #[test]
    fn test_create_then_delete_same_phase() {
        let p = phase(
            1,
            PhaseGuidelines::new()
                .with_create(create("Users", &[("Id", "int"), ("Tmp", "text")]))
                .with_delete(TableDelete::columns("Users", ["Tmp"])),
        );
        let map = DataTransactionMap::build([&p]).unwrap();
        let names: Vec<_> = map.table("Users").unwrap().column_names().collect();
        assert_eq!(names, vec!["Id"]);
    }

    #[test]
    fn test_update_unknown_table_fails() {
        let p = phase(
            1,
            PhaseGuidelines::new().with_update(
                TableUpdate::new("Ghost").with_rule(RuleUpdate::new("Id").with_type("int")),
            ),
        );
        let err = DataTransactionMap::build([&p]).unwrap_err();
        assert!(matches!(
            err,
            ReconciliationError::UnknownTable {
                operation: Operation::Update,
                ..
            }
        ));
    }

    #[test]
    fn test_update_unknown_column_fails() {
        let a = phase(1, PhaseGuidelines::new().with_create(create("Users", &[("Id", "int")])));
        let b = phase(
            2,
            PhaseGuidelines::new().with_update(
                TableUpdate::new("Users").with_rule(RuleUpdate::new("Email").with_type("text")),
            ),
        );
        let err = DataTransactionMap::build([&a, &b]).unwrap_err();
        assert_eq!(
            err,
            ReconciliationError::UnknownColumn {
                version: v(2),
                table: "Users".to_string(),
                column: "Email".to_string(),
                operation: Operation::Update,
            }
        );
    }

    #[test]
    fn test_delete_unknown_column_and_table_fail() {
        let a = phase(1, PhaseGuidelines::new().with_create(create("Users", &[("Id", "int")])));
        let missing_column = phase(
            2,
            PhaseGuidelines::new().with_delete(TableDelete::columns("Users", ["Name"])),
        );
        let missing_table = phase(2, PhaseGuidelines::new().with_delete(TableDelete::table("Ghost")));

        assert!(matches!(
            DataTransactionMap::build([&a, &missing_column]).unwrap_err(),
            ReconciliationError::UnknownColumn {
                operation: Operation::Delete,
                ..
            }
        ));
        assert!(matches!(
            DataTransactionMap::build([&a, &missing_table]).unwrap_err(),
            ReconciliationError::UnknownTable {
                operation: Operation::Delete,
                ..
            }
        ));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let a = phase(1, PhaseGuidelines::new().with_create(create("Users", &[("Id", "int")])));
        let b = phase(
            2,
            PhaseGuidelines::new().with_delete(TableDelete::columns("Users", ["id"])),
        );
        assert!(DataTransactionMap::build([&a, &b]).is_err());
    }

    #[test]
    fn test_whole_table_delete_discards_transfer() {
        let a = phase(
            1,
            PhaseGuidelines::new()
                .with_create(create("T", &[("Id", "int")]))
                .with_transfer("T", DataTransferDefinition::new().with_column("Id", "Id")),
        );
        let b = phase(2, PhaseGuidelines::new().with_delete(TableDelete::table("T")));

        let map = DataTransactionMap::build([&a, &b]).unwrap();
        assert!(map.transfer("T").is_none());
        assert!(!map.contains_table("T"));
    }

    #[test]
    fn test_partial_delete_of_transferred_column_fails() {
        let a = phase(
            1,
            PhaseGuidelines::new()
                .with_create(create("Users", &[("Id", "int"), ("Name", "text")]))
                .with_transfer("Users", DataTransferDefinition::new().with_column("Id", "Id")),
        );
        let b = phase(
            2,
            PhaseGuidelines::new().with_delete(TableDelete::columns("Users", ["Id"])),
        );

        let err = DataTransactionMap::build([&a, &b]).unwrap_err();
        assert_eq!(
            err,
            ReconciliationError::TransferColumnDeleted {
                version: v(2),
                table: "Users".to_string(),
                column: "Id".to_string(),
            }
        );
    }

    #[test]
    fn test_partial_delete_of_other_column_keeps_transfer() {
        let a = phase(
            1,
            PhaseGuidelines::new()
                .with_create(create("Users", &[("Id", "int"), ("Name", "text")]))
                .with_transfer("Users", DataTransferDefinition::new().with_column("Id", "Id")),
        );
        let b = phase(
            2,
            PhaseGuidelines::new().with_delete(TableDelete::columns("Users", ["Name"])),
        );
        let map = DataTransactionMap::build([&a, &b]).unwrap();
        assert!(map.transfer("Users").is_some());
    }

    #[test]
    fn test_transfer_unknown_table_fails() {
        let a = phase(
            1,
            PhaseGuidelines::new()
                .with_create(create("Users", &[("Id", "int")]))
                .with_transfer("Orders", DataTransferDefinition::new().with_column("Id", "Id")),
        );
        assert!(matches!(
            DataTransactionMap::build([&a]).unwrap_err(),
            ReconciliationError::UnknownTable {
                operation: Operation::Transfer,
                ..
            }
        ));
    }

    #[test]
    fn test_transfer_redeclaration_overwrites() {
        let a = phase(
            1,
            PhaseGuidelines::new()
                .with_create(create("Users", &[("Id", "int"), ("Name", "text")]))
                .with_transfer("Users", DataTransferDefinition::new().with_column("Id", "Id")),
        );
        let b = phase(
            2,
            PhaseGuidelines::new()
                .with_update(
                    TableUpdate::new("Users").with_rule(RuleUpdate::new("Name").with_value("''")),
                )
                .with_transfer("Users", DataTransferDefinition::new().with_column("Name", "Name")),
        );
        let map = DataTransactionMap::build([&a, &b]).unwrap();
        let transfer = map.transfer("Users").unwrap();
        assert!(transfer.references("Name"));
        assert!(!transfer.references("Id"));
    }

    #[test]
    fn test_cross_phase_create_is_implicit_update() {
        let a = phase(1, PhaseGuidelines::new().with_create(create("Users", &[("Id", "int")])));
        let b = phase(2, PhaseGuidelines::new().with_create(create("Users", &[("Id", "bigint")])));
        let map = DataTransactionMap::build([&a, &b]).unwrap();
        let rule = map.rule("Users", "Id").unwrap();
        assert_eq!(rule.current_type, "int");
        assert_eq!(rule.column_type, "bigint");
        assert_eq!(map.table("Users").unwrap().rules.len(), 1);
    }

    #[test]
    fn test_recreate_and_update_keep_phase_start_type() {
        let a = phase(1, PhaseGuidelines::new().with_create(create("Users", &[("Id", "int")])));
        let b = phase(
            2,
            PhaseGuidelines::new()
                .with_create(create("Users", &[("Id", "bigint")]))
                .with_update(TableUpdate::new("Users").with_rule(RuleUpdate::new("Id").with_value("0"))),
        );

        let mut seed = DataTransactionMap::build([&a]).unwrap();
        seed.settle();
        let map = DataTransactionMap::fold(seed, [&b]).unwrap();
        let rule = map.rule("Users", "Id").unwrap();
        assert_eq!(rule.current_type, "int");
        assert_eq!(rule.column_type, "bigint");
        assert_eq!(rule.value.as_deref(), Some("0"));
        assert!(rule.needs_cast());
    }

    #[test]
    fn test_two_updates_in_one_phase_keep_phase_start_type() {
        let a = phase(1, PhaseGuidelines::new().with_create(create("Users", &[("Id", "int")])));
        let b = phase(
            2,
            PhaseGuidelines::new()
                .with_update(TableUpdate::new("Users").with_rule(RuleUpdate::new("Id").with_type("bigint")))
                .with_update(TableUpdate::new("Users").with_rule(RuleUpdate::new("Id").with_type("numeric"))),
        );

        let mut seed = DataTransactionMap::build([&a]).unwrap();
        seed.settle();
        let map = DataTransactionMap::fold(seed, [&b]).unwrap();
        let rule = map.rule("Users", "Id").unwrap();
        assert_eq!(rule.current_type, "int");
        assert_eq!(rule.column_type, "numeric");
    }

    #[test]
    fn test_transfer_origin_follows_redeclaration() {
        let a = phase(
            1,
            PhaseGuidelines::new()
                .with_create(create("T", &[("Id", "int")]))
                .with_transfer("T", DataTransferDefinition::new().with_column("Id", "Id")),
        );
        let b = phase(2, PhaseGuidelines::new().with_delete(TableDelete::table("T")));
        let c = phase(
            3,
            PhaseGuidelines::new()
                .with_create(create("T", &[("Id", "int")]))
                .with_transfer("T", DataTransferDefinition::new().with_column("Id", "Id")),
        );

        let map = DataTransactionMap::build([&a, &b, &c]).unwrap();
        assert_eq!(map.transfer_origin("T"), Some(v(3)));

        let map = DataTransactionMap::build([&a, &b]).unwrap();
        assert_eq!(map.transfer_origin("T"), None);
    }

    #[test]
    fn test_before_positions_new_columns() {
        let a = phase(
            1,
            PhaseGuidelines::new().with_create(create("Users", &[("Id", "int"), ("Name", "text")])),
        );
        let b = phase(
            2,
            PhaseGuidelines::new().with_create(
                create("Users", &[("First", "text"), ("Last", "text")]).with_before("Name"),
            ),
        );
        let map = DataTransactionMap::build([&a, &b]).unwrap();
        let names: Vec<_> = map.table("Users").unwrap().column_names().collect();
        assert_eq!(names, vec!["Id", "First", "Last", "Name"]);
    }

    #[test]
    fn test_before_unknown_column_fails() {
        let a = phase(
            1,
            PhaseGuidelines::new()
                .with_create(create("Users", &[("Id", "int")]).with_before("Nope")),
        );
        assert!(DataTransactionMap::build([&a]).is_err());
    }

    #[test]
    fn test_fold_sorts_by_version() {
        let a = phase(1, PhaseGuidelines::new().with_create(create("Users", &[("Id", "int")])));
        let b = phase(
            2,
            PhaseGuidelines::new().with_delete(TableDelete::columns("Users", ["Id"])),
        );
        let map = DataTransactionMap::build([&b, &a]).unwrap();
        assert!(map.table("Users").unwrap().rules.is_empty());
    }

    #[test]
    fn test_fold_on_settled_seed() {
        let a = phase(
            1,
            PhaseGuidelines::new()
                .with_create(create("Users", &[("Id", "int")]))
                .with_transfer("Users", DataTransferDefinition::new().with_column("Id", "Id")),
        );
        let mut seed = DataTransactionMap::build([&a]).unwrap();
        seed.settle();
        assert!(seed.transfer("Users").is_none());

        let b = phase(
            2,
            PhaseGuidelines::new().with_update(
                TableUpdate::new("Users").with_rule(RuleUpdate::new("Id").with_type("bigint")),
            ),
        );
        let map = DataTransactionMap::fold(seed, [&b]).unwrap();
        let rule = map.rule("Users", "Id").unwrap();
        assert!(!rule.is_new);
        assert_eq!(rule.current_type, "int");
        assert_eq!(rule.column_type, "bigint");
    }
}
