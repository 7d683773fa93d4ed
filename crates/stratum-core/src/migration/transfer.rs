//! Rendering of data-transfer statements.
//!
//! A transfer copies rows from the pre-phase layout of a table into its new
//! layout:
//!
//! ```sql
//! INSERT INTO "Users" ("Id", "CreateDate")
//! SELECT "Id", CAST((CreateDate) AS timestamptz) FROM "Users__backup"
//! ```
//!
//! The source is the transfer script as a sub-select when one is given,
//! otherwise the backup relation the phase's DDL script leaves behind.

use crate::phase::DataTransferDefinition;
use crate::provider::Provider;
use crate::reconcile::TableRules;

/// A rendered transfer ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatement {
    /// Target table.
    pub table: String,
    /// SQL text.
    pub sql: String,
}

impl TransferStatement {
    /// Render the statement for one table.
    ///
    /// `rules` is the table's state right after the phase that carries the
    /// transfer; each target column's rule decides casts and defaults.
    pub fn render(
        rules: &TableRules,
        definition: &DataTransferDefinition,
        provider: Provider,
        backup_suffix: &str,
    ) -> Self {
        let table = &rules.name;

        let mut targets = Vec::with_capacity(definition.columns.len());
        let mut expressions = Vec::with_capacity(definition.columns.len());
        for column in &definition.columns {
            targets.push(provider.quote_ident(&column.target));
            expressions.push(Self::expression(rules, &column.target, &column.source, provider));
        }

        let source = match &definition.script {
            Some(script) => format!("({}) AS src", script.trim().trim_end_matches(';')),
            None => provider.quote_ident(&format!("{}{}", table, backup_suffix)),
        };

        let sql = format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            provider.quote_ident(table),
            targets.join(", "),
            expressions.join(", "),
            source
        );

        Self {
            table: table.clone(),
            sql,
        }
    }

    fn expression(rules: &TableRules, target: &str, source: &str, provider: Provider) -> String {
        let source = source.trim();
        // A bare identifier is quoted; anything else is used verbatim.
        let mut expr = if is_identifier(source) {
            provider.quote_ident(source)
        } else {
            source.to_string()
        };

        if let Some(rule) = rules.rule(target) {
            if rule.needs_cast() {
                expr = format!("CAST(({}) AS {})", expr, provider.map_type(&rule.column_type));
            }
            if let Some(value) = &rule.value {
                expr = format!("COALESCE({}, {})", expr, value);
            }
        }
        expr
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{
        ColumnDefinition, ColumnsDefinition, MigrationPhase, PhaseGuidelines, RuleUpdate,
        TableUpdate,
    };
    use crate::reconcile::DataTransactionMap;
    use crate::version::Version;

    fn users() -> DataTransactionMap {
        let init = MigrationPhase::new(Version::new(1, 0, 0), "init").with_guidelines(
            PhaseGuidelines::new().with_create(
                ColumnsDefinition::new("Users")
                    .with_column(ColumnDefinition::new("Id", "int"))
                    .with_column(ColumnDefinition::new("Name", "text"))
                    .with_column(ColumnDefinition::new("CreateDate", "timestamp")),
            ),
        );
        let mut map = DataTransactionMap::build([&init]).unwrap();
        map.settle();

        let change = MigrationPhase::new(Version::new(2, 0, 0), "change").with_guidelines(
            PhaseGuidelines::new().with_update(
                TableUpdate::new("Users")
                    .with_rule(RuleUpdate::new("CreateDate").with_type("timestamptz"))
                    .with_rule(RuleUpdate::new("Name").with_value("'unknown'")),
            ),
        );
        DataTransactionMap::fold(map, [&change]).unwrap()
    }

    #[test]
    fn test_render_from_backup() {
        let map = users();
        let definition = DataTransferDefinition::new()
            .with_column("Id", "Id")
            .with_column("Name", "Name")
            .with_column("CreateDate", "CreateDate");

        let stmt = TransferStatement::render(
            map.table("Users").unwrap(),
            &definition,
            Provider::Postgres,
            "__backup",
        );
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"Users\" (\"Id\", \"Name\", \"CreateDate\") \
             SELECT \"Id\", COALESCE(\"Name\", 'unknown'), CAST((\"CreateDate\") AS timestamptz) \
             FROM \"Users__backup\""
        );
    }

    #[test]
    fn test_render_with_script() {
        let map = users();
        let definition = DataTransferDefinition::new()
            .with_column("Id", "old_id + 1000")
            .with_script("SELECT * FROM legacy_users;");

        let stmt = TransferStatement::render(
            map.table("Users").unwrap(),
            &definition,
            Provider::Postgres,
            "__backup",
        );
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"Users\" (\"Id\") SELECT old_id + 1000 FROM (SELECT * FROM legacy_users) AS src"
        );
    }

    #[test]
    fn test_identifier_detection() {
        assert!(is_identifier("CreateDate"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("upper(Name)"));
        assert!(!is_identifier(""));
    }
}
