//! Output formatters for plans, reports and ledger listings.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use stratum_core::{
    DataTransactionMap, MigrationOperationInformation, MigrationPhase, MigrationReport,
    SchemaPhase,
};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format a migration plan.
    fn format_plan(&self, info: &MigrationOperationInformation) -> String;

    /// Format the outcome of a run.
    fn format_report(&self, report: &MigrationReport) -> String;

    /// Format applied ledger rows followed by pending roadmap phases.
    fn format_status(&self, applied: &[SchemaPhase], pending: &[&MigrationPhase]) -> String;

    /// Format the schema a roadmap ends at.
    fn format_schema(&self, schema: &DataTransactionMap) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_plan(&self, info: &MigrationOperationInformation) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec![
            "Current version".to_string(),
            info.current_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "none".to_string()),
        ]);
        table.add_row(vec!["Target version".to_string(), info.target_version.to_string()]);
        table.add_row(vec!["Latest version".to_string(), info.latest_version.to_string()]);
        table.add_row(vec![
            "Phases".to_string(),
            info.phases
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ]);
        table.add_row(vec!["Title".to_string(), info.title.clone()]);

        let mut output = table.to_string();
        if !info.description.is_empty() {
            output.push_str("\n\n");
            output.push_str(&info.description);
        }
        output.push_str("\n\n");
        output.push_str(info.schema_changes.trim_end());
        output
    }

    fn format_report(&self, report: &MigrationReport) -> String {
        if report.phases.is_empty() {
            return "No phases processed".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["Version", "Title", "Committed", "Rows", "Summary"]);
        for phase in &report.phases {
            table.add_row(vec![
                Cell::new(phase.version),
                Cell::new(&phase.title),
                Cell::new(if phase.committed { "yes" } else { "no" }),
                Cell::new(phase.transferred_rows),
                Cell::new(&phase.summary),
            ]);
        }

        let mut output = table.to_string();
        for phase in report.phases.iter().filter(|p| !p.committed) {
            for statement in &phase.transfer_statements {
                output.push_str(&format!("\n{}: {}", phase.version, statement));
            }
        }
        output
    }

    fn format_status(&self, applied: &[SchemaPhase], pending: &[&MigrationPhase]) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Version", "Title", "Applied", "Summary"]);
        for phase in applied {
            table.add_row(vec![
                Cell::new(phase.version),
                Cell::new(&phase.title),
                Cell::new(phase.applied.format("%Y-%m-%d %H:%M:%S")),
                Cell::new(&phase.summary),
            ]);
        }
        for phase in pending {
            table.add_row(vec![
                Cell::new(phase.version),
                Cell::new(&phase.title),
                Cell::new("pending"),
                Cell::new(""),
            ]);
        }

        format!(
            "{}\n{} applied, {} pending",
            table,
            applied.len(),
            pending.len()
        )
    }

    fn format_schema(&self, schema: &DataTransactionMap) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Table", "Column", "Type", "Default"]);
        for rules in schema.tables() {
            for rule in &rules.rules {
                table.add_row(vec![
                    rules.name.as_str(),
                    rule.column_name.as_str(),
                    rule.column_type.as_str(),
                    rule.value.as_deref().unwrap_or(""),
                ]);
            }
        }
        format!("{}\n{} table(s)", table, schema.table_count())
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_plan(&self, info: &MigrationOperationInformation) -> String {
        serde_json::to_string_pretty(info).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_report(&self, report: &MigrationReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_status(&self, applied: &[SchemaPhase], pending: &[&MigrationPhase]) -> String {
        let pending: Vec<_> = pending
            .iter()
            .map(|p| {
                serde_json::json!({
                    "version": p.version.to_string(),
                    "title": p.title,
                })
            })
            .collect();
        let value = serde_json::json!({
            "applied": applied,
            "pending": pending,
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_schema(&self, schema: &DataTransactionMap) -> String {
        let mut obj = serde_json::Map::new();
        for rules in schema.tables() {
            let columns: Vec<_> = rules
                .rules
                .iter()
                .map(|rule| {
                    serde_json::json!({
                        "name": rule.column_name,
                        "type": rule.column_type,
                        "value": rule.value,
                        "is_enum": rule.is_enum,
                    })
                })
                .collect();
            obj.insert(rules.name.clone(), serde_json::Value::Array(columns));
        }
        serde_json::to_string_pretty(&serde_json::Value::Object(obj))
            .unwrap_or_else(|_| "{}".to_string())
    }
}
