//! Subcommand implementations.

use std::sync::Arc;

use stratum_core::{
    verify_roadmap, DirectoryScripts, MigrationError, Migrator, Roadmap, SchemaLedger, Version,
};
use stratum_pg::PgTarget;
use tokio_util::sync::CancellationToken;

use crate::config::CliConfig;
use crate::error::CliError;
use crate::formatter::{create_formatter, OutputFormat};
use crate::output::Printer;

/// Shared state for one CLI invocation.
pub struct Context {
    pub config: CliConfig,
    pub printer: Printer,
}

impl Context {
    /// Create a context.
    pub fn new(config: CliConfig) -> Self {
        let printer = Printer::new(config.prefix_output);
        Self { config, printer }
    }

    fn load_roadmap(&self) -> Result<Roadmap, CliError> {
        let roadmap = Roadmap::load_dir(&self.config.roadmap_dir)?;
        tracing::debug!(
            path = %self.config.roadmap_dir.display(),
            phases = roadmap.len(),
            "roadmap loaded"
        );
        Ok(roadmap)
    }

    fn scripts(&self) -> DirectoryScripts {
        DirectoryScripts::new(&self.config.scripts_dir)
    }

    async fn connect(&self) -> Result<PgTarget, CliError> {
        let url = self
            .config
            .database_url
            .as_deref()
            .ok_or(CliError::MissingDatabaseUrl)?;
        Ok(PgTarget::connect(url, self.config.ledger.clone()).await?)
    }
}

/// `stratum verify`: fold the roadmap and check scripts offline.
pub fn verify(ctx: &Context, format: OutputFormat) -> Result<(), CliError> {
    let roadmap = ctx.load_roadmap()?;
    let schema = verify_roadmap(&roadmap, &ctx.scripts())?;

    ctx.printer.info(&format!(
        "roadmap is consistent: {} phase(s), latest {}",
        roadmap.len(),
        display_version(roadmap.latest_version())
    ));
    ctx.printer.data(&create_formatter(format).format_schema(&schema));
    Ok(())
}

/// `stratum plan`: plan a run without applying it.
pub async fn plan(
    ctx: &Context,
    target_version: Option<Version>,
    format: OutputFormat,
) -> Result<(), CliError> {
    let roadmap = ctx.load_roadmap()?;
    let target = ctx.connect().await?;
    let mut migrator = Migrator::new(
        roadmap,
        Arc::new(ctx.scripts()),
        Arc::new(target),
        ctx.config.migrator_config(false),
    );

    let info = migrator.initialize(target_version).await?;
    ctx.printer.data(&create_formatter(format).format_plan(&info));
    Ok(())
}

/// `stratum status`: list applied and pending phases.
pub async fn status(ctx: &Context, format: OutputFormat) -> Result<(), CliError> {
    let roadmap = ctx.load_roadmap()?;
    let target = ctx.connect().await?;

    target.ensure_ledger_table_exists().await?;
    let applied = target.list_applied_phases().await?;
    let current = applied.iter().map(|p| p.version).max();
    let pending: Vec<_> = roadmap
        .phases()
        .iter()
        .filter(|p| current.map_or(true, |c| p.version > c))
        .collect();

    ctx.printer
        .data(&create_formatter(format).format_status(&applied, &pending));
    Ok(())
}

/// `stratum migrate`: apply pending phases.
pub async fn migrate(
    ctx: &Context,
    target_version: Option<Version>,
    no_build: bool,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let roadmap = ctx.load_roadmap()?;
    let scripts = ctx.scripts();

    if !no_build {
        verify_roadmap(&roadmap, &scripts)?;
        ctx.printer
            .info(&format!("roadmap checked: {} phase(s)", roadmap.len()));
    }

    let target = ctx.connect().await?;
    let mut migrator = Migrator::new(
        roadmap,
        Arc::new(scripts),
        Arc::new(target),
        ctx.config.migrator_config(dry_run),
    );

    let info = match migrator.initialize(target_version).await {
        Ok(info) => info,
        Err(e @ MigrationError::NoPendingMigrations { .. }) => {
            ctx.printer.info(&e.to_string());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    ctx.printer.info(&format!(
        "migrating from {} to {} ({} phase(s))",
        display_version(info.current_version),
        info.target_version,
        info.phases.len()
    ));
    ctx.printer.data(info.schema_changes.trim_end());

    let report = migrator.migrate_data(cancel).await?;
    ctx.printer
        .data(&create_formatter(OutputFormat::Table).format_report(&report));

    if dry_run {
        ctx.printer.info("dry run complete, nothing was applied");
    } else {
        ctx.printer.info(&format!(
            "database is at {}",
            display_version(report.last_committed())
        ));
    }
    Ok(())
}

fn display_version(version: Option<Version>) -> String {
    version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none".to_string())
}
