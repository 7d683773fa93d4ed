//! Migration orchestration.
//!
//! This module turns a roadmap into applied database state:
//! - Planning against the schema ledger
//! - One transaction per phase (DDL script, data transfers, ledger row)
//! - Resume from the last recorded phase after a failure
//! - Cooperative cancellation between phases
//!
//! # Example
//!
//! ```ignore
//! use stratum_core::migration::{DirectoryScripts, Migrator, MigratorConfig};
//! use stratum_core::phase::Roadmap;
//!
//! let roadmap = Roadmap::load_dir("roadmap")?;
//! let scripts = Arc::new(DirectoryScripts::new("scripts"));
//! let mut migrator = Migrator::new(roadmap, scripts, target, MigratorConfig::default());
//!
//! let info = migrator.initialize(None).await?;
//! println!("{}", info.schema_changes);
//!
//! let report = migrator.migrate_data(&CancellationToken::new()).await?;
//! ```

pub mod executor;
pub mod ledger;
pub mod memory;
pub mod plan;
pub mod script;
pub mod transfer;

pub use executor::{
    verify_roadmap, Migrator, MigratorConfig, MigratorState, DEFAULT_BACKUP_SUFFIX,
};
pub use ledger::{MigrationTarget, PhaseTransaction, SchemaLedger, SchemaPhase};
pub use memory::{ExecutedStatement, FailurePoint, MemoryTarget};
pub use plan::{MigrationOperationInformation, MigrationReport, PhaseReport, PhaseSummary};
pub use script::{DirectoryScripts, MemoryScripts, ScriptSource};
pub use transfer::TransferStatement;
