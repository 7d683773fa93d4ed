//! End-to-end tests: roadmap directory, script directory and an in-memory target.

use std::path::Path;
use std::sync::Arc;

use stratum_core::migration::{ExecutedStatement, FailurePoint};
use stratum_core::{
    DirectoryScripts, MemoryTarget, MigrationError, Migrator, MigratorConfig, Roadmap,
    SchemaLedger, Version,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Test context holding a project directory with `roadmap/` and `scripts/`.
struct TestContext {
    dir: TempDir,
    target: MemoryTarget,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("roadmap")).unwrap();
        std::fs::create_dir(dir.path().join("scripts")).unwrap();
        Self {
            dir,
            target: MemoryTarget::new().with_rows_per_transfer(3),
        }
    }

    fn phase(&self, version: &str, document: &str, script: &str) {
        let root = self.dir.path();
        std::fs::write(root.join("roadmap").join(format!("{version}.yaml")), document).unwrap();
        std::fs::write(root.join("scripts").join(format!("{version}.sql")), script).unwrap();
    }

    fn migrator(&self) -> Migrator {
        let root: &Path = self.dir.path();
        let roadmap = Roadmap::load_dir(root.join("roadmap")).unwrap();
        Migrator::new(
            roadmap,
            Arc::new(DirectoryScripts::new(root.join("scripts"))),
            Arc::new(self.target.clone()),
            MigratorConfig::default(),
        )
    }
}

fn v(s: &str) -> Version {
    s.parse().unwrap()
}

fn three_phase_project() -> TestContext {
    let ctx = TestContext::new();
    ctx.phase(
        "1.0.0",
        r#"
version: 1.0.0
title: Users
guidelines:
  create:
    Users:
      Id: int
      Name: text
      CreateDate: timestamp
"#,
        "CREATE TABLE \"Users\" (\"Id\" int, \"Name\" text, \"CreateDate\" timestamp);",
    );
    ctx.phase(
        "1.1.0",
        r#"
version: 1.1.0
title: Timezones
description: Store creation dates with a time zone
guidelines:
  update:
    Users:
      CreateDate: timestamptz
  transfer:
    Users:
      columns:
        Id: Id
        CreateDate: CreateDate
"#,
        "ALTER TABLE \"Users\" RENAME TO \"Users__backup\";",
    );
    ctx.phase(
        "2.0.0",
        r#"
version: 2.0.0
title: Drop names
guidelines:
  delete:
    Users: [Name]
"#,
        "ALTER TABLE \"Users\" DROP COLUMN \"Name\";",
    );
    ctx
}

#[tokio::test]
async fn test_full_roadmap_from_empty_database() {
    let ctx = three_phase_project();
    let mut migrator = ctx.migrator();

    let verified = migrator.verify().unwrap();
    let users = verified.table("Users").unwrap();
    assert_eq!(users.column_names().collect::<Vec<_>>(), vec!["Id", "CreateDate"]);

    let info = migrator.initialize(None).await.unwrap();
    assert_eq!(info.current_version, None);
    assert_eq!(info.target_version, v("2.0.0"));
    assert_eq!(info.title, "Users, Timezones, Drop names");
    assert!(info.description.contains("1.1.0: Store creation dates with a time zone"));

    let report = migrator.migrate_data(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.last_committed(), Some(v("2.0.0")));

    let ledger = ctx.target.list_applied_phases().await.unwrap();
    let versions: Vec<_> = ledger.iter().map(|p| p.version).collect();
    assert_eq!(versions, vec![v("1.0.0"), v("1.1.0"), v("2.0.0")]);
    assert_eq!(ledger[0].summary, "created 3 column(s) in 1 table(s)");

    let transfers: Vec<_> = ctx
        .target
        .executed()
        .into_iter()
        .filter_map(|s| match s {
            ExecutedStatement::Transfer { sql, .. } => Some(sql),
            _ => None,
        })
        .collect();
    assert_eq!(transfers.len(), 1);
    assert!(transfers[0].contains("FROM \"Users__backup\""));
}

#[tokio::test]
async fn test_partial_target_then_resume() {
    let ctx = three_phase_project();
    let mut migrator = ctx.migrator();

    let info = migrator.initialize(Some(v("1.0.0"))).await.unwrap();
    assert_eq!(info.phases, vec![v("1.0.0")]);
    migrator.migrate_data(&CancellationToken::new()).await.unwrap();

    let info = migrator.initialize(None).await.unwrap();
    assert_eq!(info.current_version, Some(v("1.0.0")));
    assert_eq!(info.phases, vec![v("1.1.0"), v("2.0.0")]);
    assert!(info.schema_changes.contains("~ table Users"));
    assert!(info.schema_changes.contains("- Name"));
}

#[tokio::test]
async fn test_failed_phase_keeps_earlier_phases() {
    let ctx = three_phase_project();
    ctx.target.fail_at(v("2.0.0"), FailurePoint::Script);
    let mut migrator = ctx.migrator();

    migrator.initialize(None).await.unwrap();
    let err = migrator
        .migrate_data(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Execution { .. }));
    assert_eq!(
        ctx.target.latest_applied_version().await.unwrap(),
        Some(v("1.1.0"))
    );

    ctx.target.clear_failure(v("2.0.0"));
    let info = migrator.initialize(None).await.unwrap();
    assert_eq!(info.phases, vec![v("2.0.0")]);
    migrator.migrate_data(&CancellationToken::new()).await.unwrap();
    assert_eq!(
        ctx.target.latest_applied_version().await.unwrap(),
        Some(v("2.0.0"))
    );
}

#[tokio::test]
async fn test_downgrade_is_rejected() {
    let ctx = three_phase_project();
    let mut migrator = ctx.migrator();
    migrator.initialize(None).await.unwrap();
    migrator.migrate_data(&CancellationToken::new()).await.unwrap();

    let err = migrator.initialize(Some(v("1.0.0"))).await.unwrap_err();
    assert!(matches!(err, MigrationError::InvalidState(_)));
    assert!(!err.is_benign());
}

#[tokio::test]
async fn test_contradictory_roadmap_fails_before_planning() {
    let ctx = TestContext::new();
    ctx.phase(
        "1.0.0",
        r#"
version: 1.0.0
title: Broken
guidelines:
  update:
    Users:
      Id: bigint
"#,
        "-- nothing",
    );
    let mut migrator = ctx.migrator();

    let err = migrator.initialize(None).await.unwrap_err();
    assert!(matches!(err, MigrationError::Reconciliation(_)));
    assert!(!ctx.target.ledger_table_created());
}

#[test]
fn test_invalid_document_reports_file() {
    let ctx = TestContext::new();
    std::fs::write(
        ctx.dir.path().join("roadmap").join("1.0.0.yaml"),
        "version: 1.0.0\nguidelines: {}\n",
    )
    .unwrap();

    let err = Roadmap::load_dir(ctx.dir.path().join("roadmap")).unwrap_err();
    match err {
        MigrationError::Validation { source_name, .. } => assert!(source_name.ends_with("1.0.0.yaml")),
        other => panic!("unexpected error: {other}"),
    }
}
