//! PostgreSQL target tests.
//!
//! These run only when `DATABASE_URL` points at a reachable database. Each
//! test works in its own schema and drops it afterwards.

use std::sync::Arc;

use stratum_core::phase::{ColumnDefinition, ColumnsDefinition, PhaseGuidelines};
use stratum_core::{
    MemoryScripts, MigrationError, MigrationPhase, Migrator, MigratorConfig, Roadmap,
    SchemaLedger, SchemaPhase, Version,
};
use stratum_pg::{LedgerConfig, PgTarget};
use tokio_util::sync::CancellationToken;

struct TestContext {
    target: PgTarget,
    schema: String,
}

impl TestContext {
    async fn new(name: &str) -> Option<Self> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let schema = format!("stratum_test_{}_{}", name, std::process::id());
        let config = LedgerConfig::default()
            .with_schema(schema.clone())
            .with_max_connections(2);
        let target = PgTarget::connect(&url, config).await.unwrap();
        sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", schema))
            .execute(target.pool())
            .await
            .unwrap();
        Some(Self { target, schema })
    }

    async fn cleanup(self) {
        sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", self.schema))
            .execute(self.target.pool())
            .await
            .unwrap();
    }
}

fn v(s: &str) -> Version {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_ledger_roundtrip() {
    let Some(ctx) = TestContext::new("ledger").await else {
        return;
    };
    let target = &ctx.target;

    target.ensure_ledger_table_exists().await.unwrap();
    target.ensure_ledger_table_exists().await.unwrap();
    assert_eq!(target.latest_applied_version().await.unwrap(), None);

    for version in ["1.2.0", "1.10.0", "1.9.3"] {
        target
            .record_applied(&SchemaPhase::new(v(version), "t", None, "no changes"))
            .await
            .unwrap();
    }

    // Numeric ordering, not text ordering.
    assert_eq!(target.latest_applied_version().await.unwrap(), Some(v("1.10.0")));
    let versions: Vec<_> = target
        .list_applied_phases()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.version)
        .collect();
    assert_eq!(versions, vec![v("1.2.0"), v("1.9.3"), v("1.10.0")]);

    let duplicate = target
        .record_applied(&SchemaPhase::new(v("1.2.0"), "again", None, ""))
        .await;
    assert!(matches!(duplicate, Err(MigrationError::Ledger(_))));

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_failed_phase_rolls_back_ddl_and_ledger() {
    let Some(ctx) = TestContext::new("rollback").await else {
        return;
    };
    let schema = ctx.schema.clone();

    let phases = vec![
        MigrationPhase::new(v("1.0.0"), "items").with_guidelines(
            PhaseGuidelines::new().with_create(
                ColumnsDefinition::new("items").with_column(ColumnDefinition::new("id", "int")),
            ),
        ),
        MigrationPhase::new(v("1.1.0"), "broken").with_guidelines(
            PhaseGuidelines::new().with_create(
                ColumnsDefinition::new("other").with_column(ColumnDefinition::new("id", "int")),
            ),
        ),
    ];
    let scripts = MemoryScripts::new()
        .with_script(
            v("1.0.0"),
            format!("CREATE TABLE \"{schema}\".items (id int); INSERT INTO \"{schema}\".items VALUES (1);"),
        )
        .with_script(
            v("1.1.0"),
            format!("CREATE TABLE \"{schema}\".other (id int); SELECT * FROM missing_relation;"),
        );

    let mut migrator = Migrator::new(
        Roadmap::new(phases).unwrap(),
        Arc::new(scripts),
        Arc::new(ctx.target.clone()),
        MigratorConfig::default(),
    );
    migrator.initialize(None).await.unwrap();
    let err = migrator
        .migrate_data(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Execution { .. }));

    assert_eq!(
        ctx.target.latest_applied_version().await.unwrap(),
        Some(v("1.0.0"))
    );
    let other_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = 'other')",
    )
    .bind(&schema)
    .fetch_one(ctx.target.pool())
    .await
    .unwrap();
    assert!(!other_exists);

    // Every statement of the committed multi-statement script ran.
    let items: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM \"{schema}\".items"))
        .fetch_one(ctx.target.pool())
        .await
        .unwrap();
    assert_eq!(items, 1);

    ctx.cleanup().await;
}
