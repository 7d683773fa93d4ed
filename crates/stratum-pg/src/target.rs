//! PostgreSQL migration target.

use crate::config::LedgerConfig;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Executor, PgConnection, PgPool, Postgres, Row, Transaction};
use stratum_core::{
    MigrationError, MigrationTarget, PhaseTransaction, Provider, SchemaLedger, SchemaPhase,
    Version,
};

/// A PostgreSQL database with a schema ledger.
#[derive(Debug, Clone)]
pub struct PgTarget {
    pool: PgPool,
    config: LedgerConfig,
    /// Quoted `"schema"."table"`.
    ledger: String,
}

impl PgTarget {
    /// Connect to `database_url` and use the ledger described by `config`.
    pub async fn connect(database_url: &str, config: LedgerConfig) -> Result<Self, MigrationError> {
        config.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(database_url)
            .await
            .map_err(|e| MigrationError::Ledger(format!("failed to connect: {}", e)))?;
        tracing::debug!(
            schema = %config.schema,
            table = %config.table,
            "connected to postgres"
        );
        Ok(Self::from_pool(pool, config))
    }

    /// Use an existing pool.
    pub fn from_pool(pool: PgPool, config: LedgerConfig) -> Self {
        let provider = Provider::Postgres;
        let ledger = format!(
            "{}.{}",
            provider.quote_ident(&config.schema),
            provider.quote_ident(&config.table)
        );
        Self {
            pool,
            config,
            ledger,
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The ledger configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (version, title, description, summary, applied) \
             VALUES ($1, $2, $3, $4, $5)",
            self.ledger
        )
    }

    fn phase_from_row(row: &PgRow) -> Result<SchemaPhase, MigrationError> {
        let version: String = row.try_get("version").map_err(ledger_error)?;
        let applied: chrono::NaiveDateTime = row.try_get("applied").map_err(ledger_error)?;
        Ok(SchemaPhase {
            version: parse_version(&version)?,
            title: row.try_get("title").map_err(ledger_error)?,
            description: row.try_get("description").map_err(ledger_error)?,
            summary: row.try_get("summary").map_err(ledger_error)?,
            applied: applied.and_utc(),
        })
    }
}

fn ledger_error(e: sqlx::Error) -> MigrationError {
    MigrationError::Ledger(e.to_string())
}

fn parse_version(s: &str) -> Result<Version, MigrationError> {
    s.parse()
        .map_err(|e| MigrationError::Ledger(format!("corrupt ledger row: {}", e)))
}

#[async_trait]
impl SchemaLedger for PgTarget {
    async fn ensure_ledger_table_exists(&self) -> Result<(), MigrationError> {
        let schema = Provider::Postgres.quote_ident(&self.config.schema);
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
            .execute(&self.pool)
            .await
            .map_err(ledger_error)?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version varchar(16) PRIMARY KEY,
                title text NOT NULL,
                description text,
                summary text NOT NULL,
                applied timestamp NOT NULL DEFAULT now()
            )",
            self.ledger
        ))
        .execute(&self.pool)
        .await
        .map_err(ledger_error)?;

        tracing::debug!(ledger = %self.ledger, "ledger table ready");
        Ok(())
    }

    async fn latest_applied_version(&self) -> Result<Option<Version>, MigrationError> {
        // Versions are stored as text, so the ordering is done here.
        let rows = sqlx::query(&format!("SELECT version FROM {}", self.ledger))
            .fetch_all(&self.pool)
            .await
            .map_err(ledger_error)?;

        let mut latest = None;
        for row in rows {
            let text: String = row.try_get("version").map_err(ledger_error)?;
            let version = parse_version(&text)?;
            latest = latest.max(Some(version));
        }
        Ok(latest)
    }

    async fn list_applied_phases(&self) -> Result<Vec<SchemaPhase>, MigrationError> {
        let rows = sqlx::query(&format!(
            "SELECT version, title, description, summary, applied FROM {}",
            self.ledger
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(ledger_error)?;

        let mut phases = rows
            .iter()
            .map(Self::phase_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        phases.sort_by_key(|p| p.version);
        Ok(phases)
    }

    async fn record_applied(&self, phase: &SchemaPhase) -> Result<(), MigrationError> {
        bind_phase(sqlx::query(&self.insert_sql()), phase)
            .execute(&self.pool)
            .await
            .map_err(ledger_error)?;
        Ok(())
    }
}

#[async_trait]
impl MigrationTarget for PgTarget {
    async fn begin_phase(
        &self,
        version: Version,
    ) -> Result<Box<dyn PhaseTransaction>, MigrationError> {
        let tx = self.pool.begin().await.map_err(|e| MigrationError::Execution {
            version,
            message: format!("failed to begin transaction: {}", e),
        })?;
        Ok(Box::new(PgPhaseTransaction {
            tx,
            version,
            insert_sql: self.insert_sql(),
        }))
    }
}

fn bind_phase<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    phase: &SchemaPhase,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(phase.version.to_string())
        .bind(phase.title.clone())
        .bind(phase.description.clone())
        .bind(phase.summary.clone())
        .bind(phase.applied.naive_utc())
}

/// One phase's database transaction.
struct PgPhaseTransaction {
    tx: Transaction<'static, Postgres>,
    version: Version,
    insert_sql: String,
}

fn execution_error(version: Version, e: sqlx::Error) -> MigrationError {
    MigrationError::Execution {
        version,
        message: e.to_string(),
    }
}

#[async_trait]
impl PhaseTransaction for PgPhaseTransaction {
    async fn execute_script(&mut self, script: &str) -> Result<(), MigrationError> {
        if script.trim().is_empty() {
            return Ok(());
        }
        let version = self.version;
        // Scripts hold several statements, so they go through the simple protocol.
        let conn: &mut PgConnection = &mut self.tx;
        conn.execute(sqlx::raw_sql(script))
            .await
            .map_err(|e| execution_error(version, e))?;
        Ok(())
    }

    async fn execute_transfer(&mut self, statement: &str) -> Result<u64, MigrationError> {
        let version = self.version;
        let result = sqlx::query(statement)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| execution_error(version, e))?;
        Ok(result.rows_affected())
    }

    async fn record_applied(&mut self, phase: &SchemaPhase) -> Result<(), MigrationError> {
        bind_phase(sqlx::query(&self.insert_sql), phase)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| MigrationError::Ledger(e.to_string()))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), MigrationError> {
        let PgPhaseTransaction { tx, version, .. } = *self;
        tx.commit().await.map_err(|e| MigrationError::Execution {
            version,
            message: format!("commit failed: {}", e),
        })
    }

    async fn rollback(self: Box<Self>) -> Result<(), MigrationError> {
        let PgPhaseTransaction { tx, version, .. } = *self;
        tx.rollback().await.map_err(|e| MigrationError::Execution {
            version,
            message: format!("rollback failed: {}", e),
        })
    }
}
