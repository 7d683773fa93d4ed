//! Ledger location and connection settings.

use stratum_core::MigrationError;

/// Default schema holding the ledger table.
pub const DEFAULT_LEDGER_SCHEMA: &str = "public";

/// Default ledger table name.
pub const DEFAULT_LEDGER_TABLE: &str = "__schema_phases";

/// Default maximum pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Where the ledger lives and how the pool is sized.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Schema holding the ledger table; created if missing.
    pub schema: String,
    /// Ledger table name.
    pub table: String,
    /// Maximum pool connections.
    pub max_connections: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_LEDGER_SCHEMA.to_string(),
            table: DEFAULT_LEDGER_TABLE.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl LedgerConfig {
    /// Set the ledger schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Set the ledger table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the maximum pool size.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.schema.trim().is_empty() {
            return Err(MigrationError::InvalidState(
                "ledger schema must not be empty".to_string(),
            ));
        }
        if self.table.trim().is_empty() {
            return Err(MigrationError::InvalidState(
                "ledger table must not be empty".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(MigrationError::InvalidState(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
