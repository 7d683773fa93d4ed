//! Stratum PostgreSQL - schema ledger and migration target backed by sqlx.
//!
//! Every phase runs inside one database transaction: the phase's DDL script,
//! its data transfers and its ledger row commit together or not at all.

pub mod config;
pub mod target;

pub use config::LedgerConfig;
pub use target::PgTarget;
