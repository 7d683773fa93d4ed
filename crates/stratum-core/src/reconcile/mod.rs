//! Reconciliation engine.
//!
//! Folds an ordered list of phases into one cumulative
//! [`DataTransactionMap`], rejecting roadmaps that contradict themselves:
//!
//! - `update`/`delete` may only reference tables and columns that exist in
//!   the map accumulated so far (including columns created by the same phase)
//! - deleting a whole table discards its pending transfer
//! - deleting a column a pending transfer writes is an error
//!
//! Within a phase the collections are applied in a fixed order: create,
//! update, delete, transfer.

pub mod diff;
pub mod map;
pub mod rule;

pub use diff::{ColumnChange, SchemaChanges, TableChange};
pub use map::{DataTransactionMap, TableRules};
pub use rule::DataTransactionRule;
