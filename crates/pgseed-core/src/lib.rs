//! Core contracts for pgseed.
//!
//! This crate defines entity definitions, the dependency graph and load plan,
//! the session and reentrant transaction scope contracts, and the two core
//! operations built on them: [`reset`] (schema lifecycle) and [`load`]
//! (dependency-ordered, atomic insertion).

pub mod constraints;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod loader;
pub mod memory;
pub mod plan;
pub mod redaction;
pub mod schema;
pub mod session;
pub mod transaction;
pub mod types;
pub mod validation;

pub use constraints::{ForeignKey, PrimaryKey, RelationshipKind};
pub use error::{Error, LoadError, Result, SchemaError};
pub use graph::{DependencyReport, DependencySummary, build_dependency_report, creation_order};
pub use lifecycle::{ResetPlan, ResetReport, plan_reset, reset};
pub use loader::{LoadReport, TierReport, load, reset_and_load};
pub use memory::MemorySession;
pub use plan::{Batch, LoadPlan, PlannedBatch, Tier, TierSummary, plan_load};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use schema::{Column, Dataset, EntityDefinition, EntityKind, find_definition};
pub use session::Session;
pub use transaction::TransactionScope;
pub use types::{ColumnType, Row, Value};
pub use validation::{validate_batch, validate_definitions};
