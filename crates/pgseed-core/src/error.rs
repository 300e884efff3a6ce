use thiserror::Error;

/// Core error type shared across pgseed crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A statement was rejected by the destination or the connection failed.
    #[error("database error: {0}")]
    Db(String),
    /// Entity definitions or batches violate internal invariants.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
    /// The insert-dependency graph contains a cycle.
    #[error("dependency cycle between entities: {}", .0.join(", "))]
    Cycle(Vec<String>),
    /// Schema reset failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A tiered load was aborted and rolled back.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Begin, commit or rollback failed.
    #[error("transaction error: {0}")]
    Transaction(String),
}

/// Failures raised by the schema lifecycle manager.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid dataset definitions: {0}")]
    Invalid(#[source] Box<Error>),
    #[error("destination unreachable: {0}")]
    Unreachable(String),
    #[error("failed to drop `{entity}`: {cause}")]
    Drop {
        entity: String,
        #[source]
        cause: Box<Error>,
    },
    #[error("failed to create `{entity}`: {cause}")]
    Create {
        entity: String,
        #[source]
        cause: Box<Error>,
    },
    /// The destination refused to commit the reset.
    #[error("failed to commit schema reset: {0}")]
    Commit(#[source] Box<Error>),
}

/// Insert failure scoped to the tier and batch that triggered the abort.
///
/// `batch` is the position of the offending batch in the order the caller
/// supplied it, not its position within the tier.
#[derive(Debug, Error)]
#[error("load aborted at tier {tier}, batch {batch} (`{entity}`): {cause}")]
pub struct LoadError {
    pub tier: usize,
    pub batch: usize,
    pub entity: String,
    #[source]
    pub cause: Box<Error>,
}

/// Convenience alias for results returned by pgseed crates.
pub type Result<T> = std::result::Result<T, Error>;
