use async_trait::async_trait;

use crate::error::Result;
use crate::schema::EntityDefinition;
use crate::types::Row;

/// A live connection to one destination, held for a reset-and-load sequence.
///
/// Implementations track at most one physical transaction. Reentrancy is
/// layered on top by [`crate::TransactionScope`].
#[async_trait]
pub trait Session: Send {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Whether a physical transaction is currently open.
    fn in_transaction(&self) -> bool;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Discard any open transaction without waiting on the destination.
    ///
    /// Called when a scope is dropped before it was committed or rolled back.
    fn abandon(&mut self);

    /// Flag the open transaction so the outermost scope rolls back instead of
    /// committing.
    fn mark_rollback_only(&mut self);

    fn is_rollback_only(&self) -> bool;

    /// Drop the entity's table if it exists.
    async fn drop_entity(&mut self, definition: &EntityDefinition) -> Result<()>;

    async fn create_entity(&mut self, definition: &EntityDefinition) -> Result<()>;

    /// Insert rows in order, returning the number inserted.
    async fn insert_rows(&mut self, definition: &EntityDefinition, rows: &[Row]) -> Result<u64>;

    /// Make writes so far visible and constraint-checked for later statements
    /// of the same transaction, without committing.
    async fn flush(&mut self) -> Result<()>;

    async fn count_rows(&mut self, definition: &EntityDefinition) -> Result<u64>;
}
