//! In-process destination with Postgres-like transaction semantics.
//!
//! Rows inserted inside a transaction stay pending until the next flush, and
//! foreign keys are checked against flushed rows only, so a loader that skips
//! a flush between dependent tiers fails here. Self references are the
//! exception and also see the table's own unflushed rows. A failed statement aborts the
//! open transaction, and DDL is transactional. Outside a transaction every
//! statement autocommits.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::schema::EntityDefinition;
use crate::session::Session;
use crate::types::{Row, Value};

const ABORTED: &str =
    "current transaction is aborted, commands ignored until end of transaction block";

#[derive(Debug, Clone, Default)]
struct Catalog {
    tables: BTreeMap<String, MemoryTable>,
}

#[derive(Debug, Clone)]
struct MemoryTable {
    definition: EntityDefinition,
    rows: Vec<Row>,
}

#[derive(Debug)]
struct OpenTransaction {
    catalog: Catalog,
    pending: Vec<(String, Row)>,
    aborted: bool,
}

impl OpenTransaction {
    fn flush(&mut self) {
        for (entity, row) in self.pending.drain(..) {
            if let Some(table) = self.catalog.tables.get_mut(&entity) {
                table.rows.push(row);
            }
        }
    }
}

/// Destination kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemorySession {
    committed: Catalog,
    open: Option<OpenTransaction>,
    rollback_only: bool,
    offline: bool,
    failing_entities: BTreeSet<String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a lost connection: every statement and `begin` fails.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Make every insert into `entity` fail.
    pub fn fail_inserts_into(&mut self, entity: impl Into<String>) {
        self.failing_entities.insert(entity.into());
    }

    /// Committed rows of `entity`, or `None` when the table does not exist.
    pub fn rows(&self, entity: &str) -> Option<&[Row]> {
        self.committed
            .tables
            .get(entity)
            .map(|table| table.rows.as_slice())
    }

    /// Committed table definitions, keyed by name.
    pub fn schema(&self) -> BTreeMap<String, EntityDefinition> {
        self.committed
            .tables
            .iter()
            .map(|(name, table)| (name.clone(), table.definition.clone()))
            .collect()
    }

    /// Committed rows of every table, keyed by name.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Row>> {
        self.committed
            .tables
            .iter()
            .map(|(name, table)| (name.clone(), table.rows.clone()))
            .collect()
    }

    fn statement<T>(
        &mut self,
        op: impl FnOnce(&mut Catalog, Option<&mut Vec<(String, Row)>>) -> Result<T>,
    ) -> Result<T> {
        if self.offline {
            return Err(Error::Db("connection refused".to_string()));
        }

        match self.open.as_mut() {
            Some(tx) if tx.aborted => Err(Error::Db(ABORTED.to_string())),
            Some(tx) => {
                let result = op(&mut tx.catalog, Some(&mut tx.pending));
                if result.is_err() {
                    tx.aborted = true;
                }
                result
            }
            None => op(&mut self.committed, None),
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    fn engine(&self) -> &'static str {
        "memory"
    }

    fn in_transaction(&self) -> bool {
        self.open.is_some()
    }

    async fn begin(&mut self) -> Result<()> {
        if self.offline {
            return Err(Error::Db("connection refused".to_string()));
        }
        if self.open.is_some() {
            return Err(Error::Transaction(
                "there is already a transaction in progress".to_string(),
            ));
        }

        self.open = Some(OpenTransaction {
            catalog: self.committed.clone(),
            pending: Vec::new(),
            aborted: false,
        });
        self.rollback_only = false;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut tx = self
            .open
            .take()
            .ok_or_else(|| Error::Transaction("there is no transaction in progress".to_string()))?;
        self.rollback_only = false;

        if tx.aborted {
            return Err(Error::Transaction(
                "transaction was aborted and has been rolled back".to_string(),
            ));
        }

        tx.flush();
        self.committed = tx.catalog;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.abandon();
        Ok(())
    }

    fn abandon(&mut self) {
        self.open = None;
        self.rollback_only = false;
    }

    fn mark_rollback_only(&mut self) {
        if self.open.is_some() {
            self.rollback_only = true;
        }
    }

    fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    async fn drop_entity(&mut self, definition: &EntityDefinition) -> Result<()> {
        let name = definition.name.clone();
        self.statement(|catalog, pending| {
            if !catalog.tables.contains_key(&name) {
                return Ok(());
            }

            let dependents: Vec<&str> = catalog
                .tables
                .values()
                .filter(|table| table.definition.name != name)
                .filter(|table| table.definition.dependencies().any(|dep| dep == name))
                .map(|table| table.definition.name.as_str())
                .collect();
            if !dependents.is_empty() {
                return Err(Error::Db(format!(
                    "cannot drop table {name} because other objects depend on it: {}",
                    dependents.join(", ")
                )));
            }

            catalog.tables.remove(&name);
            if let Some(pending) = pending {
                pending.retain(|(entity, _)| *entity != name);
            }
            Ok(())
        })
    }

    async fn create_entity(&mut self, definition: &EntityDefinition) -> Result<()> {
        let definition = definition.clone();
        self.statement(move |catalog, _| {
            if catalog.tables.contains_key(&definition.name) {
                return Err(Error::Db(format!(
                    "relation \"{}\" already exists",
                    definition.name
                )));
            }
            if let Some(missing) = definition
                .dependencies()
                .find(|dep| !catalog.tables.contains_key(*dep))
            {
                return Err(Error::Db(format!("relation \"{missing}\" does not exist")));
            }

            catalog.tables.insert(
                definition.name.clone(),
                MemoryTable {
                    definition,
                    rows: Vec::new(),
                },
            );
            Ok(())
        })
    }

    async fn insert_rows(&mut self, definition: &EntityDefinition, rows: &[Row]) -> Result<u64> {
        let name = definition.name.clone();
        let injected = self.failing_entities.contains(&name);

        self.statement(|catalog, pending| {
            if injected {
                return Err(Error::Db(format!("injected failure inserting into {name}")));
            }
            let table = catalog
                .tables
                .get(&name)
                .ok_or_else(|| Error::Db(format!("relation \"{name}\" does not exist")))?;

            let pending_rows: Vec<&Row> = pending
                .as_deref()
                .map(|pending| {
                    pending
                        .iter()
                        .filter(|(entity, _)| *entity == name)
                        .map(|(_, row)| row)
                        .collect()
                })
                .unwrap_or_default();

            for (offset, row) in rows.iter().enumerate() {
                check_row(catalog, table, &pending_rows, rows, offset, row)?;
            }

            match pending {
                Some(pending) => {
                    pending.extend(rows.iter().map(|row| (name.clone(), row.clone())));
                }
                None => {
                    if let Some(table) = catalog.tables.get_mut(&name) {
                        table.rows.extend(rows.iter().cloned());
                    }
                }
            }
            Ok(rows.len() as u64)
        })
    }

    async fn flush(&mut self) -> Result<()> {
        self.statement(|_, _| Ok(()))?;
        if let Some(tx) = self.open.as_mut() {
            tx.flush();
        }
        Ok(())
    }

    async fn count_rows(&mut self, definition: &EntityDefinition) -> Result<u64> {
        let name = definition.name.clone();
        self.statement(|catalog, pending| {
            let table = catalog
                .tables
                .get(&name)
                .ok_or_else(|| Error::Db(format!("relation \"{name}\" does not exist")))?;
            let unflushed = pending
                .map(|pending| pending.iter().filter(|(entity, _)| *entity == name).count())
                .unwrap_or(0);
            Ok((table.rows.len() + unflushed) as u64)
        })
    }
}

/// Statement-level checks for one row: columns, NOT NULL, types, primary key
/// uniqueness and foreign keys.
///
/// Foreign keys see flushed rows only. Self references additionally see the
/// table's own unflushed rows and every row of the same statement, matching
/// end-of-statement constraint checks.
fn check_row(
    catalog: &Catalog,
    table: &MemoryTable,
    pending: &[&Row],
    statement: &[Row],
    offset: usize,
    row: &Row,
) -> Result<()> {
    let definition = &table.definition;
    let name = &definition.name;

    for column in row.columns() {
        if definition.column(column).is_none() {
            return Err(Error::Db(format!(
                "column \"{column}\" of relation \"{name}\" does not exist"
            )));
        }
    }

    for column in &definition.columns {
        let value = row.get(&column.name);
        if value.is_null() && !column.is_nullable {
            return Err(Error::Db(format!(
                "null value in column \"{}\" of relation \"{name}\" violates not-null constraint",
                column.name
            )));
        }
        if !value.fits(column.column_type) {
            return Err(Error::Db(format!(
                "column \"{}\" is of type {} but expression is of type {}",
                column.name,
                column.column_type.sql_name(),
                value.type_name()
            )));
        }
    }

    let pk_columns = &definition.primary_key.columns;
    let key = row.key(pk_columns);
    let duplicate = table
        .rows
        .iter()
        .chain(pending.iter().copied())
        .chain(statement[..offset].iter())
        .any(|existing| existing.key(pk_columns) == key);
    if duplicate {
        return Err(Error::Db(format!(
            "duplicate key value violates unique constraint \"{}\": key ({})=({}) already exists",
            definition.primary_key.constraint_name(name),
            pk_columns.join(", "),
            join_values(&key)
        )));
    }

    for fk in &definition.foreign_keys {
        let values = row.key(&fk.columns);
        if values.iter().any(Value::is_null) {
            continue;
        }

        let referenced = catalog.tables.get(&fk.referenced_entity).ok_or_else(|| {
            Error::Db(format!("relation \"{}\" does not exist", fk.referenced_entity))
        })?;
        let (own_pending, own_statement): (&[&Row], &[Row]) = if fk.is_self_reference(name) {
            (pending, statement)
        } else {
            (&[], &[])
        };
        let found = referenced
            .rows
            .iter()
            .chain(own_pending.iter().copied())
            .chain(own_statement.iter())
            .any(|candidate| candidate.key(&fk.referenced_columns) == values);

        if !found {
            return Err(Error::Db(format!(
                "insert or update on table \"{name}\" violates foreign key constraint \"{}\": \
                 key ({})=({}) is not present in table \"{}\"",
                fk.constraint_name(name),
                fk.columns.join(", "),
                join_values(&values),
                fk.referenced_entity
            )));
        }
    }

    Ok(())
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ForeignKey;
    use crate::schema::Column;
    use crate::types::ColumnType;

    fn parent() -> EntityDefinition {
        EntityDefinition::new("parents")
            .with_column(Column::new("id", ColumnType::Text))
            .with_primary_key(&["id"])
    }

    fn child() -> EntityDefinition {
        EntityDefinition::new("children")
            .with_column(Column::new("id", ColumnType::Text))
            .with_column(Column::new("parent_id", ColumnType::Text))
            .with_primary_key(&["id"])
            .with_foreign_key(ForeignKey::new("parent_id", "parents", "id"))
    }

    async fn with_tables() -> MemorySession {
        let mut session = MemorySession::new();
        session.create_entity(&parent()).await.expect("create parents");
        session.create_entity(&child()).await.expect("create children");
        session
    }

    #[tokio::test]
    async fn unflushed_parents_are_invisible_to_foreign_keys() {
        let mut session = with_tables().await;
        session.begin().await.expect("begin");
        session
            .insert_rows(&parent(), &[Row::new().with("id", "p1")])
            .await
            .expect("insert parent");

        let err = session
            .insert_rows(&child(), &[Row::new().with("id", "c1").with("parent_id", "p1")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("children_parent_id_fkey"));

        let err = session.flush().await.unwrap_err();
        assert!(err.to_string().contains("current transaction is aborted"));
        assert!(session.commit().await.is_err());
        assert_eq!(session.rows("parents").map(<[Row]>::len), Some(0));
    }

    #[tokio::test]
    async fn flushed_parents_satisfy_foreign_keys() {
        let mut session = with_tables().await;
        session.begin().await.expect("begin");
        session
            .insert_rows(&parent(), &[Row::new().with("id", "p1")])
            .await
            .expect("insert parent");
        session.flush().await.expect("flush");
        session
            .insert_rows(&child(), &[Row::new().with("id", "c1").with("parent_id", "p1")])
            .await
            .expect("insert child");
        assert_eq!(session.count_rows(&child()).await.expect("count"), 1);
        assert_eq!(session.rows("children").map(<[Row]>::len), Some(0));

        session.commit().await.expect("commit");
        assert_eq!(session.rows("children").map(<[Row]>::len), Some(1));
    }

    #[tokio::test]
    async fn dropping_a_referenced_table_is_rejected() {
        let mut session = with_tables().await;
        let err = session.drop_entity(&parent()).await.unwrap_err();
        assert!(err.to_string().contains("other objects depend on it"));

        session.drop_entity(&child()).await.expect("drop child");
        session.drop_entity(&parent()).await.expect("drop parent");
        session.drop_entity(&parent()).await.expect("drop is idempotent");
        assert!(session.schema().is_empty());
    }

    #[tokio::test]
    async fn duplicate_primary_keys_are_rejected() {
        let mut session = with_tables().await;
        let rows = [Row::new().with("id", "p1"), Row::new().with("id", "p1")];
        let err = session.insert_rows(&parent(), &rows).await.unwrap_err();
        assert!(err.to_string().contains("parents_pkey"));
        assert!(err.to_string().contains("key (id)=(p1) already exists"));
    }

    #[tokio::test]
    async fn self_references_see_earlier_unflushed_rows_of_the_same_table() {
        let nodes = EntityDefinition::new("nodes")
            .with_column(Column::new("id", ColumnType::Text))
            .with_column(Column::new("parent_id", ColumnType::Text).nullable())
            .with_primary_key(&["id"])
            .with_foreign_key(ForeignKey::new("parent_id", "nodes", "id"));
        let mut session = MemorySession::new();
        session.create_entity(&nodes).await.expect("create nodes");
        session.begin().await.expect("begin");

        session
            .insert_rows(&nodes, &[Row::new().with("id", "root").with("parent_id", None::<&str>)])
            .await
            .expect("insert root");
        session
            .insert_rows(&nodes, &[Row::new().with("id", "leaf").with("parent_id", "root")])
            .await
            .expect("leaf sees the unflushed root");

        let err = session
            .insert_rows(&nodes, &[Row::new().with("id", "orphan").with("parent_id", "missing")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nodes_parent_id_fkey"));
        assert!(err.to_string().contains("key (parent_id)=(missing) is not present"));
    }

    #[tokio::test]
    async fn offline_sessions_cannot_begin() {
        let mut session = MemorySession::new();
        session.set_offline(true);
        assert!(session.begin().await.is_err());
        assert!(!session.in_transaction());
    }
}
