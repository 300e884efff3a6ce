use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use pgseed_core::{ColumnType, EntityDefinition, Error, Result, Row, Session, Value};

use crate::ddl::{create_table_sql, drop_table_sql, quote_ident};

/// Postgres caps bind parameters per statement at `u16::MAX`.
const MAX_BINDS: usize = 65_535;

/// Session over a Postgres pool with at most one open transaction.
///
/// Outside a transaction statements autocommit on any pooled connection.
/// Inside one they all run on the connection owned by the transaction.
pub struct PgSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    rollback_only: bool,
}

impl PgSession {
    /// Create a new session using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tx: None,
            rollback_only: false,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute_sql(&mut self, sql: &str) -> Result<u64> {
        let query = sqlx::query(sql);
        let result = match self.tx.as_mut() {
            Some(tx) => query.execute(&mut **tx).await,
            None => query.execute(&self.pool).await,
        };
        result.map(|done| done.rows_affected()).map_err(db_error)
    }
}

#[async_trait]
impl Session for PgSession {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(Error::Transaction(
                "there is already a transaction in progress".to_string(),
            ));
        }
        let tx = self.pool.begin().await.map_err(db_error)?;
        self.tx = Some(tx);
        self.rollback_only = false;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.rollback_only = false;
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Transaction("there is no transaction in progress".to_string()))?;
        tx.commit()
            .await
            .map_err(|err| Error::Transaction(err.to_string()))
    }

    async fn rollback(&mut self) -> Result<()> {
        self.rollback_only = false;
        match self.tx.take() {
            Some(tx) => tx
                .rollback()
                .await
                .map_err(|err| Error::Transaction(err.to_string())),
            None => Ok(()),
        }
    }

    fn abandon(&mut self) {
        self.rollback_only = false;
        // Dropping the transaction queues a ROLLBACK on its pooled connection.
        self.tx.take();
    }

    fn mark_rollback_only(&mut self) {
        if self.tx.is_some() {
            self.rollback_only = true;
        }
    }

    fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    async fn drop_entity(&mut self, definition: &EntityDefinition) -> Result<()> {
        self.execute_sql(&drop_table_sql(definition)).await?;
        tracing::debug!("Dropped table {}", definition.name);
        Ok(())
    }

    async fn create_entity(&mut self, definition: &EntityDefinition) -> Result<()> {
        self.execute_sql(&create_table_sql(definition)).await?;
        tracing::debug!("Created table {}", definition.name);
        Ok(())
    }

    async fn insert_rows(&mut self, definition: &EntityDefinition, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() || definition.columns.is_empty() {
            return Ok(0);
        }

        let column_list = definition
            .columns
            .iter()
            .map(|column| quote_ident(&column.name))
            .collect::<Vec<_>>()
            .join(", ");
        let rows_per_statement = (MAX_BINDS / definition.columns.len()).max(1);
        let mut inserted = 0;

        for chunk in rows.chunks(rows_per_statement) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({column_list}) ",
                quote_ident(&definition.name)
            ));
            builder.push_values(chunk, |mut values, row| {
                for column in &definition.columns {
                    match (row.get(&column.name), column.column_type) {
                        (Value::Text(text), _) => values.push_bind(text.clone()),
                        (Value::Int(int), ColumnType::Double) => values.push_bind(*int as f64),
                        (Value::Int(int), _) => values.push_bind(*int),
                        (Value::Float(float), _) => values.push_bind(*float),
                        (Value::Bool(flag), _) => values.push_bind(*flag),
                        (Value::Null, ColumnType::Text) => values.push_bind(None::<String>),
                        (Value::Null, ColumnType::BigInt) => values.push_bind(None::<i64>),
                        (Value::Null, ColumnType::Boolean) => values.push_bind(None::<bool>),
                        (Value::Null, ColumnType::Double) => values.push_bind(None::<f64>),
                    };
                }
            });

            let query = builder.build();
            let result = match self.tx.as_mut() {
                Some(tx) => query.execute(&mut **tx).await,
                None => query.execute(&self.pool).await,
            };
            inserted += result.map_err(db_error)?.rows_affected();
        }

        Ok(inserted)
    }

    async fn flush(&mut self) -> Result<()> {
        // Statements are sent eagerly; forcing deferred constraints makes the
        // tier boundary a constraint-checking point as well.
        if self.tx.is_some() {
            self.execute_sql("SET CONSTRAINTS ALL IMMEDIATE").await?;
        }
        Ok(())
    }

    async fn count_rows(&mut self, definition: &EntityDefinition) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&definition.name));
        let query = sqlx::query_scalar::<_, i64>(&sql);
        let count = match self.tx.as_mut() {
            Some(tx) => query.fetch_one(&mut **tx).await,
            None => query.fetch_one(&self.pool).await,
        }
        .map_err(db_error)?;
        Ok(count.max(0) as u64)
    }
}

fn db_error(err: sqlx::Error) -> Error {
    Error::Db(err.to_string())
}
