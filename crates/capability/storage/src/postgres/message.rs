//! Postgres 消息表实现

use crate::connection::{close_session, open_session};
use crate::error::{SchemaError, StorageError};
use crate::models::{ProvisionOutcome, StoredRow, TableName};
use crate::postgres::schema::{
    INDEX_EXISTS_SQL, SCHEMA_EXISTS_SQL, TABLE_EXISTS_SQL, create_schema_sql, create_table_sql,
    index_statements, insert_sql,
};
use crate::traits::MessageStore;
use sqlx::PgConnection;
use std::time::Duration;
use tracing::info;

/// 单次写入（建连 + insert）的默认时间上限。
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PgMessageStore {
    database_url: String,
    table: TableName,
    insert_sql: String,
    write_timeout: Duration,
}

impl PgMessageStore {
    pub fn new(database_url: impl Into<String>, table: TableName) -> Self {
        let insert_sql = insert_sql(&table);
        Self {
            database_url: database_url.into(),
            table,
            insert_sql,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// 超时后放弃本次写入，连接随 future 一起 drop（关闭）。
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    async fn provision_on(&self, conn: &mut PgConnection) -> Result<ProvisionOutcome, SchemaError> {
        let mut outcome = ProvisionOutcome::default();
        let schema = self.table.schema();
        let table = self.table.table();

        let schema_exists: bool = sqlx::query_scalar(SCHEMA_EXISTS_SQL)
            .bind(schema)
            .fetch_one(&mut *conn)
            .await?;
        if !schema_exists {
            sqlx::query(&create_schema_sql(&self.table))
                .execute(&mut *conn)
                .await?;
            outcome.schema_created = true;
            info!(target: "mqsink.storage", schema = %schema, "schema_created");
        }

        let table_exists: bool = sqlx::query_scalar(TABLE_EXISTS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_one(&mut *conn)
            .await?;
        if !table_exists {
            sqlx::query(&create_table_sql(&self.table))
                .execute(&mut *conn)
                .await?;
            outcome.table_created = true;
            info!(target: "mqsink.storage", table = %self.table.qualified(), "table_created");
        }

        for (index, statement) in index_statements(&self.table) {
            let index_exists: bool = sqlx::query_scalar(INDEX_EXISTS_SQL)
                .bind(schema)
                .bind(table)
                .bind(&index)
                .fetch_one(&mut *conn)
                .await?;
            if index_exists {
                continue;
            }
            sqlx::query(&statement).execute(&mut *conn).await?;
            outcome.indexes_created += 1;
            info!(target: "mqsink.storage", index = %index, "index_created");
        }
        Ok(outcome)
    }

    async fn insert_on(&self, conn: &mut PgConnection, row: &StoredRow) -> Result<(), StorageError> {
        sqlx::query(&self.insert_sql)
            .bind(row.received_at_ms as f64)
            .bind(&row.topic)
            .bind(i16::from(row.qos))
            .bind(row.retained)
            .bind(row.client_id.as_deref())
            .bind(row.payload_text.as_deref())
            .bind(row.payload_bytes.as_slice())
            .bind(&row.user_properties)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageStore for PgMessageStore {
    async fn provision_schema(&self) -> Result<ProvisionOutcome, SchemaError> {
        let mut conn = open_session(&self.database_url)
            .await
            .map_err(|err| SchemaError::Connection(err.to_string()))?;
        let result = self.provision_on(&mut conn).await;
        close_session(conn).await;
        result
    }

    async fn insert_row(&self, row: &StoredRow) -> Result<(), StorageError> {
        let write = async {
            let mut conn = open_session(&self.database_url).await?;
            let result = self.insert_on(&mut conn, row).await;
            close_session(conn).await;
            result
        };
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::new(format!(
                "write timed out after {}ms",
                self.write_timeout.as_millis()
            ))),
        }
    }
}
