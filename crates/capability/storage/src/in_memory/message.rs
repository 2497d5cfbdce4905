//! 消息表内存实现

use crate::error::{SchemaError, StorageError};
use crate::models::{ProvisionOutcome, StoredRow};
use crate::traits::MessageStore;
use std::sync::RwLock;

#[derive(Default)]
struct Schema {
    schema: bool,
    table: bool,
    indexes: usize,
}

/// 消息表内存存储
pub struct InMemoryMessageStore {
    rows: RwLock<Vec<StoredRow>>,
    schema: RwLock<Schema>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            schema: RwLock::new(Schema::default()),
        }
    }

    /// 已写入行的副本（按写入顺序）。
    pub fn rows(&self) -> Vec<StoredRow> {
        self.rows.read().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn provision_schema(&self) -> Result<ProvisionOutcome, SchemaError> {
        let mut schema = self
            .schema
            .write()
            .map_err(|_| SchemaError::Statement("lock failed".to_string()))?;
        let outcome = ProvisionOutcome {
            schema_created: !schema.schema,
            table_created: !schema.table,
            indexes_created: 2usize.saturating_sub(schema.indexes),
        };
        schema.schema = true;
        schema.table = true;
        schema.indexes = 2;
        Ok(outcome)
    }

    async fn insert_row(&self, row: &StoredRow) -> Result<(), StorageError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        rows.push(row.clone());
        Ok(())
    }
}
