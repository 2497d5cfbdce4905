//! 存储层数据模型
//!
//! - StoredRow：消息表中的一行
//! - TableName：经过校验的 schema + 表名

use crate::error::SchemaError;
use crate::validation::{MAX_IDENTIFIER_LEN, validate_identifier};

/// 消息表中的一行（每条入站消息一行，只追加）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// 接收时刻（UTC 毫秒），由落库流水线赋值而非数据库。
    pub received_at_ms: i64,
    pub topic: String,
    pub qos: u8,
    pub retained: bool,
    /// 为空时写入 NULL。
    pub client_id: Option<String>,
    /// 负载不是合法 UTF-8 时为 `None`。
    pub payload_text: Option<String>,
    /// 空负载写入空字节串而非 NULL。
    pub payload_bytes: Vec<u8>,
    /// 用户属性 JSON 对象，没有属性时为 `{}`。
    pub user_properties: String,
}

/// 经过校验的表名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Result<Self, SchemaError> {
        let schema = schema.into();
        let table = table.into();
        validate_identifier(&schema)?;
        validate_identifier(&table)?;
        Ok(Self { schema, table })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// 带引号的完整表名：`"schema"."table"`。
    pub fn qualified(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.table)
    }

    /// 时间倒序索引名。
    pub fn received_at_index(&self) -> String {
        index_name(&self.table, "received_at")
    }

    /// topic + 时间倒序索引名。
    pub fn topic_received_at_index(&self) -> String {
        index_name(&self.table, "topic_received_at")
    }
}

/// 索引名超出标识符上限时截断（Postgres 也会截断，截断后才能按名查到）。
fn index_name(table: &str, suffix: &str) -> String {
    let mut name = format!("ix_{}_{}", table, suffix);
    name.truncate(MAX_IDENTIFIER_LEN);
    name
}

/// 建表结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub schema_created: bool,
    pub table_created: bool,
    pub indexes_created: usize,
}

impl ProvisionOutcome {
    /// 是否未做任何变更（目标已就绪）。
    pub fn is_noop(&self) -> bool {
        !self.schema_created && !self.table_created && self.indexes_created == 0
    }
}
