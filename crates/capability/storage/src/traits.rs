//! 存储接口定义

use crate::error::{SchemaError, StorageError};
use crate::models::{ProvisionOutcome, StoredRow};
use async_trait::async_trait;

/// 消息表存储接口。
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// 确保 schema、消息表及其两个索引存在（先按名查询，缺失才创建）。
    async fn provision_schema(&self) -> Result<ProvisionOutcome, SchemaError>;

    /// 写入一行。失败不重试。
    async fn insert_row(&self, row: &StoredRow) -> Result<(), StorageError>;
}
