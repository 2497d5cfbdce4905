//! 存储层错误类型
//!
//! - `StorageError`：单行写入失败（连接、执行、约束），消息随之丢弃
//! - `SchemaError`：建表失败，调用方记录日志后继续运行

#[derive(Debug)]
pub struct StorageError {
    cause: String,
}

impl StorageError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl std::error::Error for StorageError {}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// 建表错误。
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("schema connection error: {0}")]
    Connection(String),
    #[error("schema statement failed: {0}")]
    Statement(String),
}

impl From<sqlx::Error> for SchemaError {
    fn from(err: sqlx::Error) -> Self {
        Self::Statement(err.to_string())
    }
}
