//! 验证辅助函数
//!
//! 表名与 schema 名会被拼入 DDL/DML（标识符无法参数绑定），构造存储前必须校验：
//! - 首字符为 ASCII 字母或下划线
//! - 其余字符为 ASCII 字母、数字或下划线
//! - 长度不超过 63 字节（Postgres 标识符上限）

use crate::error::SchemaError;

/// Postgres 标识符最大长度（字节）。
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// 校验 SQL 标识符。
pub fn validate_identifier(value: &str) -> Result<(), SchemaError> {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(SchemaError::InvalidIdentifier(value.to_string()));
    };
    if value.len() > MAX_IDENTIFIER_LEN
        || !(first.is_ascii_alphabetic() || first == '_')
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(SchemaError::InvalidIdentifier(value.to_string()));
    }
    Ok(())
}
