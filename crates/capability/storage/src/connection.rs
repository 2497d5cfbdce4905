//! 数据库会话管理
//!
//! 每次存储调用打开一个独立会话，调用结束时显式关闭：
//! - open_session：建立单个 Postgres 连接
//! - close_session：优雅关闭（失败只记日志）
//!
//! 调用方在 `open_session` 与 `close_session` 之间不得提前 `?` 返回；
//! 任务被取消时连接随 drop 一并关闭。

use crate::error::StorageError;
use sqlx::{Connection, PgConnection};
use tracing::debug;

/// 建立单个 Postgres 连接。
pub async fn open_session(database_url: &str) -> Result<PgConnection, StorageError> {
    let conn = PgConnection::connect(database_url).await?;
    Ok(conn)
}

/// 关闭连接（best-effort）。
pub async fn close_session(conn: PgConnection) {
    if let Err(err) = conn.close().await {
        debug!(target: "mqsink.storage", error = %err, "session_close_failed");
    }
}
