//! mqsink 核心领域模型：入站消息、连接状态、断开原因。

pub mod data;
pub mod state;

pub use data::InboundMessage;
pub use state::{ConnectionState, DisconnectReason};

/// 当前 Unix 时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
