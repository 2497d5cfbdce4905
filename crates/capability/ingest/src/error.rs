//! 连接错误类型定义

/// 建连/订阅错误（总是重试）。
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// 网络/传输层错误
    #[error("transport error: {0}")]
    Transport(String),

    /// Broker 拒绝连接（认证失败等）
    #[error("connection refused: {0}")]
    Refused(String),

    /// 订阅失败
    #[error("subscribe to {filter} failed: {reason}")]
    Subscribe { filter: String, reason: String },

    /// 等待 CONNACK/SUBACK 超时
    #[error("timeout waiting for {0}")]
    Timeout(&'static str),
}
