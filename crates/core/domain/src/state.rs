use std::fmt;

/// Broker 连接状态（仅由连接生命周期管理器迁移）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ReconnectPending,
    ShuttingDown,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::ReconnectPending => "reconnect_pending",
            ConnectionState::ShuttingDown => "shutting_down",
        }
    }

    /// 终态：进入后不再重连。
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::ShuttingDown)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 传输层上报的断开原因（决定首次重连等待）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Broker 正常断开。
    Normal,
    /// Broker 繁忙。
    ServerBusy,
    /// 协议错误。
    ProtocolError,
    /// 未指定原因、网络错误或其它原因码。
    Other,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Normal => "normal",
            DisconnectReason::ServerBusy => "server_busy",
            DisconnectReason::ProtocolError => "protocol_error",
            DisconnectReason::Other => "other",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
