//! 传输层抽象：生命周期管理器只依赖这些 trait，测试注入假实现。

use crate::error::ConnectError;
use async_trait::async_trait;
use domain::{DisconnectReason, InboundMessage};
use std::time::Duration;

/// Broker 连接配置。
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 按此顺序逐个订阅。
    pub topics: Vec<String>,
    pub qos: u8,
    pub keep_alive: Duration,
    /// CONNACK / 每个 SUBACK 的等待上限。
    pub connect_timeout: Duration,
}

/// 会话事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Message(InboundMessage),
    /// 会话已断开，之后不会再产生事件。
    Disconnected(DisconnectReason),
}

/// 传输层：打开一个 clean-session 会话（已完成 CONNACK）。
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn connect(&self, config: &BrokerConfig) -> Result<Box<dyn BrokerSession>, ConnectError>;
}

/// 已建立的 broker 会话。
#[async_trait]
pub trait BrokerSession: Send {
    /// 订阅单个 topic filter，等待 broker 确认。
    async fn subscribe(&mut self, filter: &str, qos: u8) -> Result<(), ConnectError>;

    /// 下一条入站消息或断开通知。
    async fn next_event(&mut self) -> SessionEvent;

    /// 主动断开（best-effort）。
    async fn disconnect(&mut self);
}

/// 入站消息处理器（落库流水线实现）。失败不得向会话传播。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage);
}
