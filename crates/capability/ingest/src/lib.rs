//! # Broker 连接生命周期
//!
//! 维护到 MQTT broker 的订阅会话：建连、按序订阅、断线检测、分级退避重连。
//!
//! ```text
//! Disconnected ──▶ Connecting ──▶ Connected
//!                     ▲   │           │ broker 断开
//!                     │   ▼ 失败       ▼
//!                  ReconnectPending ◀─┘
//!
//! 任意状态 ──(取消)──▶ ShuttingDown
//! ```
//!
//! - 状态与重试计数只由 [`ConnectionManager`] 持有，迁移在一把互斥锁内完成；
//!   同一时刻最多一个重连序列在执行。
//! - 断线通知经由单消费者队列进入生命周期任务，并带有会话代数；
//!   过期代数的通知直接跳过。
//! - 连接/订阅失败永不致命，一直重试直到取消。

mod backoff;
mod error;
mod lifecycle;
mod mqtt;
mod transport;

pub use backoff::*;
pub use error::ConnectError;
pub use lifecycle::{ConnectionManager, DisconnectNotice};
pub use mqtt::RumqttcTransport;
pub use transport::*;
