//! 日志初始化与桥接计数器。

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_stored: u64,
    pub write_failures: u64,
    pub undecodable_payloads: u64,
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub disconnects: u64,
}

/// 桥接计数器（各组件通过 `Arc` 共享，可被任意多个写入任务并发累加）。
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    messages_received: AtomicU64,
    messages_stored: AtomicU64,
    write_failures: AtomicU64,
    undecodable_payloads: AtomicU64,
    connect_attempts: AtomicU64,
    connect_failures: AtomicU64,
    disconnects: AtomicU64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_stored: self.messages_stored.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            undecodable_payloads: self.undecodable_payloads.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }

    /// 记录入站消息次数。
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录落库成功，返回累加后的总数（单调递增）。
    pub fn record_stored(&self) -> u64 {
        self.messages_stored.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 已成功落库的消息数。
    pub fn stored(&self) -> u64 {
        self.messages_stored.load(Ordering::Relaxed)
    }

    /// 记录写入失败（消息被丢弃）次数。
    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录非 UTF-8 负载次数。
    pub fn record_undecodable(&self) {
        self.undecodable_payloads.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录连接尝试次数。
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录连接/订阅失败次数。
    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录 broker 断开次数。
    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }
}

/// 初始化 tracing（默认 info，`RUST_LOG` 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
