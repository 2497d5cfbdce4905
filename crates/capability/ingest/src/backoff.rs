//! 重连退避策略。

use domain::DisconnectReason;
use rand_core::{OsRng, RngCore};
use std::time::Duration;

/// 指数退避基数（毫秒）。
pub const RETRY_BASE_MS: u64 = 1_000;
/// 指数退避上限（毫秒）。
pub const RETRY_MAX_MS: u64 = 30_000;
/// 随机抖动上限（毫秒）。
pub const JITTER_MAX_MS: u64 = 2_000;

/// 断开原因 → 首次重连等待（毫秒，不含抖动）。
pub fn disconnect_base_ms(reason: DisconnectReason) -> u64 {
    match reason {
        DisconnectReason::Normal => 2_000,
        DisconnectReason::ServerBusy => 1_500,
        DisconnectReason::ProtocolError => 4_000,
        DisconnectReason::Other => 5_000,
    }
}

/// 重连退避参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: RETRY_BASE_MS,
            max_ms: RETRY_MAX_MS,
            max_jitter_ms: JITTER_MAX_MS,
        }
    }
}

impl BackoffPolicy {
    /// 关闭抖动（确定性等待）。
    pub fn without_jitter(mut self) -> Self {
        self.max_jitter_ms = 0;
        self
    }

    /// 第 `retry` 次失败后的基础等待：`min(base * 2^(retry-1), max)`。
    pub fn base_delay_ms(&self, retry: u32) -> u64 {
        let exponent = retry.saturating_sub(1);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        self.base_ms.saturating_mul(factor).min(self.max_ms)
    }

    /// 第 `retry` 次失败后的实际等待（含抖动）。
    pub fn retry_delay(&self, retry: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms(retry).saturating_add(self.jitter_ms()))
    }

    /// 断开后首次重连前的等待（含抖动）。
    pub fn disconnect_delay(&self, reason: DisconnectReason) -> Duration {
        Duration::from_millis(disconnect_base_ms(reason).saturating_add(self.jitter_ms()))
    }

    /// `[0, max_jitter_ms]` 内均匀取值。
    pub fn jitter_ms(&self) -> u64 {
        if self.max_jitter_ms == 0 {
            return 0;
        }
        OsRng.next_u64() % (self.max_jitter_ms + 1)
    }
}
