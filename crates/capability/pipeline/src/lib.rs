//! # 落库流水线
//!
//! 每条入站消息：UTF-8 解码 → 用户属性序列化 → 取得并发名额 → 单行写入。
//!
//! - 名额耗尽时 `handle` 挂起，消息泵随之停止拉取（背压），不在内存里排队。
//! - 写入在独立任务中执行，名额随任务结束释放（成功、失败或任务被取消）。
//! - 写入失败只记录日志并丢弃该消息，不重试。

use async_trait::async_trait;
use domain::InboundMessage;
use mqsink_ingest::MessageHandler;
use mqsink_storage::{MessageStore, StoredRow};
use mqsink_telemetry::BridgeMetrics;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

/// 每累计落库这么多条记一次汇总日志。
pub const SUMMARY_EVERY: u64 = 100;

/// 落库流水线（即消息处理器）。
pub struct IngestPipeline {
    store: Arc<dyn MessageStore>,
    metrics: Arc<BridgeMetrics>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl IngestPipeline {
    /// `max_in_flight` 为并发写入上限，0 按 1 处理。
    pub fn new(
        store: Arc<dyn MessageStore>,
        metrics: Arc<BridgeMetrics>,
        max_in_flight: usize,
    ) -> Self {
        let max_in_flight = max_in_flight.clamp(1, u32::MAX as usize);
        Self {
            store,
            metrics,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// 当前正在写入的消息数。
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    /// 等待所有已派发的写入结束。
    pub async fn wait_idle(&self) {
        if let Ok(all) = self.permits.acquire_many(self.max_in_flight as u32).await {
            drop(all);
        }
    }

    async fn acquire(&self, topic: &str) -> Option<OwnedSemaphorePermit> {
        if self.permits.available_permits() == 0 {
            debug!(
                target: "mqsink.pipeline",
                topic = %topic,
                max_in_flight = self.max_in_flight,
                "write_slots_exhausted"
            );
        }
        match self.permits.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!(target: "mqsink.pipeline", topic = %topic, "write_slots_closed");
                None
            }
        }
    }
}

#[async_trait]
impl MessageHandler for IngestPipeline {
    async fn handle(&self, message: InboundMessage) {
        self.metrics.record_received();
        let row = to_row(&message, domain::now_epoch_ms());
        if row.payload_text.is_none() {
            self.metrics.record_undecodable();
            debug!(
                target: "mqsink.pipeline",
                topic = %row.topic,
                payload_len = row.payload_bytes.len(),
                "payload_not_utf8"
            );
        }

        let Some(permit) = self.acquire(&row.topic).await else {
            return;
        };
        let store = self.store.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            write_row(store.as_ref(), &metrics, row).await;
            drop(permit);
        });
    }
}

async fn write_row(store: &dyn MessageStore, metrics: &BridgeMetrics, row: StoredRow) {
    match store.insert_row(&row).await {
        Ok(()) => {
            let stored = metrics.record_stored();
            if stored % SUMMARY_EVERY == 0 {
                info!(
                    target: "mqsink.pipeline",
                    stored = stored,
                    topic = %row.topic,
                    "messages_stored"
                );
            }
        }
        Err(err) => {
            metrics.record_write_failure();
            error!(
                target: "mqsink.pipeline",
                topic = %row.topic,
                error = %err,
                "message_write_failed"
            );
        }
    }
}

/// 入站消息 → 待写入行。
pub fn to_row(message: &InboundMessage, received_at_ms: i64) -> StoredRow {
    StoredRow {
        received_at_ms,
        topic: message.topic.clone(),
        qos: message.qos,
        retained: message.retained,
        client_id: (!message.client_id.is_empty()).then(|| message.client_id.clone()),
        payload_text: message.payload_text().map(str::to_string),
        payload_bytes: message.payload.clone(),
        user_properties: serialize_user_properties(&message.user_properties),
    }
}

/// 用户属性 → 扁平 JSON 对象，保持原始顺序（重复 key 原样保留）。没有属性时为 `{}`。
pub fn serialize_user_properties(properties: &[(String, String)]) -> String {
    let mut json = String::from("{");
    for (index, (key, value)) in properties.iter().enumerate() {
        if index > 0 {
            json.push(',');
        }
        json.push_str(&json_string(key));
        json.push(':');
        json.push_str(&json_string(value));
    }
    json.push('}');
    json
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_properties_serialize_to_empty_object() {
        assert_eq!(serialize_user_properties(&[]), "{}");
    }

    #[test]
    fn properties_keep_order_and_escape_quotes() {
        let properties = vec![
            ("unit".to_string(), "°C".to_string()),
            ("path".to_string(), "C:\\data\\\"x\"".to_string()),
            ("unit".to_string(), "K".to_string()),
        ];
        assert_eq!(
            serialize_user_properties(&properties),
            r#"{"unit":"°C","path":"C:\\data\\\"x\"","unit":"K"}"#
        );
    }

    #[test]
    fn row_keeps_raw_bytes_when_payload_is_not_utf8() {
        let message = InboundMessage::new("raw/bin", 0, true, vec![0xFF, 0x00, 0xC3]);
        let row = to_row(&message, 42);
        assert_eq!(row.received_at_ms, 42);
        assert_eq!(row.payload_text, None);
        assert_eq!(row.payload_bytes, vec![0xFF, 0x00, 0xC3]);
        assert!(row.retained);
        assert_eq!(row.client_id, None);
    }

    #[test]
    fn empty_payload_decodes_to_empty_text() {
        let message = InboundMessage::new("t", 1, false, Vec::new()).with_client_id("bridge");
        let row = to_row(&message, 0);
        assert_eq!(row.payload_text.as_deref(), Some(""));
        assert!(row.payload_bytes.is_empty());
        assert_eq!(row.client_id.as_deref(), Some("bridge"));
    }
}
