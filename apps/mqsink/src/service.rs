//! 服务编排
//!
//! 把配置、存储、落库流水线与连接生命周期装配在一起，运行到取消信号触发为止。
//! 启动期只有非法表名会返回错误；建表失败、连接失败、写入失败都只记录日志。

use mqsink_config::Settings;
use mqsink_ingest::{BrokerConfig, BrokerTransport, ConnectionManager, RumqttcTransport};
use mqsink_pipeline::IngestPipeline;
use mqsink_storage::{MessageStore, PgMessageStore, SchemaError, TableName};
use mqsink_telemetry::{BridgeMetrics, MetricsSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 使用 PostgreSQL 存储与 rumqttc 传输运行服务。
pub async fn run(
    settings: Settings,
    cancel: CancellationToken,
) -> Result<MetricsSnapshot, SchemaError> {
    let table = TableName::new(settings.table_schema.clone(), settings.table_name.clone())?;
    let store: Arc<dyn MessageStore> = Arc::new(
        PgMessageStore::new(settings.database_url.clone(), table)
            .with_write_timeout(Duration::from_secs(settings.write_timeout_seconds)),
    );
    let transport: Arc<dyn BrokerTransport> = Arc::new(RumqttcTransport);
    Ok(run_with(&settings, store, transport, cancel).await)
}

/// 使用给定存储与传输运行服务，返回停止时的计数器快照。
pub async fn run_with(
    settings: &Settings,
    store: Arc<dyn MessageStore>,
    transport: Arc<dyn BrokerTransport>,
    cancel: CancellationToken,
) -> MetricsSnapshot {
    let metrics = Arc::new(BridgeMetrics::new());
    info!(
        target: "mqsink.service",
        host = %settings.mqtt_host,
        port = settings.mqtt_port,
        client_id = %settings.mqtt_client_id,
        topics = ?settings.mqtt_topics,
        qos = settings.mqtt_qos,
        table = %format!("{}.{}", settings.table_schema, settings.table_name),
        max_concurrent_writes = settings.max_concurrent_writes,
        "service_starting"
    );

    if settings.startup_delay_seconds > 0 {
        info!(
            target: "mqsink.service",
            delay_seconds = settings.startup_delay_seconds,
            "startup_delayed"
        );
        let delay = Duration::from_secs(settings.startup_delay_seconds);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(target: "mqsink.service", "service_stopped_before_start");
                return metrics.snapshot();
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    if settings.create_table {
        provision(store.as_ref()).await;
    }

    let pipeline = Arc::new(IngestPipeline::new(
        store,
        metrics.clone(),
        settings.max_concurrent_writes,
    ));
    let manager = ConnectionManager::new(
        broker_config(settings),
        transport,
        pipeline,
        metrics.clone(),
        cancel,
    );
    manager.run().await;

    let snapshot = metrics.snapshot();
    info!(
        target: "mqsink.service",
        messages_received = snapshot.messages_received,
        messages_stored = snapshot.messages_stored,
        write_failures = snapshot.write_failures,
        undecodable_payloads = snapshot.undecodable_payloads,
        connect_attempts = snapshot.connect_attempts,
        connect_failures = snapshot.connect_failures,
        disconnects = snapshot.disconnects,
        "service_stopped"
    );
    snapshot
}

/// 建表只在启动时尝试一次，失败不致命（表可能已由其他权限的账号创建）。
async fn provision(store: &dyn MessageStore) {
    match store.provision_schema().await {
        Ok(outcome) if outcome.is_noop() => {
            info!(target: "mqsink.service", "schema_already_provisioned");
        }
        Ok(outcome) => {
            info!(
                target: "mqsink.service",
                schema_created = outcome.schema_created,
                table_created = outcome.table_created,
                indexes_created = outcome.indexes_created,
                "schema_provisioned"
            );
        }
        Err(err) => {
            error!(target: "mqsink.service", error = %err, "schema_provision_failed");
        }
    }
}

fn broker_config(settings: &Settings) -> BrokerConfig {
    BrokerConfig {
        host: settings.mqtt_host.clone(),
        port: settings.mqtt_port,
        client_id: settings.mqtt_client_id.clone(),
        username: settings.mqtt_username.clone(),
        password: settings.mqtt_password.clone(),
        topics: settings.mqtt_topics.clone(),
        qos: settings.mqtt_qos,
        keep_alive: Duration::from_secs(settings.mqtt_keep_alive_seconds),
        connect_timeout: Duration::from_secs(settings.mqtt_connect_timeout_seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::InboundMessage;
    use mqsink_ingest::{BrokerSession, ConnectError, SessionEvent};
    use mqsink_storage::InMemoryMessageStore;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(lookup: &[(&str, &str)]) -> Settings {
        let values: Vec<(String, String)> = lookup
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::from_lookup(move |key| {
            values
                .iter()
                .find(|(candidate, _)| candidate == key)
                .map(|(_, value)| value.clone())
        })
        .expect("settings")
    }

    /// 每次连接都交付同一批消息，之后保持连接直到被断开。
    struct ScriptedTransport {
        messages: Vec<InboundMessage>,
        connects: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrokerTransport for ScriptedTransport {
        async fn connect(
            &self,
            config: &BrokerConfig,
        ) -> Result<Box<dyn BrokerSession>, ConnectError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let pending = self
                .messages
                .iter()
                .cloned()
                .map(|message| message.with_client_id(config.client_id.clone()))
                .collect();
            Ok(Box::new(ScriptedSession {
                pending,
                closed: self.closed.clone(),
            }))
        }
    }

    struct ScriptedSession {
        pending: VecDeque<InboundMessage>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrokerSession for ScriptedSession {
        async fn subscribe(&mut self, _filter: &str, _qos: u8) -> Result<(), ConnectError> {
            Ok(())
        }

        async fn next_event(&mut self) -> SessionEvent {
            match self.pending.pop_front() {
                Some(message) => SessionEvent::Message(message),
                None => std::future::pending::<SessionEvent>().await,
            }
        }

        async fn disconnect(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct BrokenSchemaStore {
        inner: InMemoryMessageStore,
    }

    #[async_trait]
    impl MessageStore for BrokenSchemaStore {
        async fn provision_schema(
            &self,
        ) -> Result<mqsink_storage::ProvisionOutcome, SchemaError> {
            Err(SchemaError::Statement("permission denied".to_string()))
        }

        async fn insert_row(
            &self,
            row: &mqsink_storage::StoredRow,
        ) -> Result<(), mqsink_storage::StorageError> {
            self.inner.insert_row(row).await
        }
    }

    fn transport(messages: Vec<InboundMessage>) -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport {
            messages,
            connects: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        })
    }

    async fn wait_for_rows(store: &InMemoryMessageStore, count: usize) {
        for _ in 0..1_000 {
            if store.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("rows not stored");
    }

    #[test]
    fn broker_config_follows_settings() {
        let settings = settings(&[
            ("MQSINK_DATABASE_URL", "postgres://localhost/mqsink"),
            ("MQSINK_MQTT_HOST", "broker.local"),
            ("MQSINK_MQTT_PORT", "8883"),
            ("MQSINK_MQTT_CLIENT_ID", "bridge-7"),
            ("MQSINK_MQTT_TOPICS", "a/#,b/+"),
            ("MQSINK_MQTT_QOS", "2"),
            ("MQSINK_MQTT_KEEP_ALIVE_SECONDS", "15"),
        ]);

        let config = broker_config(&settings);

        assert_eq!(config.host, "broker.local");
        assert_eq!(config.port, 8883);
        assert_eq!(config.client_id, "bridge-7");
        assert_eq!(config.topics, vec!["a/#", "b/+"]);
        assert_eq!(config.qos, 2);
        assert_eq!(config.keep_alive, Duration::from_secs(15));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.username, None);
    }

    #[tokio::test]
    async fn invalid_table_name_fails_startup() {
        let settings = settings(&[
            ("MQSINK_DATABASE_URL", "postgres://localhost/mqsink"),
            ("MQSINK_TABLE_NAME", "messages; drop table users"),
        ]);

        let result = run(settings, CancellationToken::new()).await;

        assert!(matches!(result, Err(SchemaError::InvalidIdentifier(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn messages_flow_from_broker_to_store_until_cancelled() {
        let settings = settings(&[
            ("MQSINK_DATABASE_URL", "postgres://localhost/mqsink"),
            ("MQSINK_MQTT_CLIENT_ID", "bridge-1"),
            ("MQSINK_CREATE_TABLE", "true"),
        ]);
        let store = Arc::new(InMemoryMessageStore::new());
        let transport = transport(vec![
            InboundMessage::new("sensors/temp", 1, false, b"{\"v\":22.5}".to_vec()),
            InboundMessage::new("sensors/raw", 0, false, vec![0xFF]),
        ]);
        let cancel = CancellationToken::new();

        let service = tokio::spawn({
            let store = store.clone();
            let transport = transport.clone();
            let cancel = cancel.clone();
            async move { run_with(&settings, store, transport, cancel).await }
        });
        wait_for_rows(&store, 2).await;
        cancel.cancel();
        let snapshot = service.await.expect("service");

        assert!(store.provision_schema().await.expect("provision").is_noop());
        let rows = store.rows();
        assert_eq!(rows[0].topic, "sensors/temp");
        assert_eq!(rows[0].client_id.as_deref(), Some("bridge-1"));
        assert_eq!(rows[1].payload_text, None);
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.messages_stored, 2);
        assert_eq!(snapshot.undecodable_payloads, 1);
        assert_eq!(snapshot.connect_attempts, 1);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
        assert_eq!(transport.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn provisioning_failure_is_not_fatal() {
        let settings = settings(&[
            ("MQSINK_DATABASE_URL", "postgres://localhost/mqsink"),
            ("MQSINK_CREATE_TABLE", "1"),
        ]);
        let store = Arc::new(BrokenSchemaStore {
            inner: InMemoryMessageStore::new(),
        });
        let transport = transport(vec![InboundMessage::new("t", 1, false, b"ok".to_vec())]);
        let cancel = CancellationToken::new();

        let service = tokio::spawn({
            let store = store.clone();
            let transport = transport.clone();
            let cancel = cancel.clone();
            async move { run_with(&settings, store, transport, cancel).await }
        });
        wait_for_rows(&store.inner, 1).await;
        cancel.cancel();
        let snapshot = service.await.expect("service");

        assert_eq!(snapshot.messages_stored, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_startup_delay_never_connects() {
        let settings = settings(&[
            ("MQSINK_DATABASE_URL", "postgres://localhost/mqsink"),
            ("MQSINK_STARTUP_DELAY_SECONDS", "30"),
        ]);
        let transport = transport(Vec::new());
        let cancel = CancellationToken::new();

        let service = tokio::spawn({
            let transport = transport.clone();
            let cancel = cancel.clone();
            async move {
                run_with(&settings, Arc::new(InMemoryMessageStore::new()), transport, cancel).await
            }
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
        let snapshot = service.await.expect("service");

        assert_eq!(snapshot.connect_attempts, 0);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
    }
}
