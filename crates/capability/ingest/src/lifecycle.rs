//! 连接生命周期管理器。

use crate::backoff::BackoffPolicy;
use crate::error::ConnectError;
use crate::transport::{BrokerConfig, BrokerSession, BrokerTransport, MessageHandler, SessionEvent};
use domain::{ConnectionState, DisconnectReason};
use mqsink_telemetry::BridgeMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 关闭时等待消息泵退出的上限。
const PUMP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// 断线通知：携带断开会话的代数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectNotice {
    pub generation: u64,
    pub reason: DisconnectReason,
}

/// 状态机取值（只能在 `ConnectionManager::lifecycle` 锁内修改）。
struct Lifecycle {
    state: ConnectionState,
    /// 本轮重连的失败次数，连接成功后清零。
    retry: u32,
    /// 每次连接成功加一。
    generation: u64,
    pump: Option<JoinHandle<()>>,
}

/// 连接生命周期管理器。
///
/// `lifecycle` 互斥锁即重连闸门：持锁者独占 `Disconnected`/`ReconnectPending` → `Connecting` 的迁移。
pub struct ConnectionManager {
    config: BrokerConfig,
    transport: Arc<dyn BrokerTransport>,
    handler: Arc<dyn MessageHandler>,
    metrics: Arc<BridgeMetrics>,
    backoff: BackoffPolicy,
    cancel: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<ConnectionState>,
    notice_tx: mpsc::UnboundedSender<DisconnectNotice>,
    notice_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<DisconnectNotice>>>,
}

impl ConnectionManager {
    pub fn new(
        config: BrokerConfig,
        transport: Arc<dyn BrokerTransport>,
        handler: Arc<dyn MessageHandler>,
        metrics: Arc<BridgeMetrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_backoff(config, transport, handler, metrics, cancel, BackoffPolicy::default())
    }

    pub fn with_backoff(
        config: BrokerConfig,
        transport: Arc<dyn BrokerTransport>,
        handler: Arc<dyn MessageHandler>,
        metrics: Arc<BridgeMetrics>,
        cancel: CancellationToken,
        backoff: BackoffPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        Self {
            config,
            transport,
            handler,
            metrics,
            backoff,
            cancel,
            lifecycle: Mutex::new(Lifecycle {
                state: ConnectionState::Disconnected,
                retry: 0,
                generation: 0,
                pump: None,
            }),
            state_tx,
            notice_tx,
            notice_rx: std::sync::Mutex::new(Some(notice_rx)),
        }
    }

    /// 当前连接状态。
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// 订阅状态变化。
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// 当前会话代数（未连接过为 0）。
    pub async fn generation(&self) -> u64 {
        self.lifecycle.lock().await.generation
    }

    /// 生命周期主任务：首次连接，然后串行处理断线通知，直到取消。
    pub async fn run(&self) {
        let receiver = self
            .notice_rx
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        let Some(mut notices) = receiver else {
            warn!(target: "mqsink.ingest", "lifecycle_already_running");
            return;
        };

        self.run_retry_loop().await;
        loop {
            let notice = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                notice = notices.recv() => notice,
            };
            match notice {
                Some(notice) => self.handle_disconnect(notice).await,
                None => break,
            }
        }
        self.shutdown().await;
    }

    /// 建连并按配置顺序订阅全部 topic filter。已连接时直接返回。
    pub async fn connect_and_subscribe(&self) -> Result<(), ConnectError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let result = self.connect_locked(&mut lifecycle).await;
        if result.is_err() {
            self.transition(&mut lifecycle, ConnectionState::Disconnected);
        }
        result
    }

    /// 重试直到连接成功或取消。
    pub async fn run_retry_loop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.retry_locked(&mut lifecycle).await;
    }

    /// 断线处理：按原因等待后进入重试循环。
    ///
    /// 重连闸门被占用或通知已过期时直接跳过。
    pub async fn handle_disconnect(&self, notice: DisconnectNotice) {
        if self.cancel.is_cancelled() {
            return;
        }
        let Ok(mut lifecycle) = self.lifecycle.try_lock() else {
            debug!(
                target: "mqsink.ingest",
                generation = notice.generation,
                reason = %notice.reason,
                "reconnect_in_flight_skipped"
            );
            return;
        };
        if notice.generation != lifecycle.generation
            || lifecycle.state != ConnectionState::Connected
        {
            debug!(
                target: "mqsink.ingest",
                generation = notice.generation,
                current_generation = lifecycle.generation,
                state = %lifecycle.state,
                reason = %notice.reason,
                "stale_disconnect_skipped"
            );
            return;
        }

        self.metrics.record_disconnect();
        self.transition(&mut lifecycle, ConnectionState::ReconnectPending);
        let delay = self.backoff.disconnect_delay(notice.reason);
        warn!(
            target: "mqsink.ingest",
            generation = notice.generation,
            reason = %notice.reason,
            delay_ms = delay.as_millis() as u64,
            "broker_disconnected"
        );
        if !self.sleep(delay).await {
            return;
        }
        self.retry_locked(&mut lifecycle).await;
    }

    async fn retry_locked(&self, lifecycle: &mut Lifecycle) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                result = self.connect_locked(lifecycle) => result,
            };
            match attempt {
                Ok(()) => {
                    lifecycle.retry = 0;
                    return true;
                }
                Err(err) => {
                    self.metrics.record_connect_failure();
                    lifecycle.retry = lifecycle.retry.saturating_add(1);
                    self.transition(lifecycle, ConnectionState::ReconnectPending);
                    let delay = self.backoff.retry_delay(lifecycle.retry);
                    let delay_ms = delay.as_millis() as u64;
                    if lifecycle.retry == 1 {
                        info!(
                            target: "mqsink.ingest",
                            retry = lifecycle.retry,
                            delay_ms = delay_ms,
                            error = %err,
                            "broker_connect_failed"
                        );
                    } else {
                        warn!(
                            target: "mqsink.ingest",
                            retry = lifecycle.retry,
                            delay_ms = delay_ms,
                            error = %err,
                            "broker_connect_failed"
                        );
                    }
                    if !self.sleep(delay).await {
                        return false;
                    }
                }
            }
        }
    }

    async fn connect_locked(&self, lifecycle: &mut Lifecycle) -> Result<(), ConnectError> {
        if lifecycle.state == ConnectionState::Connected {
            return Ok(());
        }
        self.transition(lifecycle, ConnectionState::Connecting);
        self.metrics.record_connect_attempt();
        info!(
            target: "mqsink.ingest",
            host = %self.config.host,
            port = self.config.port,
            client_id = %self.config.client_id,
            "broker_connecting"
        );

        let mut session = self.transport.connect(&self.config).await?;
        for filter in &self.config.topics {
            if let Err(err) = session.subscribe(filter, self.config.qos).await {
                session.disconnect().await;
                return Err(err);
            }
            debug!(
                target: "mqsink.ingest",
                topic = %filter,
                qos = self.config.qos,
                "topic_subscribed"
            );
        }

        lifecycle.generation += 1;
        if let Some(previous) = lifecycle.pump.take() {
            previous.abort();
        }
        lifecycle.pump = Some(tokio::spawn(pump_session(
            session,
            lifecycle.generation,
            self.handler.clone(),
            self.cancel.clone(),
            self.notice_tx.clone(),
        )));
        self.transition(lifecycle, ConnectionState::Connected);
        info!(
            target: "mqsink.ingest",
            host = %self.config.host,
            port = self.config.port,
            generation = lifecycle.generation,
            topics = self.config.topics.len(),
            "broker_connected"
        );
        Ok(())
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        let mut lifecycle = self.lifecycle.lock().await;
        self.transition(&mut lifecycle, ConnectionState::ShuttingDown);
        if let Some(pump) = lifecycle.pump.take() {
            if tokio::time::timeout(PUMP_SHUTDOWN_TIMEOUT, pump).await.is_err() {
                warn!(target: "mqsink.ingest", "message_pump_shutdown_timeout");
            }
        }
        info!(target: "mqsink.ingest", "lifecycle_stopped");
    }

    fn transition(&self, lifecycle: &mut Lifecycle, next: ConnectionState) {
        if lifecycle.state == next || lifecycle.state.is_terminal() {
            return;
        }
        debug!(
            target: "mqsink.ingest",
            from = %lifecycle.state,
            to = %next,
            "connection_state_changed"
        );
        lifecycle.state = next;
        self.state_tx.send_replace(next);
    }

    /// 可被取消打断的等待；被取消时返回 `false`。
    async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// 消息泵：把会话事件交给处理器，断开时投递一次通知后退出；取消时主动断开。
async fn pump_session(
    mut session: Box<dyn BrokerSession>,
    generation: u64,
    handler: Arc<dyn MessageHandler>,
    cancel: CancellationToken,
    notices: mpsc::UnboundedSender<DisconnectNotice>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = session.next_event() => event,
        };
        match event {
            SessionEvent::Message(message) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = handler.handle(message) => {}
                }
            }
            SessionEvent::Disconnected(reason) => {
                let _ = notices.send(DisconnectNotice { generation, reason });
                return;
            }
        }
    }
    session.disconnect().await;
    debug!(target: "mqsink.ingest", generation = generation, "session_closed");
}
