//! rumqttc（MQTT v5）传输实现。

use crate::error::ConnectError;
use crate::transport::{BrokerConfig, BrokerSession, BrokerTransport, SessionEvent};
use async_trait::async_trait;
use domain::{DisconnectReason, InboundMessage};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::mqttbytes::v5::{DisconnectReasonCode, Packet, Publish, SubscribeReasonCode};
use rumqttc::v5::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, StateError};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

/// 请求通道容量。
const REQUEST_CAPACITY: usize = 64;
/// 可接收的最大报文长度，取 MQTT 协议上限；rumqttc 默认只收 10 KiB。
const MAX_PACKET_SIZE: u32 = 268_435_455;
/// 主动断开时等待 DISCONNECT 发出的上限。
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// rumqttc 传输：每次 `connect` 新建 client + eventloop，不复用旧会话。
#[derive(Debug, Default, Clone)]
pub struct RumqttcTransport;

#[async_trait]
impl BrokerTransport for RumqttcTransport {
    async fn connect(&self, config: &BrokerConfig) -> Result<Box<dyn BrokerSession>, ConnectError> {
        let mut options =
            MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_start(true);
        options.set_max_packet_size(Some(MAX_PACKET_SIZE));
        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let mut session = RumqttcSession {
            client,
            eventloop,
            client_id: config.client_id.clone(),
            connect_timeout: config.connect_timeout,
            pending: VecDeque::new(),
        };
        session.await_connack().await?;
        Ok(Box::new(session))
    }
}

struct RumqttcSession {
    client: AsyncClient,
    eventloop: EventLoop,
    client_id: String,
    connect_timeout: Duration,
    /// 等待 SUBACK 期间到达的消息（如 retained 消息），先于后续消息投递。
    pending: VecDeque<InboundMessage>,
}

impl RumqttcSession {
    async fn await_connack(&mut self) -> Result<(), ConnectError> {
        let timeout = self.connect_timeout;
        let wait = async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(ConnectionError::ConnectionRefused(code)) => {
                        return Err(ConnectError::Refused(format!("{:?}", code)));
                    }
                    Err(err) => return Err(ConnectError::Transport(err.to_string())),
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .unwrap_or(Err(ConnectError::Timeout("connack")))
    }

    async fn await_suback(&mut self, filter: &str) -> Result<(), ConnectError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(suback))) => {
                    let accepted = suback
                        .return_codes
                        .iter()
                        .all(|code| matches!(code, SubscribeReasonCode::Success(_)));
                    if accepted {
                        return Ok(());
                    }
                    return Err(ConnectError::Subscribe {
                        filter: filter.to_string(),
                        reason: format!("{:?}", suback.return_codes),
                    });
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(message) = to_inbound(&self.client_id, publish) {
                        self.pending.push_back(message);
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect(disconnect))) => {
                    return Err(ConnectError::Transport(format!(
                        "disconnected by broker: {:?}",
                        disconnect.reason_code
                    )));
                }
                Ok(_) => {}
                Err(err) => return Err(ConnectError::Transport(err.to_string())),
            }
        }
    }
}

#[async_trait]
impl BrokerSession for RumqttcSession {
    async fn subscribe(&mut self, filter: &str, qos: u8) -> Result<(), ConnectError> {
        self.client
            .subscribe(filter.to_string(), qos_from_u8(qos))
            .await
            .map_err(|err| ConnectError::Subscribe {
                filter: filter.to_string(),
                reason: err.to_string(),
            })?;
        let timeout = self.connect_timeout;
        tokio::time::timeout(timeout, self.await_suback(filter))
            .await
            .unwrap_or(Err(ConnectError::Timeout("suback")))
    }

    async fn next_event(&mut self) -> SessionEvent {
        if let Some(message) = self.pending.pop_front() {
            return SessionEvent::Message(message);
        }
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(message) = to_inbound(&self.client_id, publish) {
                        return SessionEvent::Message(message);
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect(disconnect))) => {
                    return SessionEvent::Disconnected(reason_from_code(disconnect.reason_code));
                }
                Ok(_) => {}
                Err(ConnectionError::MqttState(StateError::ServerDisconnect {
                    reason_code, ..
                })) => {
                    return SessionEvent::Disconnected(reason_from_code(reason_code));
                }
                Err(err) => {
                    warn!(target: "mqsink.ingest", error = %err, "broker_connection_lost");
                    return SessionEvent::Disconnected(DisconnectReason::Other);
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Err(err) = self.client.disconnect().await {
            debug!(target: "mqsink.ingest", error = %err, "disconnect_request_failed");
            return;
        }
        // 驱动 eventloop 把 DISCONNECT 发出去，连接关闭后 poll 返回错误。
        let flush = async {
            while self.eventloop.poll().await.is_ok() {}
        };
        let _ = tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, flush).await;
    }
}

/// PUBLISH → 入站消息；topic 为空或非 UTF-8 时跳过。
fn to_inbound(client_id: &str, publish: Publish) -> Option<InboundMessage> {
    let topic = match std::str::from_utf8(&publish.topic) {
        Ok(topic) if !topic.is_empty() => topic.to_string(),
        _ => {
            warn!(
                target: "mqsink.ingest",
                topic_len = publish.topic.len(),
                "mqtt_topic_skipped"
            );
            return None;
        }
    };
    let user_properties = publish
        .properties
        .map(|properties| properties.user_properties)
        .unwrap_or_default();
    Some(InboundMessage {
        topic,
        qos: qos_to_u8(publish.qos),
        retained: publish.retain,
        client_id: client_id.to_string(),
        payload: publish.payload.to_vec(),
        user_properties,
    })
}

fn reason_from_code(code: DisconnectReasonCode) -> DisconnectReason {
    match code {
        DisconnectReasonCode::NormalDisconnection => DisconnectReason::Normal,
        DisconnectReasonCode::ServerBusy => DisconnectReason::ServerBusy,
        DisconnectReasonCode::ProtocolError => DisconnectReason::ProtocolError,
        _ => DisconnectReason::Other,
    }
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

fn qos_to_u8(qos: QoS) -> u8 {
    match qos {
        QoS::AtMostOnce => 0,
        QoS::AtLeastOnce => 1,
        QoS::ExactlyOnce => 2,
    }
}
