//! MQTT transport over `rumqttc`.
//!
//! Requests are queued with the non-blocking `try_*` client calls. The
//! adapter publishes while holding its state lock, and the event loop that
//! drains the request queue needs that same lock to deliver messages, so a
//! full queue must fail fast instead of waiting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Outgoing, Packet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapter::ClimateAdapter;
use crate::config::BrokerConfig;
use crate::error::{ClimateError, ClimateResult};
use crate::transport::{QoS, Transport};

/// Consecutive event loop errors tolerated before giving up.
const MAX_CONNECTION_ERRORS: u32 = 5;

/// Request channel capacity between client and event loop.
const REQUEST_CAPACITY: usize = 10;

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

fn request_error(action: &str, topic: &str, e: ClientError) -> ClimateError {
    ClimateError::Transport(format!("{} {}: {}", action, topic, e))
}

/// [`Transport`] backed by a `rumqttc` client.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl MqttTransport {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    /// Ask the event loop to send DISCONNECT once queued requests are flushed.
    pub async fn disconnect(&self) -> ClimateResult<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| ClimateError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn subscribe(&self, topic: &str, qos: QoS) -> ClimateResult<()> {
        self.client
            .try_subscribe(topic, qos.into())
            .map_err(|e| request_error("subscribe", topic, e))
    }

    async fn unsubscribe(&self, topic: &str) -> ClimateResult<()> {
        self.client
            .try_unsubscribe(topic)
            .map_err(|e| request_error("unsubscribe", topic, e))
    }

    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> ClimateResult<()> {
        self.client
            .try_publish(topic, qos.into(), retain, payload)
            .map_err(|e| request_error("publish", topic, e))
    }
}

/// Build MQTT options from the broker config.
pub fn mqtt_options(config: &BrokerConfig) -> MqttOptions {
    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(|| format!("heatpump-{}", Uuid::new_v4()));
    let mut options = MqttOptions::new(client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive));

    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        options.set_credentials(user, pass);
    }
    options
}

/// Create a client for the configured broker.
///
/// Nothing goes over the wire until the returned event loop is polled,
/// usually through [`run_event_loop`].
pub fn connect(config: &BrokerConfig) -> (MqttTransport, EventLoop) {
    let (client, eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);
    info!(broker = %config.full_broker_addr(), "MQTT client created");
    (MqttTransport::new(client), eventloop)
}

/// Whether the event loop keeps polling after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

/// Bookkeeping carried across polls of one event loop.
#[derive(Debug, Default)]
pub struct LoopState {
    error_count: u32,
    connected_once: bool,
}

impl LoopState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consecutive failed polls so far.
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Count a failed poll. Errors once [`MAX_CONNECTION_ERRORS`] is reached.
    pub fn record_error(&mut self, e: &impl std::fmt::Display) -> ClimateResult<()> {
        self.error_count += 1;
        if self.error_count >= MAX_CONNECTION_ERRORS {
            error!(
                "MQTT error count reached {}, stopping: {}",
                MAX_CONNECTION_ERRORS, e
            );
            return Err(ClimateError::Transport(e.to_string()));
        }
        warn!(
            "MQTT error ({}/{}): {}",
            self.error_count, MAX_CONNECTION_ERRORS, e
        );
        Ok(())
    }
}

/// Handle one successfully polled event.
///
/// Errors from individual messages are logged and never stop the loop.
pub async fn handle_event(
    adapter: &ClimateAdapter,
    event: Event,
    state: &mut LoopState,
) -> LoopControl {
    state.error_count = 0;

    match event {
        Event::Incoming(Packet::Publish(publish)) => {
            if let Err(e) = adapter.handle_message(&publish.topic, &publish.payload).await {
                debug!(topic = %publish.topic, error = %e, "Message not applied");
            }
        }
        Event::Incoming(Packet::ConnAck(ack)) => {
            info!(session_present = ack.session_present, "MQTT connection acknowledged");
            if state.connected_once && !ack.session_present {
                if let Err(e) = adapter.resubscribe().await {
                    warn!(error = %e, "Failed to re-subscribe after reconnect");
                }
            }
            state.connected_once = true;
        }
        Event::Outgoing(Outgoing::Disconnect) => {
            info!("MQTT client disconnected");
            return LoopControl::Stop;
        }
        _ => {}
    }
    LoopControl::Continue
}

/// Drive the event loop, feeding every incoming publish to the adapter.
///
/// Returns `Ok` after a requested disconnect and an error once the broker has
/// been unreachable for [`MAX_CONNECTION_ERRORS`] consecutive polls.
pub async fn run_event_loop(
    adapter: Arc<ClimateAdapter>,
    mut eventloop: EventLoop,
) -> ClimateResult<()> {
    let mut state = LoopState::new();

    loop {
        match eventloop.poll().await {
            Ok(event) => {
                if handle_event(&adapter, event, &mut state).await == LoopControl::Stop {
                    return Ok(());
                }
            }
            Err(e) => {
                state.record_error(&e)?;
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClimateConfig;
    use crate::observer::NoopObserver;
    use rumqttc::{ConnAck, ConnectReturnCode, Publish};
    use std::sync::Mutex;

    #[derive(Default)]
    struct SubscriptionLog {
        topics: Mutex<Vec<String>>,
    }

    impl SubscriptionLog {
        fn count(&self) -> usize {
            self.topics.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for SubscriptionLog {
        async fn subscribe(&self, topic: &str, _qos: QoS) -> ClimateResult<()> {
            self.topics.lock().unwrap().push(topic.to_string());
            Ok(())
        }

        async fn unsubscribe(&self, _topic: &str) -> ClimateResult<()> {
            Ok(())
        }

        async fn publish(
            &self,
            _topic: &str,
            _qos: QoS,
            _retain: bool,
            _payload: Vec<u8>,
        ) -> ClimateResult<()> {
            Ok(())
        }
    }

    async fn logged_adapter() -> (ClimateAdapter, Arc<SubscriptionLog>) {
        let log = Arc::new(SubscriptionLog::default());
        let adapter = ClimateAdapter::new(
            ClimateConfig::new("hp"),
            log.clone(),
            Arc::new(NoopObserver),
        )
        .await
        .unwrap();
        (adapter, log)
    }

    fn incoming(topic: &str, payload: &[u8]) -> Event {
        Event::Incoming(Packet::Publish(Publish::new(
            topic,
            rumqttc::QoS::AtMostOnce,
            payload.to_vec(),
        )))
    }

    fn conn_ack(session_present: bool) -> Event {
        Event::Incoming(Packet::ConnAck(ConnAck {
            session_present,
            code: ConnectReturnCode::Success,
        }))
    }

    #[test]
    fn test_qos_conversion() {
        assert_eq!(rumqttc::QoS::from(QoS::AtMostOnce), rumqttc::QoS::AtMostOnce);
        assert_eq!(rumqttc::QoS::from(QoS::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }

    #[test]
    fn test_mqtt_options() {
        let config = BrokerConfig::new("localhost")
            .with_port(1884)
            .with_client_id("hp-1");
        let options = mqtt_options(&config);
        assert_eq!(options.client_id(), "hp-1");
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1884));
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
    }

    #[test]
    fn test_generated_client_id() {
        let options = mqtt_options(&BrokerConfig::new("localhost"));
        assert!(options.client_id().starts_with("heatpump-"));
    }

    #[tokio::test]
    async fn test_publish_event_reaches_adapter() {
        let (adapter, _) = logged_adapter().await;
        let mut state = LoopState::new();

        let control =
            handle_event(&adapter, incoming("hp/status", br#"{"roomTemperature":21.5}"#), &mut state)
                .await;

        assert_eq!(control, LoopControl::Continue);
        assert_eq!(adapter.current_temperature().await, Some(21.5));
    }

    #[tokio::test]
    async fn test_bad_messages_keep_loop_running() {
        let (adapter, _) = logged_adapter().await;
        let mut state = LoopState::new();
        state.record_error(&"connection refused").unwrap();
        state.record_error(&"connection refused").unwrap();
        assert_eq!(state.error_count(), 2);

        for event in [
            incoming("hp", b"not json"),
            incoming("hp", br#"{"temperature":21,"fan":"AUTO","vane":"AUTO"}"#),
            incoming("elsewhere", br#"{"roomTemperature":21}"#),
        ] {
            assert_eq!(handle_event(&adapter, event, &mut state).await, LoopControl::Continue);
        }
        assert_eq!(state.error_count(), 0);
        assert_eq!(adapter.snapshot().await, crate::state::DeviceState::new());
    }

    #[test]
    fn test_gives_up_after_consecutive_errors() {
        let mut state = LoopState::new();
        for _ in 1..MAX_CONNECTION_ERRORS {
            assert!(state.record_error(&"network timeout").is_ok());
        }
        let err = state.record_error(&"network timeout").unwrap_err();
        assert!(matches!(err, ClimateError::Transport(ref msg) if msg == "network timeout"));
    }

    #[tokio::test]
    async fn test_resubscribe_only_on_fresh_session() {
        let (adapter, log) = logged_adapter().await;
        let mut state = LoopState::new();
        assert_eq!(log.count(), 2);

        // First connection uses the subscriptions issued at construction.
        handle_event(&adapter, conn_ack(false), &mut state).await;
        assert_eq!(log.count(), 2);

        handle_event(&adapter, conn_ack(false), &mut state).await;
        assert_eq!(log.count(), 4);

        handle_event(&adapter, conn_ack(true), &mut state).await;
        assert_eq!(log.count(), 4);
    }

    #[tokio::test]
    async fn test_disconnect_stops_loop() {
        let (adapter, _) = logged_adapter().await;
        let mut state = LoopState::new();
        let control =
            handle_event(&adapter, Event::Outgoing(Outgoing::Disconnect), &mut state).await;
        assert_eq!(control, LoopControl::Stop);
    }

    #[tokio::test]
    async fn test_full_request_queue_does_not_block() {
        // Event loop is never polled, so the request queue only fills up.
        let (transport, _eventloop) = connect(&BrokerConfig::new("127.0.0.1").with_port(1));
        let adapter = ClimateAdapter::new(
            ClimateConfig::new("hp"),
            Arc::new(transport),
            Arc::new(NoopObserver),
        )
        .await
        .unwrap();

        let rejected = tokio::time::timeout(Duration::from_secs(2), async {
            let mut rejected = 0;
            for _ in 0..REQUEST_CAPACITY * 2 {
                if let Err(ClimateError::Transport(_)) = adapter.set_fan_mode(Some("AUTO")).await {
                    rejected += 1;
                }
            }
            rejected
        })
        .await
        .expect("mutations blocked on a full request queue");
        assert!(rejected > 0);
        assert_eq!(adapter.fan_mode_display().await.as_deref(), Some("Auto"));

        let applied = tokio::time::timeout(
            Duration::from_secs(2),
            adapter.handle_message("hp/status", br#"{"roomTemperature":21}"#),
        )
        .await
        .expect("inbound message blocked behind a publish");
        assert!(applied.is_ok());
        assert_eq!(adapter.current_temperature().await, Some(21.0));
    }
}
