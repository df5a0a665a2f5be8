//! Heat pump climate adapter.
//!
//! Mirrors the device state from its two status topics and turns host
//! requests into command messages on the command topic.
//!
//! ## Topic Layout
//!
//! ```text
//! state topic              ──→ power / mode / setpoint / fan / vane
//! temperature-state topic  ──→ room temperature / compressor active
//! command topic            ←── one command object per request
//! ```
//!
//! Every operation runs under a single lock around the device state, so an
//! inbound message can never interleave with a half-applied mutation.
//! Mutations are optimistic: the local state changes before the command is
//! published and there is no acknowledgement. The next status broadcast from
//! the device reconciles any divergence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::command::{quantize, Command, TEMPERATURE_STEP};
use crate::config::ClimateConfig;
use crate::error::{ClimateError, ClimateResult, TokenKind};
use crate::modes::{
    display_token, normalize_token, to_device, ActivityState, HostMode, FAN_MODES, SWING_MODES,
};
use crate::observer::StateObserver;
use crate::payload::{decode_state, decode_temperature};
use crate::state::DeviceState;
use crate::transport::{QoS, Transport};

/// Unit of every temperature the adapter reports.
pub const TEMPERATURE_UNIT: &str = "°C";

/// Which inbound stream a topic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InboundTopic {
    State,
    TemperatureState,
}

/// Stateful bridge between the host's climate model and one heat pump.
pub struct ClimateAdapter {
    /// Device configuration
    config: ClimateConfig,
    /// QoS for subscriptions and publishes
    qos: QoS,
    /// Message transport
    transport: Arc<dyn Transport>,
    /// Host notification sink
    observer: Arc<dyn StateObserver>,
    /// Mirrored device state
    state: Mutex<DeviceState>,
    /// Whether the inbound topics are still subscribed
    subscribed: AtomicBool,
}

impl ClimateAdapter {
    /// Create the adapter and subscribe to both status topics.
    pub async fn new(
        config: ClimateConfig,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn StateObserver>,
    ) -> ClimateResult<Self> {
        let qos = config.transport_qos()?;
        let adapter = Self {
            config,
            qos,
            transport,
            observer,
            state: Mutex::new(DeviceState::new()),
            subscribed: AtomicBool::new(false),
        };
        adapter.subscribe_topics().await?;
        adapter.subscribed.store(true, Ordering::SeqCst);
        info!(
            device = %adapter.config.name,
            state_topic = %adapter.config.state_topic,
            temperature_state_topic = %adapter.config.temperature_state_topic,
            "Climate adapter subscribed"
        );
        Ok(adapter)
    }

    async fn subscribe_topics(&self) -> ClimateResult<()> {
        for topic in [
            &self.config.state_topic,
            &self.config.temperature_state_topic,
        ] {
            self.transport.subscribe(topic, self.qos).await?;
        }
        Ok(())
    }

    /// Re-issue subscriptions after the broker dropped the session.
    pub async fn resubscribe(&self) -> ClimateResult<()> {
        if !self.is_subscribed() {
            return Ok(());
        }
        debug!(device = %self.config.name, "Re-subscribing status topics");
        self.subscribe_topics().await
    }

    /// Release both subscriptions. Safe to call more than once.
    pub async fn shutdown(&self) -> ClimateResult<()> {
        if !self.subscribed.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let mut result = Ok(());
        for topic in [
            &self.config.state_topic,
            &self.config.temperature_state_topic,
        ] {
            if let Err(e) = self.transport.unsubscribe(topic).await {
                warn!(topic = %topic, error = %e, "Failed to unsubscribe");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        info!(device = %self.config.name, "Climate adapter shut down");
        result
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    fn classify(&self, topic: &str) -> Option<InboundTopic> {
        if !self.is_subscribed() {
            return None;
        }
        if topic == self.config.state_topic {
            Some(InboundTopic::State)
        } else if topic == self.config.temperature_state_topic {
            Some(InboundTopic::TemperatureState)
        } else {
            None
        }
    }

    /// Process one inbound message.
    ///
    /// On success the state is updated and the observer notified exactly once.
    /// On error nothing changes and nobody is notified.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> ClimateResult<()> {
        let Some(kind) = self.classify(topic) else {
            debug!(topic = %topic, "Unknown topic");
            return Err(ClimateError::UnrecognizedTopic(topic.to_string()));
        };

        match kind {
            InboundTopic::State => {
                let report = decode_state(payload, self.config.token_policy)
                    .inspect_err(|e| warn!(topic = %topic, error = %e, "Dropping state message"))?;

                let mut state = self.state.lock().await;
                debug!(power = ?report.power, mode = %report.mode, "Applying state");
                state.apply_state(report);
                self.observer.state_changed(&state);
            }
            InboundTopic::TemperatureState => {
                let report = decode_temperature(payload).inspect_err(
                    |e| warn!(topic = %topic, error = %e, "Dropping temperature message"),
                )?;

                let mut state = self.state.lock().await;
                debug!(
                    room_temperature = report.room_temperature,
                    operating = ?report.operating,
                    "Room temperature"
                );
                state.apply_temperature(report);
                self.observer.state_changed(&state);
            }
        }
        Ok(())
    }

    /// Publish a command and notify the host. Called with the state lock held.
    async fn dispatch(&self, state: &DeviceState, command: Command) -> ClimateResult<()> {
        let result = match command.to_payload() {
            Ok(payload) => {
                debug!(
                    topic = %self.config.command_topic,
                    payload = %String::from_utf8_lossy(&payload),
                    "Publishing command"
                );
                self.transport
                    .publish(&self.config.command_topic, self.qos, self.config.retain, payload)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!(topic = %self.config.command_topic, error = %e, "Command not published");
        }
        self.observer.state_changed(state);
        result
    }

    /// Set the target temperature. `None` is a no-op.
    pub async fn set_target_temperature(&self, value: Option<f64>) -> ClimateResult<()> {
        let Some(value) = value else {
            return Ok(());
        };
        if !value.is_finite() {
            return Err(ClimateError::InvalidSetpoint(value));
        }

        let mut state = self.state.lock().await;
        state.set_target_temperature(quantize(value));
        let Some(target) = state.target_temperature() else {
            return Ok(());
        };
        self.dispatch(&state, Command::temperature(target)).await
    }

    /// Set the fan speed. `None` is a no-op.
    pub async fn set_fan_mode(&self, token: Option<&str>) -> ClimateResult<()> {
        let Some(token) = token else {
            return Ok(());
        };
        let token = normalize_token(TokenKind::Fan, &FAN_MODES, token, self.config.token_policy)?;

        let mut state = self.state.lock().await;
        state.set_fan_mode(token.clone());
        self.dispatch(&state, Command::Fan(token)).await
    }

    /// Set the operating mode; [`HostMode::Off`] powers the unit down.
    pub async fn set_hvac_mode(&self, mode: HostMode) -> ClimateResult<()> {
        if !self.config.modes.contains(&mode) {
            return Err(ClimateError::InvalidMode {
                kind: TokenKind::Mode,
                value: mode.to_string(),
            });
        }
        let device_mode = to_device(mode);

        let mut state = self.state.lock().await;
        state.set_device_mode(device_mode);
        self.dispatch(&state, Command::power_for(device_mode)).await
    }

    /// Set the vane position. `None` is a no-op.
    pub async fn set_swing_mode(&self, token: Option<&str>) -> ClimateResult<()> {
        let Some(token) = token else {
            return Ok(());
        };
        let token = normalize_token(TokenKind::Swing, &SWING_MODES, token, self.config.token_policy)?;

        let mut state = self.state.lock().await;
        state.set_swing_mode(token.clone());
        self.dispatch(&state, Command::Vane(token)).await
    }

    /// Copy of the full device state.
    pub async fn snapshot(&self) -> DeviceState {
        self.state.lock().await.clone()
    }

    pub async fn target_temperature(&self) -> Option<f64> {
        self.state.lock().await.target_temperature()
    }

    pub async fn current_temperature(&self) -> Option<f64> {
        self.state.lock().await.current_temperature()
    }

    pub async fn reported_mode(&self) -> Option<HostMode> {
        self.state.lock().await.reported_mode()
    }

    pub async fn activity_state(&self) -> ActivityState {
        self.state.lock().await.activity_state()
    }

    pub async fn fan_mode_display(&self) -> Option<String> {
        self.state.lock().await.fan_mode_display()
    }

    pub async fn swing_mode_display(&self) -> Option<String> {
        self.state.lock().await.swing_mode_display()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Host modes the device supports.
    pub fn hvac_modes(&self) -> &[HostMode] {
        &self.config.modes
    }

    /// Fan speeds in display form.
    pub fn fan_modes(&self) -> Vec<String> {
        FAN_MODES.iter().map(|t| display_token(t)).collect()
    }

    /// Vane positions in display form.
    pub fn swing_modes(&self) -> Vec<String> {
        SWING_MODES.iter().map(|t| display_token(t)).collect()
    }

    pub fn target_temperature_step(&self) -> f64 {
        TEMPERATURE_STEP
    }

    pub fn temperature_unit(&self) -> &'static str {
        TEMPERATURE_UNIT
    }
}

impl std::fmt::Debug for ClimateAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClimateAdapter")
            .field("config", &self.config)
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}
