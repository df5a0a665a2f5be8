//! Heat pump climate adapter.
//!
//! Bridges a host platform's climate model to a heat pump that only speaks
//! JSON over three publish/subscribe topics.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `mqtt` | ✅ | `rumqttc` transport and event loop driver |
//!
//! ## Architecture
//!
//! - **modes**: host/device mode translation and fan/vane vocabularies
//! - **payload**: all-or-nothing decoding of the two status topics
//! - **command**: typed command objects and setpoint quantization
//! - **ClimateAdapter**: owns the mirrored [`DeviceState`] and serializes
//!   every inbound message and outbound request through one lock
//! - **Transport**: publish/subscribe seam, implemented over MQTT by `mqtt`
//! - **StateObserver**: the single "state changed" signal the host listens to

pub mod adapter;
pub mod command;
pub mod config;
pub mod error;
pub mod modes;
pub mod observer;
pub mod payload;
pub mod state;
pub mod transport;

#[cfg(feature = "mqtt")]
pub mod mqtt;

// Re-exports for convenience
pub use adapter::{ClimateAdapter, TEMPERATURE_UNIT};
pub use command::{quantize, Command, TEMPERATURE_STEP};
pub use config::{AppConfig, BrokerConfig, ClimateConfig};
pub use error::{ClimateError, ClimateResult, TokenKind};
pub use modes::{
    to_device, to_host, ActivityState, DeviceMode, HostMode, TokenPolicy, FAN_MODES, MODE_TABLE,
    SWING_MODES,
};
pub use observer::{ChannelObserver, NoopObserver, StateObserver};
pub use payload::Power;
pub use state::DeviceState;
pub use transport::{QoS, Transport};

#[cfg(feature = "mqtt")]
pub use mqtt::{connect, handle_event, run_event_loop, LoopControl, LoopState, MqttTransport};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
