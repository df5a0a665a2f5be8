//! Configuration for the broker connection and the climate device.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [broker]
//! host = "192.168.1.10"
//! port = 1883
//!
//! [climate]
//! name = "Living Room"
//! state_topic = "heatpump"
//! temperature_state_topic = "heatpump/status"
//! command_topic = "heatpump/set"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ClimateError, ClimateResult};
use crate::modes::{HostMode, TokenPolicy};
use crate::transport::QoS;

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker host name or address
    pub host: String,

    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client ID (auto-generated if not provided)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Username for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,
}

fn default_port() -> u16 {
    1883
}
fn default_keep_alive() -> u64 {
    60
}

impl BrokerConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive: default_keep_alive(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn full_broker_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for one heat pump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateConfig {
    /// Display name
    #[serde(default = "default_name")]
    pub name: String,

    /// Topic carrying power/mode/setpoint/fan/vane snapshots
    pub state_topic: String,

    /// Topic carrying the measured room temperature
    pub temperature_state_topic: String,

    /// Topic the device listens on for commands
    pub command_topic: String,

    /// QoS level for subscriptions and publishes
    #[serde(default)]
    pub qos: u8,

    /// Retain flag for published commands
    #[serde(default)]
    pub retain: bool,

    /// Host modes the device supports
    #[serde(default = "default_modes")]
    pub modes: Vec<HostMode>,

    /// Treatment of fan/swing tokens outside the known set
    #[serde(default)]
    pub token_policy: TokenPolicy,
}

fn default_name() -> String {
    "MQTT Climate".to_string()
}
fn default_modes() -> Vec<HostMode> {
    HostMode::ALL.to_vec()
}

impl ClimateConfig {
    /// Create a config with the usual `<base>`, `<base>/status`, `<base>/set` topic layout.
    pub fn new(base_topic: impl Into<String>) -> Self {
        let base = base_topic.into();
        Self {
            name: default_name(),
            state_topic: base.clone(),
            temperature_state_topic: format!("{}/status", base),
            command_topic: format!("{}/set", base),
            qos: 0,
            retain: false,
            modes: default_modes(),
            token_policy: TokenPolicy::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_qos(mut self, qos: u8) -> Self {
        self.qos = qos;
        self
    }

    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn with_modes(mut self, modes: Vec<HostMode>) -> Self {
        self.modes = modes;
        self
    }

    pub fn with_token_policy(mut self, policy: TokenPolicy) -> Self {
        self.token_policy = policy;
        self
    }

    /// Transport QoS for this device.
    pub fn transport_qos(&self) -> ClimateResult<QoS> {
        QoS::try_from(self.qos)
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub climate: ClimateConfig,
}

impl AppConfig {
    /// Parse TOML configuration.
    pub fn from_toml_str(content: &str) -> ClimateResult<Self> {
        toml::from_str(content).map_err(|e| ClimateError::Configuration(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ClimateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClimateError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(
            category = "config",
            path = %path.display(),
            broker = %config.broker.full_broker_addr(),
            device = %config.climate.name,
            "Loaded configuration"
        );
        Ok(config)
    }
}
