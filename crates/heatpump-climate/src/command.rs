//! Outbound commands published on the command topic.
//!
//! Each command encodes to exactly one of the shapes the firmware accepts:
//!
//! ```text
//! {"temperature": 21.5}
//! {"fan": "QUIET"}
//! {"vane": "SWING"}
//! {"power": "OFF"}
//! {"power": "ON", "mode": "HEAT"}
//! ```

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ClimateResult;
use crate::modes::DeviceMode;

/// Setpoint resolution accepted by the device, in °C.
pub const TEMPERATURE_STEP: f64 = 0.5;

/// Round a setpoint to the nearest half degree.
pub fn quantize(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}

/// A single state change requested from the device.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Target temperature, already quantized
    Temperature(f64),
    /// Fan speed token
    Fan(String),
    /// Vertical vane token
    Vane(String),
    /// Switch the unit off
    PowerOff,
    /// Switch the unit on in the given mode
    PowerOn(DeviceMode),
}

impl Command {
    /// Build a temperature command, quantizing the value.
    pub fn temperature(value: f64) -> Self {
        Self::Temperature(quantize(value))
    }

    /// Build the power command for a device mode.
    pub fn power_for(mode: DeviceMode) -> Self {
        match mode {
            DeviceMode::Off => Self::PowerOff,
            mode => Self::PowerOn(mode),
        }
    }

    /// Encode as the JSON payload sent to the device.
    pub fn to_payload(&self) -> ClimateResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Temperature(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("temperature", value)?;
                map.end()
            }
            Self::Fan(token) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("fan", token)?;
                map.end()
            }
            Self::Vane(token) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("vane", token)?;
                map.end()
            }
            Self::PowerOff => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("power", "OFF")?;
                map.end()
            }
            Self::PowerOn(mode) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("power", "ON")?;
                map.serialize_entry("mode", mode.as_str())?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(21.3), 21.5);
        assert_eq!(quantize(21.2), 21.0);
        assert_eq!(quantize(21.75), 22.0);
        assert_eq!(quantize(-3.3), -3.5);
    }

    #[test]
    fn test_quantize_idempotent() {
        for x in [-10.26, 0.0, 0.24, 16.49, 21.3, 22.75, 30.01] {
            assert_eq!(quantize(quantize(x)), quantize(x));
        }
    }

    #[test]
    fn test_power_commands() {
        let on = serde_json::to_value(Command::power_for(DeviceMode::Heat)).unwrap();
        assert_eq!(on, json!({"power": "ON", "mode": "HEAT"}));

        let off = serde_json::to_value(Command::power_for(DeviceMode::Off)).unwrap();
        assert_eq!(off, json!({"power": "OFF"}));
        assert!(off.get("mode").is_none());
    }

    #[test]
    fn test_single_field_commands() {
        let temp = serde_json::to_value(Command::temperature(21.3)).unwrap();
        assert_eq!(temp, json!({"temperature": 21.5}));

        let fan = serde_json::to_value(Command::Fan("QUIET".into())).unwrap();
        assert_eq!(fan, json!({"fan": "QUIET"}));

        let vane = serde_json::to_value(Command::Vane("SWING".into())).unwrap();
        assert_eq!(vane, json!({"vane": "SWING"}));
    }

    #[test]
    fn test_payload_escapes_tokens() {
        let payload = Command::Fan("A\"B".into()).to_payload().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["fan"], "A\"B");
    }
}
