//! Inbound payload decoding.
//!
//! Two topics carry device status:
//!
//! - state topic: `{"temperature": 21, "fan": "AUTO", "vane": "3", "power": "ON", "mode": "COOL"}`
//!   (`mode` is only required while `power` is `"ON"`)
//! - temperature-state topic: `{"roomTemperature": 23.4, "operating": true}`
//!
//! Decoding is all-or-nothing: a report is only produced when every required
//! field is present and valid, so the caller never applies half a message.

use serde::{Deserialize, Serialize};

use crate::error::{ClimateError, ClimateResult, TokenKind};
use crate::modes::{normalize_token, DeviceMode, TokenPolicy, FAN_MODES, SWING_MODES};

/// Power switch position reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Power {
    On,
    Off,
}

#[derive(Debug, Deserialize)]
struct RawStateMessage {
    temperature: f64,
    fan: String,
    vane: String,
    power: Power,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTemperatureMessage {
    room_temperature: f64,
    #[serde(default)]
    operating: Option<bool>,
}

/// Decoded settings snapshot from the state topic.
#[derive(Debug, Clone, PartialEq)]
pub struct StateReport {
    pub target_temperature: f64,
    pub fan: String,
    pub vane: String,
    pub power: Power,
    /// [`DeviceMode::Off`] whenever `power` is off.
    pub mode: DeviceMode,
}

/// Decoded measurement from the temperature-state topic.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureReport {
    pub room_temperature: f64,
    pub operating: Option<bool>,
}

fn device_token(
    kind: TokenKind,
    vocabulary: &[&str],
    token: &str,
    policy: TokenPolicy,
) -> ClimateResult<String> {
    normalize_token(kind, vocabulary, token, policy)
        .map_err(|e| ClimateError::Decode(e.to_string()))
}

/// Decode a state-topic payload.
pub fn decode_state(payload: &[u8], policy: TokenPolicy) -> ClimateResult<StateReport> {
    let raw: RawStateMessage = serde_json::from_slice(payload)?;

    let mode = match raw.power {
        Power::Off => DeviceMode::Off,
        Power::On => {
            let token = raw.mode.ok_or_else(|| {
                ClimateError::Decode("missing field `mode` while power is ON".to_string())
            })?;
            token
                .parse::<DeviceMode>()
                .map_err(|e| ClimateError::Decode(e.to_string()))?
        }
    };

    Ok(StateReport {
        target_temperature: raw.temperature,
        fan: device_token(TokenKind::Fan, &FAN_MODES, &raw.fan, policy)?,
        vane: device_token(TokenKind::Swing, &SWING_MODES, &raw.vane, policy)?,
        power: raw.power,
        mode,
    })
}

/// Decode a temperature-state payload.
pub fn decode_temperature(payload: &[u8]) -> ClimateResult<TemperatureReport> {
    let raw: RawTemperatureMessage = serde_json::from_slice(payload)?;
    Ok(TemperatureReport {
        room_temperature: raw.room_temperature,
        operating: raw.operating,
    })
}
