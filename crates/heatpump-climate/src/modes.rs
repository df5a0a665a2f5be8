//! Mode vocabulary shared by the host and the heat pump.
//!
//! The host speaks [`HostMode`], the device firmware speaks [`DeviceMode`]
//! tokens (`"AUTO"`, `"COOL"`, `"DRY"`, `"HEAT"`, `"FAN"`, `"OFF"`). The two
//! are a bijection, listed once in [`MODE_TABLE`]. Its rows follow the
//! declaration order of both enums, so either direction is an index lookup.
//!
//! Fan and vane positions are not remapped: they travel as upper-case tokens
//! drawn from [`FAN_MODES`] and [`SWING_MODES`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ClimateError, ClimateResult, TokenKind};

/// Climate mode as seen by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostMode {
    Auto,
    Cool,
    Dry,
    Heat,
    FanOnly,
    Off,
}

impl HostMode {
    /// Every host mode, in the order the host lists them.
    pub const ALL: [HostMode; 6] = [
        HostMode::Auto,
        HostMode::Cool,
        HostMode::Dry,
        HostMode::Heat,
        HostMode::FanOnly,
        HostMode::Off,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cool => "cool",
            Self::Dry => "dry",
            Self::Heat => "heat",
            Self::FanOnly => "fan_only",
            Self::Off => "off",
        }
    }
}

impl std::fmt::Display for HostMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostMode {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(Self::Auto),
            "cool" => Ok(Self::Cool),
            "dry" => Ok(Self::Dry),
            "heat" => Ok(Self::Heat),
            "fan_only" => Ok(Self::FanOnly),
            "off" => Ok(Self::Off),
            _ => Err(ClimateError::InvalidMode {
                kind: TokenKind::Mode,
                value: s.to_string(),
            }),
        }
    }
}

/// Mode token understood by the heat pump firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceMode {
    Auto,
    Cool,
    Dry,
    Heat,
    Fan,
    Off,
}

impl DeviceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Cool => "COOL",
            Self::Dry => "DRY",
            Self::Heat => "HEAT",
            Self::Fan => "FAN",
            Self::Off => "OFF",
        }
    }
}

impl std::fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceMode {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MODE_TABLE
            .iter()
            .find(|(_, device)| device.as_str() == s)
            .map(|(_, device)| *device)
            .ok_or_else(|| ClimateError::UnknownMode(s.to_string()))
    }
}

/// Host mode to device token mapping.
pub const MODE_TABLE: [(HostMode, DeviceMode); 6] = [
    (HostMode::Auto, DeviceMode::Auto),
    (HostMode::Cool, DeviceMode::Cool),
    (HostMode::Dry, DeviceMode::Dry),
    (HostMode::Heat, DeviceMode::Heat),
    (HostMode::FanOnly, DeviceMode::Fan),
    (HostMode::Off, DeviceMode::Off),
];

/// Fan speeds accepted by the device.
pub const FAN_MODES: [&str; 6] = ["AUTO", "QUIET", "1", "2", "3", "4"];

/// Vertical vane positions accepted by the device.
pub const SWING_MODES: [&str; 7] = ["AUTO", "1", "2", "3", "4", "5", "SWING"];

impl From<HostMode> for DeviceMode {
    fn from(mode: HostMode) -> Self {
        to_device(mode)
    }
}

impl From<DeviceMode> for HostMode {
    fn from(mode: DeviceMode) -> Self {
        MODE_TABLE[mode as usize].0
    }
}

/// Translate a host mode to the device vocabulary.
pub fn to_device(mode: HostMode) -> DeviceMode {
    MODE_TABLE[mode as usize].1
}

/// Translate a raw device token to a host mode.
///
/// Fails with [`ClimateError::UnknownMode`] for tokens outside the known set,
/// since that means the firmware contract changed.
pub fn to_host(token: &str) -> ClimateResult<HostMode> {
    token.parse::<DeviceMode>().map(HostMode::from)
}

/// Momentary functional state of the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    Off,
    Idle,
    Heating,
    Cooling,
    Drying,
}

/// How caller-supplied fan/swing tokens outside the known set are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPolicy {
    /// Reject with [`ClimateError::InvalidMode`] before anything is published.
    #[default]
    Strict,
    /// Forward the token verbatim and log a warning.
    Passthrough,
}

/// Upper-case a caller token and check it against `vocabulary`.
///
/// `kind` only labels the error and the passthrough warning.
pub fn normalize_token(
    kind: TokenKind,
    vocabulary: &[&str],
    token: &str,
    policy: TokenPolicy,
) -> ClimateResult<String> {
    let token = token.to_uppercase();
    if vocabulary.contains(&token.as_str()) {
        return Ok(token);
    }

    match policy {
        TokenPolicy::Strict => Err(ClimateError::InvalidMode { kind, value: token }),
        TokenPolicy::Passthrough => {
            warn!(kind = %kind, token = %token, "Forwarding unknown token to device");
            Ok(token)
        }
    }
}

/// Display form of a device token: first letter upper case, rest lower case.
pub fn display_token(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
