//! Mirrored device state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::modes::{display_token, ActivityState, DeviceMode, HostMode};
use crate::payload::{Power, StateReport, TemperatureReport};

/// Last-known (or last-requested) state of one heat pump.
///
/// Every field starts out unknown and is filled either by a decoded status
/// message or by an optimistic local mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceState {
    power: Option<Power>,
    mode: Option<DeviceMode>,
    target_temperature: Option<f64>,
    current_temperature: Option<f64>,
    fan_mode: Option<String>,
    swing_mode: Option<String>,
    operating: bool,
    last_updated: Option<DateTime<Utc>>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power(&self) -> Option<Power> {
        self.power
    }

    /// Raw device mode; [`DeviceMode::Off`] while powered off.
    pub fn mode(&self) -> Option<DeviceMode> {
        self.mode
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.target_temperature
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.current_temperature
    }

    pub fn fan_mode(&self) -> Option<&str> {
        self.fan_mode.as_deref()
    }

    pub fn swing_mode(&self) -> Option<&str> {
        self.swing_mode.as_deref()
    }

    /// Whether the compressor is actively conditioning.
    pub fn operating(&self) -> bool {
        self.operating
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Host mode to report. Power off masks whatever mode was last set.
    pub fn reported_mode(&self) -> Option<HostMode> {
        if self.power == Some(Power::Off) {
            return Some(HostMode::Off);
        }
        self.mode.map(HostMode::from)
    }

    pub fn activity_state(&self) -> ActivityState {
        match self.power {
            Some(Power::Off) => ActivityState::Off,
            Some(Power::On) if self.operating => match self.mode {
                Some(DeviceMode::Heat) => ActivityState::Heating,
                Some(DeviceMode::Cool) => ActivityState::Cooling,
                Some(DeviceMode::Dry) => ActivityState::Drying,
                _ => ActivityState::Idle,
            },
            _ => ActivityState::Idle,
        }
    }

    pub fn fan_mode_display(&self) -> Option<String> {
        self.fan_mode.as_deref().map(display_token)
    }

    pub fn swing_mode_display(&self) -> Option<String> {
        self.swing_mode.as_deref().map(display_token)
    }

    pub(crate) fn apply_state(&mut self, report: StateReport) {
        self.target_temperature = Some(report.target_temperature);
        self.fan_mode = Some(report.fan);
        self.swing_mode = Some(report.vane);
        self.power = Some(report.power);
        self.mode = Some(report.mode);
        self.touch();
    }

    pub(crate) fn apply_temperature(&mut self, report: TemperatureReport) {
        self.current_temperature = Some(report.room_temperature);
        if let Some(operating) = report.operating {
            self.operating = operating;
        }
        self.touch();
    }

    pub(crate) fn set_target_temperature(&mut self, value: f64) {
        self.target_temperature = Some(value);
        self.touch();
    }

    pub(crate) fn set_fan_mode(&mut self, token: String) {
        self.fan_mode = Some(token);
        self.touch();
    }

    pub(crate) fn set_swing_mode(&mut self, token: String) {
        self.swing_mode = Some(token);
        self.touch();
    }

    pub(crate) fn set_device_mode(&mut self, mode: DeviceMode) {
        self.power = Some(if mode == DeviceMode::Off {
            Power::Off
        } else {
            Power::On
        });
        self.mode = Some(mode);
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
    }
}
