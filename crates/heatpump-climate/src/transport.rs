//! Publish/subscribe seam between the adapter and the message broker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ClimateError, ClimateResult};

/// Delivery guarantee requested from the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl TryFrom<u8> for QoS {
    type Error = ClimateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(ClimateError::Configuration(format!(
                "QoS must be 0, 1 or 2, got {}",
                other
            ))),
        }
    }
}

/// Message transport used by [`crate::ClimateAdapter`].
///
/// Publishing is fire-and-forget: `Ok` means the message was handed to the
/// transport, not that the device acted on it. Calls are made with the
/// adapter's state lock held and must not wait for delivery to make room.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start receiving messages published on `topic`.
    async fn subscribe(&self, topic: &str, qos: QoS) -> ClimateResult<()>;

    /// Stop receiving messages published on `topic`.
    async fn unsubscribe(&self, topic: &str) -> ClimateResult<()>;

    /// Publish `payload` on `topic`.
    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> ClimateResult<()>;
}
