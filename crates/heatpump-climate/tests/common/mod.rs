//! Shared test doubles for adapter tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use heatpump_climate::{
    ClimateAdapter, ClimateConfig, ClimateError, ClimateResult, DeviceState, QoS, StateObserver,
    Transport,
};

pub const STATE_TOPIC: &str = "heatpump";
pub const TEMPERATURE_TOPIC: &str = "heatpump/status";
pub const COMMAND_TOPIC: &str = "heatpump/set";

/// A message handed to the transport.
#[derive(Debug, Clone)]
pub struct Published {
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
    pub payload: serde_json::Value,
}

/// In-memory transport that records every call.
#[derive(Default)]
pub struct RecordingTransport {
    pub subscriptions: Mutex<Vec<String>>,
    pub unsubscriptions: Mutex<Vec<String>>,
    pub published: Mutex<Vec<Published>>,
    pub fail_publish: AtomicBool,
}

impl RecordingTransport {
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.published().into_iter().map(|p| p.payload).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn subscribe(&self, topic: &str, _qos: QoS) -> ClimateResult<()> {
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> ClimateResult<()> {
        self.unsubscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> ClimateResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(ClimateError::Transport("broker unavailable".to_string()));
        }
        let payload = serde_json::from_slice(&payload).expect("command payload is JSON");
        self.published.lock().unwrap().push(Published {
            topic: topic.to_string(),
            qos,
            retain,
            payload,
        });
        Ok(())
    }
}

/// Observer that counts notifications and keeps the last snapshot.
#[derive(Default)]
pub struct CountingObserver {
    pub count: AtomicUsize,
    pub last: Mutex<Option<DeviceState>>,
}

impl CountingObserver {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl StateObserver for CountingObserver {
    fn state_changed(&self, state: &DeviceState) {
        self.count.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(state.clone());
    }
}

pub fn test_config() -> ClimateConfig {
    ClimateConfig::new(STATE_TOPIC).with_name("Test Heat Pump")
}

pub async fn adapter_with(
    config: ClimateConfig,
) -> (ClimateAdapter, Arc<RecordingTransport>, Arc<CountingObserver>) {
    let transport = Arc::new(RecordingTransport::default());
    let observer = Arc::new(CountingObserver::default());
    let adapter = ClimateAdapter::new(config, transport.clone(), observer.clone())
        .await
        .unwrap();
    (adapter, transport, observer)
}

pub async fn test_adapter() -> (ClimateAdapter, Arc<RecordingTransport>, Arc<CountingObserver>) {
    adapter_with(test_config()).await
}
