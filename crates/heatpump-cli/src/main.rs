//! Command-line bridge between an MQTT broker and a heat pump.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::{Stream, StreamExt};
use heatpump_climate::{
    connect, run_event_loop, AppConfig, ChannelObserver, ClimateAdapter, DeviceState, HostMode,
    MqttTransport,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long `status` waits for the device to report.
const STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for queued commands to reach the broker on exit.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Heat pump MQTT bridge.
#[derive(Parser, Debug)]
#[command(name = "heatpump")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file.
    #[arg(short, long, global = true, default_value = "heatpump.toml")]
    config: PathBuf,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Print every state change as JSON until interrupted.
    Watch,
    /// Wait for the first state report and print it.
    Status,
    /// Set the target temperature (°C, rounded to 0.5).
    SetTemperature {
        /// Target temperature.
        value: f64,
    },
    /// Set the fan speed (AUTO, QUIET, 1-4).
    SetFan {
        /// Fan token.
        token: String,
    },
    /// Set the operating mode (auto, cool, dry, heat, fan_only, off).
    SetMode {
        /// Host mode.
        mode: HostMode,
    },
    /// Set the vane position (AUTO, 1-5, SWING).
    SetSwing {
        /// Vane token.
        token: String,
    },
}

struct Bridge {
    adapter: Arc<ClimateAdapter>,
    transport: Arc<MqttTransport>,
    observer: Arc<ChannelObserver>,
    event_task: JoinHandle<heatpump_climate::ClimateResult<()>>,
}

impl Bridge {
    async fn start(config: AppConfig) -> Result<Self> {
        let (transport, eventloop) = connect(&config.broker);
        let transport = Arc::new(transport);
        let observer = Arc::new(ChannelObserver::new());

        let adapter = ClimateAdapter::new(config.climate, transport.clone(), observer.clone())
            .await
            .context("Failed to start climate adapter")?;
        let adapter = Arc::new(adapter);
        let event_task = tokio::spawn(run_event_loop(adapter.clone(), eventloop));

        Ok(Self {
            adapter,
            transport,
            observer,
            event_task,
        })
    }

    /// Release subscriptions and let the event loop flush before exiting.
    async fn stop(self) -> Result<()> {
        self.adapter.shutdown().await?;
        self.transport.disconnect().await?;

        match tokio::time::timeout(FLUSH_TIMEOUT, self.event_task).await {
            Ok(joined) => joined.context("Event loop task panicked")??,
            Err(_) => warn!("Timed out waiting for MQTT client to disconnect"),
        }
        Ok(())
    }
}

fn state_json(adapter: &ClimateAdapter, state: &DeviceState) -> serde_json::Value {
    serde_json::json!({
        "name": adapter.name(),
        "mode": state.reported_mode(),
        "activity": state.activity_state(),
        "target_temperature": state.target_temperature(),
        "current_temperature": state.current_temperature(),
        "fan_mode": state.fan_mode_display(),
        "swing_mode": state.swing_mode_display(),
        "unit": adapter.temperature_unit(),
        "last_updated": state.last_updated(),
    })
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var("HEATPUMP_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose {
        "heatpump=debug,heatpump_climate=debug"
    } else {
        "heatpump=info,heatpump_climate=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let bridge = Bridge::start(config).await?;
    let result = match args.command {
        Command::Watch => watch(&bridge).await,
        Command::Status => status(&bridge).await,
        Command::SetTemperature { value } => bridge
            .adapter
            .set_target_temperature(Some(value))
            .await
            .map_err(Into::into),
        Command::SetFan { token } => bridge
            .adapter
            .set_fan_mode(Some(token.as_str()))
            .await
            .map_err(Into::into),
        Command::SetMode { mode } => bridge.adapter.set_hvac_mode(mode).await.map_err(Into::into),
        Command::SetSwing { token } => bridge
            .adapter
            .set_swing_mode(Some(token.as_str()))
            .await
            .map_err(Into::into),
    };

    bridge.stop().await?;
    result
}

/// Print state changes until Ctrl-C.
async fn watch(bridge: &Bridge) -> Result<()> {
    info!(device = %bridge.adapter.name(), "Watching for state changes (Ctrl-C to stop)");
    let mut states = Box::pin(bridge.observer.stream());

    loop {
        tokio::select! {
            next = states.next() => match next {
                Some(state) => println!("{}", state_json(&bridge.adapter, &state)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// First state with a reported mode, starting from `current`.
async fn first_report<S>(current: DeviceState, states: S) -> Option<DeviceState>
where
    S: Stream<Item = DeviceState>,
{
    if current.reported_mode().is_some() {
        return Some(current);
    }
    let mut states = std::pin::pin!(states);
    while let Some(state) = states.next().await {
        if state.reported_mode().is_some() {
            return Some(state);
        }
    }
    None
}

/// Print the first complete state snapshot.
async fn status(bridge: &Bridge) -> Result<()> {
    // Subscribe before reading the snapshot so a report landing in between is not lost.
    let states = bridge.observer.stream();
    let current = bridge.adapter.snapshot().await;

    let state = tokio::time::timeout(STATUS_TIMEOUT, first_report(current, states))
        .await
        .context("Timed out waiting for the device to report its state")?
        .context("State channel closed")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&state_json(&bridge.adapter, &state))?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use heatpump_climate::{BrokerConfig, ClimateConfig, NoopObserver};

    async fn reported_state() -> DeviceState {
        // Never polled: requests stay queued and nothing touches the network.
        let (transport, _eventloop) = connect(&BrokerConfig::new("127.0.0.1"));
        let adapter = ClimateAdapter::new(
            ClimateConfig::new("hp"),
            Arc::new(transport),
            Arc::new(NoopObserver),
        )
        .await
        .unwrap();
        adapter
            .handle_message(
                "hp",
                br#"{"temperature":21,"fan":"AUTO","vane":"AUTO","power":"ON","mode":"HEAT"}"#,
            )
            .await
            .unwrap();
        adapter.snapshot().await
    }

    #[tokio::test]
    async fn test_first_report_uses_existing_snapshot() {
        let current = reported_state().await;
        let state = first_report(current.clone(), stream::pending()).await;
        assert_eq!(state, Some(current));
    }

    #[tokio::test]
    async fn test_first_report_waits_for_mode() {
        let reported = reported_state().await;
        let states = stream::iter(vec![DeviceState::new(), reported.clone()]);
        let state = first_report(DeviceState::new(), states).await;
        assert_eq!(state.and_then(|s| s.reported_mode()), Some(HostMode::Heat));
    }

    #[tokio::test]
    async fn test_first_report_stream_closed() {
        let state = first_report(DeviceState::new(), stream::empty()).await;
        assert!(state.is_none());
    }
}
