//! Bridge session shared by the commands.

use std::path::Path;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use geobridge::device::event_channel;
use geobridge::simulated::{SimulatedPermissions, SimulatedProvider, SimulatedRoute};
use geobridge::{BridgeConfig, GeolocationPlugin, LocationDaemon, PluginResult, ReplyChannel};

use crate::error::CliError;

/// Load configuration from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig, CliError> {
    let config = match path {
        Some(path) => BridgeConfig::load_from(path)?,
        None => BridgeConfig::load()?,
    };
    debug!(config = ?config, "Configuration loaded");
    Ok(config)
}

/// A running daemon wired to the simulated device.
pub struct Session {
    pub plugin: GeolocationPlugin,
    /// Cancelled on Ctrl-C or when the command is done.
    pub shutdown: CancellationToken,
    daemon: JoinHandle<()>,
}

impl Session {
    pub fn start(config: BridgeConfig) -> Result<Self, CliError> {
        let (event_tx, event_rx) = event_channel();
        let provider = SimulatedProvider::new(event_tx.clone(), SimulatedRoute::default());
        let permissions = SimulatedPermissions::granted(event_tx);
        let (daemon, handle) = LocationDaemon::new(config, provider, permissions, event_rx);

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        ctrlc::set_handler(move || {
            signal.cancel();
        })
        .map_err(|e| CliError::Signal(e.to_string()))?;

        let daemon = tokio::spawn(daemon.run(shutdown.clone()));
        info!("Session started");

        Ok(Self {
            plugin: GeolocationPlugin::new(handle),
            shutdown,
            daemon,
        })
    }

    /// Stop the daemon and wait for its teardown.
    pub async fn finish(self) {
        self.shutdown.cancel();
        if let Err(e) = self.daemon.await {
            tracing::error!(error = %e, "Daemon task failed");
        }
    }
}

/// Callback that forwards host results to a channel.
pub fn result_channel() -> (ReplyChannel, UnboundedReceiver<PluginResult>) {
    let (tx, rx) = unbounded_channel();
    let channel = PluginResult::channel(move |result| {
        let _ = tx.send(result);
    });
    (channel, rx)
}

/// Print one result as a JSON line.
pub fn print_result(result: &PluginResult) {
    match result.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!(error = %e, "Failed to render result"),
    }
}
