//! Serialized event context for the coordinator.
//!
//! The [`LocationDaemon`] owns the single [`LocationCoordinator`] and is the
//! only place that touches it. Host messages and collaborator events are
//! funnelled into one `select!` loop, so registry mutations never race.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      LocationDaemon                        │
//! │                                                            │
//! │  HostHandle ──► host_rx ──┐                                │
//! │  (commands, lifecycle)    │                                │
//! │                           ├──► LocationCoordinator         │
//! │  collaborators ► event_rx ┘     │                          │
//! │  (BridgeEvent)                  ├──► provider / permissions│
//! │                                 └──► ReplyChannel          │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use geobridge::daemon::LocationDaemon;
//! use geobridge::device::event_channel;
//!
//! let (event_tx, event_rx) = event_channel();
//! let provider = SimulatedProvider::new(event_tx.clone(), SimulatedRoute::default());
//! let permissions = SimulatedPermissions::granted(event_tx);
//! let (daemon, handle) = LocationDaemon::new(config, provider, permissions, event_rx);
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(daemon.run(shutdown.clone()));
//!
//! let (reply, mut rx) = ReplyChannel::pair();
//! handle.add_watch("w1", false, 5000, reply).await?;
//! ```

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::coordinator::LocationCoordinator;
use crate::device::{EventReceiver, LocationProvider, PermissionGate};
use crate::error::BridgeError;
use crate::reply::ReplyChannel;
use crate::request::RequestParameters;

/// Messages from the host runtime.
#[derive(Debug)]
pub enum HostMessage {
    GetLocation {
        params: RequestParameters,
        key: String,
        reply: ReplyChannel,
    },
    AddWatch {
        params: RequestParameters,
        key: String,
        reply: ReplyChannel,
    },
    ClearWatch {
        key: String,
        reply: ReplyChannel,
    },
    /// Host went to the background.
    Suspend,
    /// Host came back to the foreground.
    Resume,
}

/// Owner of the coordinator and its serialized event loop.
pub struct LocationDaemon<P, G> {
    coordinator: LocationCoordinator<P, G>,
    host_rx: mpsc::Receiver<HostMessage>,
    event_rx: EventReceiver,
}

impl<P, G> LocationDaemon<P, G>
where
    P: LocationProvider,
    G: PermissionGate,
{
    /// Creates the daemon and the handle the host talks to.
    ///
    /// # Arguments
    ///
    /// * `config` - Bridge configuration
    /// * `provider` - Location provider binding
    /// * `permissions` - Permission prompt binding
    /// * `event_rx` - Receiving side of the channel the collaborators post to
    pub fn new(
        config: BridgeConfig,
        provider: P,
        permissions: G,
        event_rx: EventReceiver,
    ) -> (Self, HostHandle) {
        let (host_tx, host_rx) = mpsc::channel(config.command_capacity.max(1));
        let coordinator = LocationCoordinator::new(provider, permissions, config);

        let daemon = Self {
            coordinator,
            host_rx,
            event_rx,
        };

        (daemon, HostHandle { tx: host_tx })
    }

    /// Runs until shutdown is signalled or every sender is gone.
    ///
    /// Teardown cancels all outstanding provider requests.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Location daemon starting");

        let Self {
            mut coordinator,
            mut host_rx,
            mut event_rx,
        } = self;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Location daemon shutting down");
                    break;
                }

                Some(message) = host_rx.recv() => {
                    Self::handle_message(&mut coordinator, message);
                }

                Some(event) = event_rx.recv() => {
                    debug!(id = %event.id(), "Collaborator event");
                    coordinator.handle_event(event);
                }

                else => {
                    info!("All senders dropped");
                    break;
                }
            }
        }

        coordinator.shutdown();
        info!("Location daemon stopped");
    }

    fn handle_message(coordinator: &mut LocationCoordinator<P, G>, message: HostMessage) {
        match message {
            HostMessage::GetLocation { params, key, reply } => {
                coordinator.request_once(params, &key, reply);
            }
            HostMessage::AddWatch { params, key, reply } => {
                coordinator.request_watch(params, &key, reply);
            }
            HostMessage::ClearWatch { key, reply } => {
                coordinator.cancel_watch(&key, reply);
            }
            HostMessage::Suspend => coordinator.on_suspend(),
            HostMessage::Resume => coordinator.on_resume(),
        }
    }
}

/// Cloneable host-side sender for the daemon.
#[derive(Debug, Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<HostMessage>,
}

impl HostHandle {
    /// Request a single location fix.
    pub async fn get_location(
        &self,
        high_accuracy: bool,
        max_age_ms: i64,
        timeout_ms: i64,
        key: impl Into<String>,
        reply: ReplyChannel,
    ) -> Result<(), BridgeError> {
        self.send(HostMessage::GetLocation {
            params: RequestParameters::one_shot(high_accuracy, max_age_ms, timeout_ms),
            key: key.into(),
            reply,
        })
        .await
    }

    /// Start a watch.
    pub async fn add_watch(
        &self,
        key: impl Into<String>,
        high_accuracy: bool,
        max_age_ms: i64,
        reply: ReplyChannel,
    ) -> Result<(), BridgeError> {
        self.send(HostMessage::AddWatch {
            params: RequestParameters::watch(high_accuracy, max_age_ms),
            key: key.into(),
            reply,
        })
        .await
    }

    /// Stop a watch.
    pub async fn clear_watch(
        &self,
        key: impl Into<String>,
        reply: ReplyChannel,
    ) -> Result<(), BridgeError> {
        self.send(HostMessage::ClearWatch {
            key: key.into(),
            reply,
        })
        .await
    }

    pub async fn suspend(&self) -> Result<(), BridgeError> {
        self.send(HostMessage::Suspend).await
    }

    pub async fn resume(&self) -> Result<(), BridgeError> {
        self.send(HostMessage::Resume).await
    }

    pub async fn send(&self, message: HostMessage) -> Result<(), BridgeError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| BridgeError::DaemonStopped)
    }
}
