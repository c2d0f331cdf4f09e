//! GeoBridge - device geolocation for host runtimes
//!
//! Bridges a host's asynchronous `getLocation` / `addWatch` / `clearWatch`
//! commands to a platform location provider. The bridge owns the request
//! lifecycle: permission prompts, settings checks and resolution dialogs,
//! result delivery, and suspend/resume of running watches.
//!
//! # Architecture
//!
//! ```text
//!   host ──► GeolocationPlugin ──► HostHandle ──► LocationDaemon
//!                 ▲                                   │
//!                 │ PluginResult                      ▼
//!                 └──────── ReplyChannel ◄── LocationCoordinator ──► WatchRegistry
//!                                                 │        ▲
//!                              LocationProvider ◄─┤        │ BridgeEvent
//!                              PermissionGate   ◄─┘        │
//!                                     └────────────────────┘
//! ```
//!
//! The coordinator is single-threaded: every command and collaborator
//! completion is processed in the daemon's event loop.

pub mod codec;
pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod device;
pub mod error;
pub mod logging;
pub mod plugin;
pub mod registry;
pub mod reply;
pub mod request;
pub mod simulated;

pub use codec::{encode, LocationRecord, LocationSample};
pub use config::{BridgeConfig, ResolutionPolicy, WatchConfig};
pub use coordinator::{Acceptance, CancelOutcome, LocationCoordinator};
pub use daemon::{HostHandle, HostMessage, LocationDaemon};
pub use device::{event_channel, BridgeEvent, LocationProvider, PermissionGate};
pub use error::{BridgeError, ConfigError, ErrorCondition, LocationError};
pub use plugin::{GeolocationPlugin, PluginCommand, PluginResult, ResultStatus};
pub use reply::{Reply, ReplyChannel, ReplyPayload};
pub use request::{RequestId, RequestKind, RequestParameters};
