//! Device collaborator interfaces.
//!
//! The coordinator never talks to hardware or OS dialogs directly. It calls
//! into these traits, which start work and return immediately; completions
//! come back later as [`BridgeEvent`]s on the event channel and are processed
//! in the same serialized context as host commands.
//!
//! ```text
//!                 ┌──────────────────────┐
//!   check_settings│                      │ SettingsChecked
//!   start_resolution   LocationProvider  │ ResolutionFinished
//!   issue / cancel│                      │ LocationResult / Availability / ProviderFailure
//!                 └──────────────────────┘
//!                 ┌──────────────────────┐
//!   request       │    PermissionGate    │ PermissionResult
//!                 └──────────────────────┘
//! ```

use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::codec::LocationSample;
use crate::request::{LocationRequest, ProviderHandle, RequestId};

/// A runtime permission a request depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    CoarseLocation,
    FineLocation,
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coarse" => Ok(Permission::CoarseLocation),
            "fine" => Ok(Permission::FineLocation),
            other => Err(format!("unknown permission '{}'", other)),
        }
    }
}

/// Answer for one permission in a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionGrant {
    Granted,
    Denied,
}

/// Availability of the platform location services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicesStatus {
    Available,
    /// Missing or outdated, but the user can fix it.
    Resolvable,
    Unavailable,
}

/// Result of a settings check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsOutcome {
    Satisfied,
    /// The user can change settings through a resolution dialog.
    Resolvable,
    Failed,
}

/// Completion events from collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    SettingsChecked {
        id: RequestId,
        outcome: SettingsOutcome,
    },
    ResolutionFinished {
        id: RequestId,
        resolved: bool,
    },
    /// An empty `grants` list means the prompt was dismissed by the system.
    PermissionResult {
        id: RequestId,
        grants: Vec<PermissionGrant>,
    },
    /// Provider events carry the handle of the stream that produced them, so
    /// deliveries from a cancelled or replaced stream can be told apart.
    LocationResult {
        id: RequestId,
        handle: ProviderHandle,
        sample: Option<LocationSample>,
    },
    Availability {
        id: RequestId,
        handle: ProviderHandle,
        available: bool,
    },
    ProviderFailure {
        id: RequestId,
        handle: ProviderHandle,
        message: String,
    },
}

impl BridgeEvent {
    /// Request this event belongs to.
    pub fn id(&self) -> RequestId {
        match self {
            BridgeEvent::SettingsChecked { id, .. }
            | BridgeEvent::ResolutionFinished { id, .. }
            | BridgeEvent::PermissionResult { id, .. }
            | BridgeEvent::LocationResult { id, .. }
            | BridgeEvent::Availability { id, .. }
            | BridgeEvent::ProviderFailure { id, .. } => *id,
        }
    }
}

/// Sending side handed to collaborators.
pub type EventSender = mpsc::UnboundedSender<BridgeEvent>;

/// Receiving side owned by the daemon.
pub type EventReceiver = mpsc::UnboundedReceiver<BridgeEvent>;

/// Create the collaborator event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Binding to the device's location provider.
pub trait LocationProvider: Send + Sync {
    /// Cheap synchronous query: is the high-accuracy (satellite) source on?
    fn is_high_accuracy_enabled(&self) -> bool;

    /// Cheap synchronous query of the location services themselves.
    fn services_status(&self) -> ServicesStatus;

    /// Start a settings check; completes with [`BridgeEvent::SettingsChecked`].
    fn check_settings(&self, id: RequestId, request: &LocationRequest);

    /// Show the settings resolution dialog; completes with
    /// [`BridgeEvent::ResolutionFinished`].
    fn start_resolution(&self, id: RequestId);

    /// Start delivering results for `id`.
    ///
    /// Deliveries arrive as [`BridgeEvent::LocationResult`] tagged with the
    /// returned handle. Issuing again for an id whose stream is still live
    /// replaces that stream.
    fn issue(&self, id: RequestId, request: &LocationRequest) -> ProviderHandle;

    /// Stop deliveries for a handle. Unknown handles are ignored.
    fn cancel(&self, handle: ProviderHandle);
}

/// Binding to the runtime permission prompt.
pub trait PermissionGate: Send + Sync {
    fn has_permission(&self, permissions: &[Permission]) -> bool;

    /// Prompt the user; completes with [`BridgeEvent::PermissionResult`].
    fn request(&self, id: RequestId, permissions: &[Permission]);
}

impl<T: LocationProvider + ?Sized> LocationProvider for Arc<T> {
    fn is_high_accuracy_enabled(&self) -> bool {
        (**self).is_high_accuracy_enabled()
    }

    fn services_status(&self) -> ServicesStatus {
        (**self).services_status()
    }

    fn check_settings(&self, id: RequestId, request: &LocationRequest) {
        (**self).check_settings(id, request)
    }

    fn start_resolution(&self, id: RequestId) {
        (**self).start_resolution(id)
    }

    fn issue(&self, id: RequestId, request: &LocationRequest) -> ProviderHandle {
        (**self).issue(id, request)
    }

    fn cancel(&self, handle: ProviderHandle) {
        (**self).cancel(handle)
    }
}

impl<T: PermissionGate + ?Sized> PermissionGate for Arc<T> {
    fn has_permission(&self, permissions: &[Permission]) -> bool {
        (**self).has_permission(permissions)
    }

    fn request(&self, id: RequestId, permissions: &[Permission]) {
        (**self).request(id, permissions)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    /// A call observed by [`RecordingProvider`].
    #[derive(Debug, Clone, PartialEq)]
    pub enum ProviderCall {
        CheckSettings(RequestId),
        StartResolution(RequestId),
        Issue(RequestId, LocationRequest, ProviderHandle),
        Cancel(ProviderHandle),
    }

    /// Provider fake that records calls and never emits events.
    pub struct RecordingProvider {
        pub high_accuracy_enabled: AtomicBool,
        pub services: Mutex<ServicesStatus>,
        pub calls: Mutex<Vec<ProviderCall>>,
        next_handle: AtomicU64,
    }

    impl RecordingProvider {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                high_accuracy_enabled: AtomicBool::new(true),
                services: Mutex::new(ServicesStatus::Available),
                calls: Mutex::new(Vec::new()),
                next_handle: AtomicU64::new(1),
            })
        }

        pub fn calls(&self) -> Vec<ProviderCall> {
            self.calls.lock().clone()
        }

        pub fn issued(&self) -> Vec<(RequestId, LocationRequest, ProviderHandle)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    ProviderCall::Issue(id, req, handle) => Some((id, req, handle)),
                    _ => None,
                })
                .collect()
        }

        pub fn cancelled(&self) -> Vec<ProviderHandle> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    ProviderCall::Cancel(handle) => Some(handle),
                    _ => None,
                })
                .collect()
        }
    }

    impl LocationProvider for RecordingProvider {
        fn is_high_accuracy_enabled(&self) -> bool {
            self.high_accuracy_enabled.load(Ordering::SeqCst)
        }

        fn services_status(&self) -> ServicesStatus {
            *self.services.lock()
        }

        fn check_settings(&self, id: RequestId, _request: &LocationRequest) {
            self.calls.lock().push(ProviderCall::CheckSettings(id));
        }

        fn start_resolution(&self, id: RequestId) {
            self.calls.lock().push(ProviderCall::StartResolution(id));
        }

        fn issue(&self, id: RequestId, request: &LocationRequest) -> ProviderHandle {
            let handle = ProviderHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
            self.calls
                .lock()
                .push(ProviderCall::Issue(id, *request, handle));
            handle
        }

        fn cancel(&self, handle: ProviderHandle) {
            self.calls.lock().push(ProviderCall::Cancel(handle));
        }
    }

    /// Permission fake with a fixed answer to `has_permission`.
    pub struct RecordingPermissions {
        pub granted: AtomicBool,
        pub requests: Mutex<Vec<RequestId>>,
    }

    impl RecordingPermissions {
        pub fn new(granted: bool) -> Arc<Self> {
            Arc::new(Self {
                granted: AtomicBool::new(granted),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    impl PermissionGate for RecordingPermissions {
        fn has_permission(&self, _permissions: &[Permission]) -> bool {
            self.granted.load(Ordering::SeqCst)
        }

        fn request(&self, id: RequestId, _permissions: &[Permission]) {
            self.requests.lock().push(id);
        }
    }

    #[test]
    fn test_permission_from_str() {
        assert_eq!("coarse".parse::<Permission>(), Ok(Permission::CoarseLocation));
        assert_eq!(" FINE ".parse::<Permission>(), Ok(Permission::FineLocation));
        assert!("background".parse::<Permission>().is_err());
    }

    #[test]
    fn test_event_id() {
        let id = RequestId::from_key("w1");
        let event = BridgeEvent::Availability {
            id,
            handle: ProviderHandle(3),
            available: false,
        };
        assert_eq!(event.id(), id);
    }

    #[test]
    fn test_arc_provider_delegates() {
        let provider = RecordingProvider::new();
        let shared: Arc<RecordingProvider> = Arc::clone(&provider);
        let handle = LocationProvider::issue(
            &shared,
            RequestId::from_key("k"),
            &LocationRequest::build(
                crate::request::RequestKind::OneShot,
                &crate::request::RequestParameters::one_shot(false, 0, 0),
                &crate::config::WatchConfig::default(),
            ),
        );
        assert_eq!(provider.issued().len(), 1);
        assert_eq!(provider.issued()[0].2, handle);
    }
}
