//! Simulated device collaborators.
//!
//! Lets the bridge run without location hardware: [`SimulatedProvider`]
//! emits fixes along a [`SimulatedRoute`] from tokio tasks, and
//! [`SimulatedPermissions`] answers prompts from a script. Both post their
//! completions to the daemon's event channel like real bindings would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::codec::LocationSample;
use crate::device::{
    BridgeEvent, EventSender, LocationProvider, Permission, PermissionGate, PermissionGrant,
    ServicesStatus, SettingsOutcome,
};
use crate::request::{LocationRequest, ProviderHandle, RequestId};

/// Meters per degree of latitude (flat-earth approximation).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Default delay before a one-shot fix is delivered.
pub const DEFAULT_FIX_DELAY: Duration = Duration::from_millis(20);

/// Straight-line movement at constant speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedRoute {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub altitude: f64,
    /// Degrees, 0 = North, 90 = East.
    pub bearing: f32,
    /// Meters per second.
    pub speed: f32,
    /// Reported horizontal accuracy in meters.
    pub accuracy: f32,
}

impl Default for SimulatedRoute {
    fn default() -> Self {
        // Hamburg harbour, drifting east at walking pace
        Self {
            start_latitude: 53.5461,
            start_longitude: 9.9665,
            altitude: 8.0,
            bearing: 90.0,
            speed: 1.4,
            accuracy: 6.0,
        }
    }
}

impl SimulatedRoute {
    /// Sample the route `elapsed` after the start.
    pub fn sample_at(&self, elapsed: Duration) -> LocationSample {
        let distance = f64::from(self.speed) * elapsed.as_secs_f64();
        let bearing = f64::from(self.bearing).to_radians();

        let dlat = distance * bearing.cos() / METERS_PER_DEGREE;
        let dlon = distance * bearing.sin()
            / (METERS_PER_DEGREE * self.start_latitude.to_radians().cos());

        LocationSample {
            longitude: self.start_longitude + dlon,
            latitude: self.start_latitude + dlat,
            altitude: self.altitude,
            accuracy: self.accuracy,
            heading: self.bearing,
            speed: self.speed,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

struct Stream {
    id: RequestId,
    token: CancellationToken,
}

struct ProviderState {
    high_accuracy_enabled: bool,
    services: ServicesStatus,
    settings: SettingsOutcome,
    resolution_accepted: bool,
    has_fix: bool,
    streams: HashMap<ProviderHandle, Stream>,
    next_handle: u64,
    issued: u64,
}

/// Location provider backed by tokio tasks.
///
/// Watches deliver a fix every request interval until cancelled; one-shot
/// requests deliver one fix after [`DEFAULT_FIX_DELAY`], or `None` once the
/// request timeout passes when the device has no fix.
#[derive(Clone)]
pub struct SimulatedProvider {
    events: EventSender,
    route: SimulatedRoute,
    started: Instant,
    state: Arc<Mutex<ProviderState>>,
}

impl SimulatedProvider {
    pub fn new(events: EventSender, route: SimulatedRoute) -> Self {
        Self {
            events,
            route,
            started: Instant::now(),
            state: Arc::new(Mutex::new(ProviderState {
                high_accuracy_enabled: true,
                services: ServicesStatus::Available,
                settings: SettingsOutcome::Satisfied,
                resolution_accepted: true,
                has_fix: true,
                streams: HashMap::new(),
                next_handle: 1,
                issued: 0,
            })),
        }
    }

    pub fn with_high_accuracy_enabled(self, enabled: bool) -> Self {
        self.state.lock().high_accuracy_enabled = enabled;
        self
    }

    pub fn with_services(self, services: ServicesStatus) -> Self {
        self.state.lock().services = services;
        self
    }

    /// Outcome of every settings check until a resolution is accepted.
    pub fn with_settings(self, settings: SettingsOutcome) -> Self {
        self.state.lock().settings = settings;
        self
    }

    /// Whether the user accepts the resolution dialog.
    pub fn with_resolution_accepted(self, accepted: bool) -> Self {
        self.state.lock().resolution_accepted = accepted;
        self
    }

    /// Simulate a device that never gets a fix.
    pub fn without_fix(self) -> Self {
        self.state.lock().has_fix = false;
        self
    }

    /// Number of provider streams currently running.
    pub fn active_streams(&self) -> usize {
        self.state.lock().streams.len()
    }

    /// Total number of `issue` calls.
    pub fn issue_count(&self) -> u64 {
        self.state.lock().issued
    }

    fn send(&self, event: BridgeEvent) {
        if self.events.send(event).is_err() {
            debug!("Event channel closed, dropping simulated event");
        }
    }
}

impl LocationProvider for SimulatedProvider {
    fn is_high_accuracy_enabled(&self) -> bool {
        self.state.lock().high_accuracy_enabled
    }

    fn services_status(&self) -> ServicesStatus {
        self.state.lock().services
    }

    fn check_settings(&self, id: RequestId, _request: &LocationRequest) {
        let outcome = self.state.lock().settings;
        self.send(BridgeEvent::SettingsChecked { id, outcome });
    }

    fn start_resolution(&self, id: RequestId) {
        let resolved = {
            let mut state = self.state.lock();
            if state.resolution_accepted {
                state.settings = SettingsOutcome::Satisfied;
            }
            state.resolution_accepted
        };
        self.send(BridgeEvent::ResolutionFinished { id, resolved });
    }

    fn issue(&self, id: RequestId, request: &LocationRequest) -> ProviderHandle {
        let token = CancellationToken::new();
        let (handle, has_fix) = {
            let mut state = self.state.lock();

            // A live stream for the same id is replaced, not duplicated
            let replaced: Vec<ProviderHandle> = state
                .streams
                .iter()
                .filter(|(_, stream)| stream.id == id)
                .map(|(handle, _)| *handle)
                .collect();
            for old in replaced {
                if let Some(stream) = state.streams.remove(&old) {
                    stream.token.cancel();
                }
            }

            let handle = ProviderHandle(state.next_handle);
            state.next_handle += 1;
            state.issued += 1;
            state.streams.insert(
                handle,
                Stream {
                    id,
                    token: token.clone(),
                },
            );
            (handle, state.has_fix)
        };

        let provider = self.clone();
        let request = *request;

        tokio::spawn(async move {
            if request.max_updates == Some(1) {
                let wait = if has_fix {
                    DEFAULT_FIX_DELAY
                } else {
                    request.timeout.unwrap_or(DEFAULT_FIX_DELAY)
                };
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(wait) => {
                        let sample = has_fix.then(|| provider.route.sample_at(provider.started.elapsed()));
                        provider.state.lock().streams.remove(&handle);
                        provider.send(BridgeEvent::LocationResult { id, handle, sample });
                    }
                }
            } else {
                let mut ticker = tokio::time::interval(request.interval.max(Duration::from_millis(1)));
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            let sample = has_fix.then(|| provider.route.sample_at(provider.started.elapsed()));
                            provider.send(BridgeEvent::LocationResult { id, handle, sample });
                        }
                    }
                }
            }
        });

        debug!(id = %id, handle = %handle, "Simulated stream started");
        handle
    }

    fn cancel(&self, handle: ProviderHandle) {
        if let Some(stream) = self.state.lock().streams.remove(&handle) {
            stream.token.cancel();
            debug!(id = %stream.id, handle = %handle, "Simulated stream cancelled");
        }
    }
}

/// How the simulated user answers a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Grant,
    Deny,
    /// The system dismisses the prompt without an answer.
    Dismiss,
}

/// Permission gate answering prompts from a script.
pub struct SimulatedPermissions {
    events: EventSender,
    granted: AtomicBool,
    answer: Mutex<PromptAnswer>,
}

impl SimulatedPermissions {
    /// Permissions already granted; no prompt is ever shown.
    pub fn granted(events: EventSender) -> Self {
        Self {
            events,
            granted: AtomicBool::new(true),
            answer: Mutex::new(PromptAnswer::Grant),
        }
    }

    /// Permissions not yet granted; prompts are answered with `answer`.
    pub fn prompting(events: EventSender, answer: PromptAnswer) -> Self {
        Self {
            events,
            granted: AtomicBool::new(false),
            answer: Mutex::new(answer),
        }
    }

    pub fn set_answer(&self, answer: PromptAnswer) {
        *self.answer.lock() = answer;
    }
}

impl PermissionGate for SimulatedPermissions {
    fn has_permission(&self, _permissions: &[Permission]) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request(&self, id: RequestId, permissions: &[Permission]) {
        let grants = match *self.answer.lock() {
            PromptAnswer::Grant => {
                self.granted.store(true, Ordering::SeqCst);
                vec![PermissionGrant::Granted; permissions.len()]
            }
            PromptAnswer::Deny => vec![PermissionGrant::Denied; permissions.len()],
            PromptAnswer::Dismiss => Vec::new(),
        };

        if self
            .events
            .send(BridgeEvent::PermissionResult { id, grants })
            .is_err()
        {
            debug!("Event channel closed, dropping permission result");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchConfig;
    use crate::device::event_channel;
    use crate::request::{RequestKind, RequestParameters};

    fn watch_request(interval_ms: i64) -> LocationRequest {
        LocationRequest::build(
            RequestKind::Continuous,
            &RequestParameters::watch(false, interval_ms),
            &WatchConfig::default(),
        )
    }

    #[test]
    fn test_route_moves_east() {
        let route = SimulatedRoute::default();
        let start = route.sample_at(Duration::ZERO);
        let later = route.sample_at(Duration::from_secs(100));

        assert!((start.latitude - route.start_latitude).abs() < 1e-9);
        assert!(later.longitude > start.longitude);
        assert!((later.latitude - start.latitude).abs() < 1e-6);
        assert_eq!(later.speed, route.speed);
    }

    #[test]
    fn test_check_settings_posts_configured_outcome() {
        let (tx, mut rx) = event_channel();
        let provider =
            SimulatedProvider::new(tx, SimulatedRoute::default()).with_settings(SettingsOutcome::Failed);
        let id = RequestId::from_key("w1");

        provider.check_settings(id, &watch_request(100));

        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::SettingsChecked {
                id,
                outcome: SettingsOutcome::Failed
            }
        );
    }

    #[test]
    fn test_accepted_resolution_satisfies_later_checks() {
        let (tx, mut rx) = event_channel();
        let provider = SimulatedProvider::new(tx, SimulatedRoute::default())
            .with_settings(SettingsOutcome::Resolvable);
        let id = RequestId::from_key("w1");

        provider.start_resolution(id);
        provider.check_settings(id, &watch_request(100));

        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::ResolutionFinished { id, resolved: true }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::SettingsChecked {
                id,
                outcome: SettingsOutcome::Satisfied
            }
        );
    }

    #[tokio::test]
    async fn test_watch_stream_delivers_until_cancelled() {
        let (tx, mut rx) = event_channel();
        let provider = SimulatedProvider::new(tx, SimulatedRoute::default());
        let id = RequestId::from_key("w1");

        let handle = provider.issue(id, &watch_request(10));
        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(
                event,
                BridgeEvent::LocationResult { handle: h, sample: Some(_), .. } if h == handle
            ));
        }

        provider.cancel(handle);
        assert_eq!(provider.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_reissue_same_id_replaces_stream() {
        let (tx, _rx) = event_channel();
        let provider = SimulatedProvider::new(tx, SimulatedRoute::default());
        let id = RequestId::from_key("w1");

        provider.issue(id, &watch_request(50));
        provider.issue(id, &watch_request(50));

        assert_eq!(provider.active_streams(), 1);
        assert_eq!(provider.issue_count(), 2);
    }

    #[tokio::test]
    async fn test_one_shot_without_fix_times_out_with_none() {
        let (tx, mut rx) = event_channel();
        let provider = SimulatedProvider::new(tx, SimulatedRoute::default()).without_fix();
        let id = RequestId::from_key("k1");
        let request = LocationRequest::build(
            RequestKind::OneShot,
            &RequestParameters::one_shot(false, 0, 30),
            &WatchConfig::default(),
        );

        let handle = provider.issue(id, &request);

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            BridgeEvent::LocationResult {
                id,
                handle,
                sample: None
            }
        );
        assert_eq!(provider.active_streams(), 0);
    }

    #[test]
    fn test_prompting_permissions_answers() {
        let (tx, mut rx) = event_channel();
        let permissions = SimulatedPermissions::prompting(tx, PromptAnswer::Deny);
        let id = RequestId::from_key("k1");
        let wanted = [Permission::CoarseLocation, Permission::FineLocation];

        assert!(!permissions.has_permission(&wanted));
        permissions.request(id, &wanted);
        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::PermissionResult {
                id,
                grants: vec![PermissionGrant::Denied, PermissionGrant::Denied]
            }
        );

        permissions.set_answer(PromptAnswer::Dismiss);
        permissions.request(id, &wanted);
        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::PermissionResult { id, grants: vec![] }
        );

        permissions.set_answer(PromptAnswer::Grant);
        permissions.request(id, &wanted);
        assert!(permissions.has_permission(&wanted));
    }
}
