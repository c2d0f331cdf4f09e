//! Request lifecycle coordinator.
//!
//! Owns the [`WatchRegistry`] and drives every request through permission
//! gating, settings checks, provider issuance, result routing and teardown.
//! All methods run in the daemon's serialized context and never block: each
//! one starts collaborator work and returns, and the matching
//! [`BridgeEvent`] later resumes the flow through [`handle_event`].
//!
//! # Request flow
//!
//! ```text
//! request_once / request_watch
//!   │  services unavailable ───────────────► reject (101 / 102)
//!   │  high accuracy, source off ──────────► reject (2)
//!   ▼
//! registered ──► no permission ──► prompt ──► denied ──► 100, removed
//!   │                                  │
//!   │ ◄────────────── granted ─────────┘
//!   ▼
//! check_settings ──► failed ──────────────► 106, removed
//!   │        └────► resolvable ──► dialog ─► declined ─► 105, removed
//!   │                                  │
//!   ▼ ◄──────────── resolved ──────────┘
//! issue ──► LocationResult* ──► reply (one-shot: removed after the first)
//! ```
//!
//! [`handle_event`]: LocationCoordinator::handle_event

use tracing::{debug, info, warn};

use crate::codec::{encode, LocationSample};
use crate::config::{BridgeConfig, ResolutionPolicy};
use crate::device::{
    BridgeEvent, LocationProvider, PermissionGate, PermissionGrant, ServicesStatus,
    SettingsOutcome,
};
use crate::error::LocationError;
use crate::registry::{RecordState, RequestRecord, WatchRegistry};
use crate::reply::{Reply, ReplyChannel};
use crate::request::{
    AccuracyTier, LocationRequest, ProviderHandle, RequestId, RequestKind, RequestParameters,
};

/// Whether a new request was taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Registered; replies will follow.
    Accepted(RequestId),
    /// Refused up front; the error was already delivered to the caller.
    Rejected(LocationError),
}

/// Result of a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
}

/// The request lifecycle state machine.
pub struct LocationCoordinator<P, G> {
    provider: P,
    permissions: G,
    config: BridgeConfig,
    registry: WatchRegistry,
    suspended: bool,
}

impl<P, G> LocationCoordinator<P, G>
where
    P: LocationProvider,
    G: PermissionGate,
{
    pub fn new(provider: P, permissions: G, config: BridgeConfig) -> Self {
        Self {
            provider,
            permissions,
            config,
            registry: WatchRegistry::new(),
            suspended: false,
        }
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Accept a one-shot location request.
    pub fn request_once(
        &mut self,
        params: RequestParameters,
        key: &str,
        reply: ReplyChannel,
    ) -> Acceptance {
        self.accept(RequestKind::OneShot, params, key, reply)
    }

    /// Accept a continuous watch.
    pub fn request_watch(
        &mut self,
        params: RequestParameters,
        key: &str,
        reply: ReplyChannel,
    ) -> Acceptance {
        self.accept(RequestKind::Continuous, params, key, reply)
    }

    fn accept(
        &mut self,
        kind: RequestKind,
        params: RequestParameters,
        key: &str,
        reply: ReplyChannel,
    ) -> Acceptance {
        let rejection = match self.provider.services_status() {
            ServicesStatus::Available => None,
            ServicesStatus::Resolvable => Some(LocationError::GoogleServicesErrorResolvable),
            ServicesStatus::Unavailable => Some(LocationError::GoogleServicesError),
        }
        .or_else(|| {
            (params.accuracy == AccuracyTier::High && !self.provider.is_high_accuracy_enabled())
                .then_some(LocationError::PositionUnavailable)
        });

        if let Some(error) = rejection {
            debug!(key, kind = ?kind, error = %error, "Request rejected");
            reply.send(Reply::error(error, false));
            return Acceptance::Rejected(error);
        }

        let request = LocationRequest::build(kind, &params, &self.config.watch);
        let mut record = RequestRecord::new(key, kind, params, request, reply);
        let id = record.id;

        let has_permission = self.permissions.has_permission(&self.config.permissions);
        record.state = if has_permission {
            RecordState::CheckingSettings
        } else {
            RecordState::AwaitingPermission
        };

        if let Some(previous) = self.registry.put(id, record) {
            // The old provider stream is not cancelled. Its deliveries no
            // longer match the record and are dropped until the next issue
            // for this id replaces it.
            warn!(
                id = %id,
                key,
                previous_key = %previous.key,
                previous_handle = ?previous.provider_handle,
                "Request id re-registered, previous record replaced"
            );
        }

        debug!(id = %id, key, kind = ?kind, has_permission, "Request accepted");

        if has_permission {
            self.provider.check_settings(id, &request);
        } else {
            self.permissions.request(id, &self.config.permissions);
        }

        Acceptance::Accepted(id)
    }

    /// Cancel the request registered under `key`.
    ///
    /// Replies on `reply` with an empty success or WATCH_ID_NOT_FOUND.
    pub fn cancel_watch(&mut self, key: &str, reply: ReplyChannel) -> CancelOutcome {
        let id = RequestId::from_key(key);

        match self.registry.remove(id) {
            Some(record) => {
                if let Some(handle) = record.provider_handle {
                    self.provider.cancel(handle);
                }
                debug!(id = %id, key, "Watch cleared");
                reply.send(Reply::empty());
                CancelOutcome::Cancelled
            }
            None => {
                debug!(id = %id, key, "Clear for unknown watch");
                reply.send(Reply::error(LocationError::WatchIdNotFound, false));
                CancelOutcome::NotFound
            }
        }
    }

    /// Route a collaborator event to its handler.
    pub fn handle_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::SettingsChecked { id, outcome } => self.on_settings_checked(id, outcome),
            BridgeEvent::ResolutionFinished { id, resolved } => {
                self.on_resolution_finished(id, resolved)
            }
            BridgeEvent::PermissionResult { id, grants } => self.on_permission_result(id, &grants),
            BridgeEvent::LocationResult { id, handle, sample } => {
                self.on_provider_result(id, handle, sample)
            }
            BridgeEvent::Availability {
                id,
                handle,
                available,
            } => self.on_availability(id, handle, available),
            BridgeEvent::ProviderFailure {
                id,
                handle,
                message,
            } => self.on_provider_failure(id, handle, &message),
        }
    }

    /// Resume a request that was waiting on the permission prompt.
    pub fn on_permission_result(&mut self, id: RequestId, grants: &[PermissionGrant]) {
        let Some(record) = self.registry.get_mut(id) else {
            debug!(id = %id, "Permission result for unregistered request");
            return;
        };

        if record.state != RecordState::AwaitingPermission {
            debug!(id = %id, state = ?record.state, "Stale permission result ignored");
            return;
        }

        if grants.is_empty() {
            warn!(id = %id, key = %record.key, "Permission prompt dismissed, request left pending");
            return;
        }

        if grants.contains(&PermissionGrant::Denied) {
            info!(id = %id, key = %record.key, "Location permission denied");
            self.finish(id, LocationError::LocationPermissionDenied);
            return;
        }

        record.state = RecordState::CheckingSettings;
        self.provider.check_settings(id, &record.request);
    }

    fn on_settings_checked(&mut self, id: RequestId, outcome: SettingsOutcome) {
        let Some(record) = self.registry.get_mut(id) else {
            debug!(id = %id, "Settings result for unregistered request");
            return;
        };

        if record.state != RecordState::CheckingSettings {
            debug!(id = %id, state = ?record.state, "Stale settings result ignored");
            return;
        }

        match outcome {
            SettingsOutcome::Satisfied => self.issue(id),
            SettingsOutcome::Resolvable => {
                debug!(id = %id, policy = ?self.config.resolution_policy, "Settings need resolution");
                self.provider.start_resolution(id);
                match self.config.resolution_policy {
                    ResolutionPolicy::Optimistic => self.issue(id),
                    ResolutionPolicy::AwaitResult => {
                        record.state = RecordState::AwaitingResolution;
                    }
                }
            }
            SettingsOutcome::Failed => self.finish(id, LocationError::LocationSettingsError),
        }
    }

    fn on_resolution_finished(&mut self, id: RequestId, resolved: bool) {
        let Some(record) = self.registry.get(id) else {
            debug!(id = %id, "Resolution result for unregistered request");
            return;
        };

        if record.state != RecordState::AwaitingResolution {
            debug!(id = %id, resolved, state = ?record.state, "Resolution result without a waiting request");
            return;
        }

        if resolved {
            self.issue(id);
        } else {
            self.finish(id, LocationError::LocationSettingsErrorResolvable);
        }
    }

    /// Route a provider delivery to its caller.
    ///
    /// Deliveries are only routed while `handle` is the record's live stream;
    /// anything from a cancelled, replaced or suspended stream is dropped.
    pub fn on_provider_result(
        &mut self,
        id: RequestId,
        handle: ProviderHandle,
        sample: Option<LocationSample>,
    ) {
        let Some(record) = self.delivering_record(id, handle) else {
            return;
        };

        let keep_listening = record.is_continuous();
        let reply = match sample {
            Some(sample) => Reply::location(encode(&sample), keep_listening),
            None => Reply::error(LocationError::LocationNull, keep_listening),
        };

        debug!(
            id = %id,
            key = %record.key,
            handle = %handle,
            error = reply.is_error(),
            keep_listening,
            "Routing provider result"
        );
        record.reply.send(reply);

        if !keep_listening {
            self.retire(id);
        }
    }

    fn on_availability(&mut self, id: RequestId, handle: ProviderHandle, available: bool) {
        let Some(record) = self.delivering_record(id, handle) else {
            return;
        };

        if !available && record.is_continuous() {
            debug!(id = %id, key = %record.key, "Location unavailable for watch");
            record
                .reply
                .send(Reply::error(LocationError::PositionUnavailable, true));
        }
    }

    fn on_provider_failure(&mut self, id: RequestId, handle: ProviderHandle, message: &str) {
        if self.delivering_record(id, handle).is_some() {
            warn!(id = %id, handle = %handle, message, "Provider request failed");
            self.finish(id, LocationError::GoogleServicesError);
        }
    }

    /// The record `handle` is currently delivering for.
    fn delivering_record(&self, id: RequestId, handle: ProviderHandle) -> Option<&RequestRecord> {
        let Some(record) = self.registry.get(id) else {
            debug!(id = %id, handle = %handle, "Dropping provider event for unregistered request");
            return None;
        };

        if record.state != RecordState::Active || record.provider_handle != Some(handle) {
            debug!(
                id = %id,
                handle = %handle,
                live_handle = ?record.provider_handle,
                state = ?record.state,
                "Dropping provider event from stale stream"
            );
            return None;
        }

        Some(record)
    }

    /// Stop provider deliveries for every record; records stay registered.
    pub fn on_suspend(&mut self) {
        if self.suspended {
            return;
        }
        self.suspended = true;

        let mut paused = 0usize;
        for record in self.registry.iter_mut() {
            if let Some(handle) = record.provider_handle.take() {
                self.provider.cancel(handle);
                record.state = RecordState::Suspended;
                paused += 1;
            }
        }

        info!(paused, registered = self.registry.len(), "Location updates suspended");
    }

    /// Re-issue every record paused by [`on_suspend`](Self::on_suspend).
    pub fn on_resume(&mut self) {
        if !self.suspended {
            return;
        }
        self.suspended = false;

        let paused: Vec<RequestId> = self
            .registry
            .ids()
            .into_iter()
            .filter(|id| {
                self.registry
                    .get(*id)
                    .is_some_and(|r| r.state == RecordState::Suspended)
            })
            .collect();

        for id in &paused {
            self.issue(*id);
        }

        info!(resumed = paused.len(), "Location updates resumed");
    }

    /// Cancel every provider request and forget all records without replying.
    pub fn shutdown(&mut self) {
        let mut cancelled = 0usize;
        for record in self.registry.drain() {
            if let Some(handle) = record.provider_handle {
                self.provider.cancel(handle);
                cancelled += 1;
            }
        }
        info!(cancelled, "Location coordinator shut down");
    }

    /// Hand the record's request to the provider, or park it while suspended.
    fn issue(&mut self, id: RequestId) {
        let Some(record) = self.registry.get_mut(id) else {
            return;
        };

        if self.suspended {
            record.state = RecordState::Suspended;
            return;
        }

        if let Some(previous) = record.provider_handle.take() {
            self.provider.cancel(previous);
        }

        let handle = self.provider.issue(id, &record.request);
        debug!(id = %id, key = %record.key, handle = %handle, "Provider request issued");
        record.provider_handle = Some(handle);
        record.state = RecordState::Active;
    }

    /// Resolve a record with a terminal error.
    fn finish(&mut self, id: RequestId, error: LocationError) {
        if let Some(record) = self.retire(id) {
            record.reply.send(Reply::error(error, false));
        }
    }

    /// Remove a record and stop its provider request.
    fn retire(&mut self, id: RequestId) -> Option<RequestRecord> {
        let record = self.registry.remove(id)?;
        if let Some(handle) = record.provider_handle {
            self.provider.cancel(handle);
        }
        Some(record)
    }
}
