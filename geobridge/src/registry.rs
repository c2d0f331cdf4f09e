//! Watch registry - single source of truth for tracked requests.
//!
//! Maps a [`RequestId`] to the state of one accepted request. Not
//! synchronized: the registry is owned by the coordinator and only touched
//! from the serialized event context.
//!
//! # Entry lifetime
//!
//! ```text
//! accepted ──► AwaitingPermission ──► CheckingSettings ──► AwaitingResolution
//!                                           │                     │
//!                                           ▼                     ▼
//!                                         Active ◄──────────────────
//!                                        │     ▲
//!                              suspend   ▼     │ resume
//!                                      Suspended
//! ```
//!
//! One-shot entries leave on their terminal reply; continuous entries leave
//! only on cancellation (or a terminal error).

use std::collections::HashMap;

use crate::reply::ReplyChannel;
use crate::request::{LocationRequest, ProviderHandle, RequestId, RequestKind, RequestParameters};

/// Where a record sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Waiting for the permission prompt to answer.
    AwaitingPermission,
    /// Waiting for the settings check.
    CheckingSettings,
    /// Waiting for the user to answer the settings resolution dialog.
    AwaitingResolution,
    /// Issued to the provider.
    Active,
    /// Provider updates stopped while the host is backgrounded.
    Suspended,
}

/// State of one accepted request.
#[derive(Debug)]
pub struct RequestRecord {
    pub id: RequestId,
    /// Caller-supplied key the id was derived from.
    pub key: String,
    pub kind: RequestKind,
    pub parameters: RequestParameters,
    /// Provider request built once at acceptance and reused on resume.
    pub request: LocationRequest,
    pub reply: ReplyChannel,
    pub provider_handle: Option<ProviderHandle>,
    pub state: RecordState,
}

impl RequestRecord {
    pub fn new(
        key: impl Into<String>,
        kind: RequestKind,
        parameters: RequestParameters,
        request: LocationRequest,
        reply: ReplyChannel,
    ) -> Self {
        let key = key.into();
        Self {
            id: RequestId::from_key(&key),
            key,
            kind,
            parameters,
            request,
            reply,
            provider_handle: None,
            state: RecordState::CheckingSettings,
        }
    }

    pub fn is_continuous(&self) -> bool {
        self.kind == RequestKind::Continuous
    }
}

/// Registry of active requests keyed by id.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    records: HashMap<RequestId, RequestRecord>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning whatever was registered under the same id.
    pub fn put(&mut self, id: RequestId, record: RequestRecord) -> Option<RequestRecord> {
        self.records.insert(id, record)
    }

    pub fn get(&self, id: RequestId) -> Option<&RequestRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: RequestId) -> Option<&mut RequestRecord> {
        self.records.get_mut(&id)
    }

    pub fn remove(&mut self, id: RequestId) -> Option<RequestRecord> {
        self.records.remove(&id)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.records.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RequestRecord> {
        self.records.values_mut()
    }

    /// Remove and return every record.
    pub fn drain(&mut self) -> impl Iterator<Item = RequestRecord> + '_ {
        self.records.drain().map(|(_, record)| record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchConfig;

    fn record(key: &str, kind: RequestKind) -> RequestRecord {
        let params = RequestParameters::watch(false, 5000);
        let request = LocationRequest::build(kind, &params, &WatchConfig::default());
        let (reply, _rx) = ReplyChannel::pair();
        RequestRecord::new(key, kind, params, request, reply)
    }

    #[test]
    fn test_new_record_derives_id_from_key() {
        let record = record("w1", RequestKind::Continuous);
        assert_eq!(record.id, RequestId::from_key("w1"));
        assert_eq!(record.key, "w1");
        assert!(record.is_continuous());
        assert!(record.provider_handle.is_none());
    }

    #[test]
    fn test_put_get_remove() {
        let mut registry = WatchRegistry::new();
        let rec = record("w1", RequestKind::Continuous);
        let id = rec.id;

        assert!(registry.put(id, rec).is_none());
        assert!(registry.contains(id));
        assert_eq!(registry.get(id).map(|r| r.key.as_str()), Some("w1"));

        assert!(registry.remove(id).is_some());
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_put_same_id_overwrites() {
        let mut registry = WatchRegistry::new();
        let first = record("w1", RequestKind::Continuous);
        let id = first.id;
        registry.put(id, first);

        let previous = registry.put(id, record("w1", RequestKind::OneShot));

        assert_eq!(previous.map(|r| r.kind), Some(RequestKind::Continuous));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(id).map(|r| r.kind), Some(RequestKind::OneShot));
    }

    #[test]
    fn test_ids_sorted_and_drain_empties() {
        let mut registry = WatchRegistry::new();
        for key in ["b", "a", "c"] {
            let rec = record(key, RequestKind::Continuous);
            registry.put(rec.id, rec);
        }

        let ids = registry.ids();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(registry.drain().count(), 3);
        assert!(registry.is_empty());
    }
}
