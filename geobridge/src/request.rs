//! Request identity and parameters.
//!
//! A [`RequestId`] is derived from the caller-supplied key with the same
//! 32-bit polynomial string hash hosts have always used, so ids stay
//! compatible across versions. Two different keys that collide conflate two
//! logical requests; this is a known limitation kept for compatibility.

use std::fmt;
use std::time::Duration;

use crate::config::WatchConfig;

/// Identifier of a registered request, derived from the caller's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(i32);

impl RequestId {
    /// Derive the id for a caller-supplied key.
    ///
    /// `h = 31 * h + unit` over the UTF-16 code units of `key`, wrapping at
    /// 32 bits.
    pub fn from_key(key: &str) -> Self {
        let hash = key
            .encode_utf16()
            .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
        Self(hash)
    }

    /// Raw hash value.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifetime class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Resolves with exactly one reply, then leaves the registry.
    OneShot,
    /// Replies until cancelled.
    Continuous,
}

/// Requested accuracy tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyTier {
    Balanced,
    High,
}

impl AccuracyTier {
    pub fn from_high_accuracy(high_accuracy: bool) -> Self {
        if high_accuracy {
            AccuracyTier::High
        } else {
            AccuracyTier::Balanced
        }
    }
}

/// Caller-facing parameters stored with each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestParameters {
    /// Desired accuracy tier.
    pub accuracy: AccuracyTier,
    /// Maximum age of a cached fix (one-shot) or update interval (watch).
    /// Zero means "use the configured default".
    pub max_age: Duration,
    /// One-shot timeout, passed through to the provider.
    pub timeout: Option<Duration>,
}

impl RequestParameters {
    /// Parameters for a one-shot request from host-supplied millisecond values.
    ///
    /// Negative values are treated as zero; a zero timeout means none.
    pub fn one_shot(high_accuracy: bool, max_age_ms: i64, timeout_ms: i64) -> Self {
        let timeout = millis(timeout_ms);
        Self {
            accuracy: AccuracyTier::from_high_accuracy(high_accuracy),
            max_age: millis(max_age_ms),
            timeout: (!timeout.is_zero()).then_some(timeout),
        }
    }

    /// Parameters for a watch from host-supplied millisecond values.
    pub fn watch(high_accuracy: bool, interval_ms: i64) -> Self {
        Self {
            accuracy: AccuracyTier::from_high_accuracy(high_accuracy),
            max_age: millis(interval_ms),
            timeout: None,
        }
    }
}

fn millis(value: i64) -> Duration {
    Duration::from_millis(value.max(0) as u64)
}

/// Provider-level request built from a record's parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationRequest {
    pub priority: AccuracyTier,
    pub interval: Duration,
    /// Minimum movement in meters between two deliveries.
    pub smallest_displacement_m: f32,
    pub max_age: Duration,
    pub timeout: Option<Duration>,
    /// `Some(1)` for one-shot requests, `None` for open-ended watches.
    pub max_updates: Option<u32>,
}

impl LocationRequest {
    /// Build the provider request for a record.
    pub fn build(kind: RequestKind, params: &RequestParameters, config: &WatchConfig) -> Self {
        let interval = if params.max_age.is_zero() {
            config.interval
        } else {
            params.max_age
        };

        match kind {
            RequestKind::OneShot => Self {
                priority: params.accuracy,
                interval,
                smallest_displacement_m: 0.0,
                max_age: params.max_age,
                timeout: params.timeout,
                max_updates: Some(1),
            },
            RequestKind::Continuous => Self {
                priority: params.accuracy,
                interval,
                smallest_displacement_m: match params.accuracy {
                    AccuracyTier::High => config.high_accuracy_displacement_m,
                    AccuracyTier::Balanced => config.balanced_displacement_m,
                },
                max_age: params.max_age,
                timeout: None,
                max_updates: None,
            },
        }
    }
}

/// Token returned by the provider for an issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderHandle(pub u64);

impl fmt::Display for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
