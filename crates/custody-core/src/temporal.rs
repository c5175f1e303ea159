//! # Temporal Types
//!
//! UTC-only timestamps and the injected clock used by every time-gate.
//!
//! ## Design Decision
//!
//! The engine never schedules anything. A time-gate is a precondition that
//! compares `clock.now()` against a stored timestamp when an operation is
//! attempted, so the clock is the only source of time and it is injected.
//! [`SystemClock`] reads wall-clock UTC; [`ManualClock`] is advanced
//! explicitly by tests and scripted replays.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC timestamp.
///
/// Serializes to RFC 3339 with a `Z` suffix (e.g., `2026-01-15T12:00:00Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Create a timestamp from whole seconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimestamp`] if the value is outside
    /// the representable range.
    pub fn from_unix_secs(secs: i64) -> Result<Self, ValidationError> {
        Utc.timestamp_opt(secs, 0)
            .single()
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidTimestamp {
                value: secs.to_string(),
                reason: "out of range".to_string(),
            })
    }

    /// Parse an RFC 3339 string. Non-UTC offsets are converted to UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimestamp`] if the string does not
    /// parse.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| ValidationError::InvalidTimestamp {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// Access the underlying `chrono::DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Seconds since the Unix epoch.
    pub fn unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Time elapsed from `earlier` to `self`. Negative if `earlier` is later.
    pub fn since(&self, earlier: &Timestamp) -> Duration {
        self.0.signed_duration_since(earlier.0)
    }

    /// This timestamp shifted forward by `delta`, saturating at the maximum
    /// representable instant.
    pub fn plus(&self, delta: Duration) -> Timestamp {
        Self(
            self.0
                .checked_add_signed(delta)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current time for every time-gate.
///
/// Implementations are expected to be monotonically non-decreasing. The
/// engine still guards against regressions by clamping to the latest
/// reading it has observed.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Wall-clock UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can hand one clone to
/// the engine and keep another to advance time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a clock frozen at the Unix epoch.
    pub fn at_epoch() -> Self {
        Self::new(Timestamp::from_datetime(DateTime::<Utc>::UNIX_EPOCH))
    }

    /// Move the clock forward by `delta`. Negative deltas are ignored.
    pub fn advance(&self, delta: Duration) {
        if delta < Duration::zero() {
            tracing::warn!(delta_secs = delta.num_seconds(), "ignoring negative clock advance");
            return;
        }
        let mut current = self.current.lock();
        *current = current.plus(delta);
    }

    /// Move the clock forward by whole seconds.
    ///
    /// A count beyond the representable duration range pins the clock at the
    /// latest representable instant.
    pub fn advance_secs(&self, secs: i64) {
        match Duration::try_seconds(secs) {
            Some(delta) => self.advance(delta),
            None if secs > 0 => {
                *self.current.lock() = Timestamp::from_datetime(DateTime::<Utc>::MAX_UTC);
            }
            None => {
                tracing::warn!(delta_secs = secs, "ignoring negative clock advance");
            }
        }
    }

    /// Jump to `to` if it is not earlier than the current instant.
    ///
    /// Returns `false` (and leaves the clock unchanged) for a backwards jump.
    pub fn set(&self, to: Timestamp) -> bool {
        let mut current = self.current.lock();
        if to < *current {
            return false;
        }
        *current = to;
        true
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at_epoch()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}
