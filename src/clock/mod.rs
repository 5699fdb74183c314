//! Reference clocks and clock realms.
//!
//! Producer stages never read wall-clock time directly. Each stage names a
//! reference [`Clock`], and callers hand stages immutable [`ClockSnapshot`]s
//! through the per-invocation mix context. Two implementations are provided:
//!
//! - [`RealClock`]: backed by the OS monotonic clock, for production.
//! - [`SyntheticClock`]: owned by a [`SyntheticClockRealm`] whose notion of
//!   "now" advances only on request, for deterministic tests.
//!
//! Clocks in the same *domain* are guaranteed to share an exact rate
//! relationship, so no drift compensation is needed between them.

mod real;
mod synthetic;

pub use real::RealClock;
pub use synthetic::{SyntheticClock, SyntheticClockRealm};

use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::ClockError;

/// A clock-domain identifier.
///
/// Clocks in the same domain advance at exactly the same rate; clocks in
/// different domains may drift relative to each other.
pub type ClockDomain = u32;

/// The domain of the system monotonic clock.
pub const MONOTONIC_DOMAIN: ClockDomain = 0;

/// The largest rate adjustment accepted by [`Clock::set_rate`], in parts per
/// million.
pub const MAX_RATE_ADJUST_PPM: i32 = 1000;

/// An opaque, process-unique clock identity.
///
/// Identity is stable for the clock's lifetime and is the only thing used for
/// equality and lookup; two clocks never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockId(u64);

impl ClockId {
    /// Allocates a fresh, never-before-used id.
    pub(crate) fn new_unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock:{}", self.0)
    }
}

/// An instant on a monotonic timeline, in nanoseconds.
///
/// Signed so that clock transforms can express instants before a timeline's
/// zero point. Real clocks start at zero when the process first queries them;
/// synthetic realms start at zero when created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MonotonicTime(i64);

impl MonotonicTime {
    /// The timeline's zero point.
    pub const ZERO: Self = Self(0);

    /// Creates an instant from nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Returns the instant as nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }
}

impl Add<Duration> for MonotonicTime {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.as_nanos() as i64)
    }
}

impl Sub<Duration> for MonotonicTime {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self {
        Self(self.0 - rhs.as_nanos() as i64)
    }
}

impl fmt::Display for MonotonicTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// A linear mapping from a reference timeline to a clock's local timeline.
///
/// `apply(t)` maps the reference instant `t` to
/// `local_time + (t - reference_time) * rate_numer / rate_denom`. The default
/// transform is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineTransform {
    /// Anchor instant on the reference timeline.
    pub reference_time: MonotonicTime,
    /// The local instant corresponding to `reference_time`.
    pub local_time: MonotonicTime,
    /// Rate numerator (local ticks per `rate_denom` reference ticks).
    pub rate_numer: u32,
    /// Rate denominator.
    pub rate_denom: u32,
}

impl TimelineTransform {
    /// The identity mapping: local time equals reference time.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            reference_time: MonotonicTime::ZERO,
            local_time: MonotonicTime::ZERO,
            rate_numer: 1,
            rate_denom: 1,
        }
    }

    /// Maps a reference instant to the local timeline.
    #[must_use]
    pub fn apply(&self, reference: MonotonicTime) -> MonotonicTime {
        let delta = i128::from(reference.as_nanos() - self.reference_time.as_nanos());
        let scaled = delta * i128::from(self.rate_numer) / i128::from(self.rate_denom);
        MonotonicTime::from_nanos(self.local_time.as_nanos() + scaled as i64)
    }

    /// Returns this mapping with its rate replaced by a ppm adjustment,
    /// re-anchored at `reference` so local time is continuous across the
    /// change.
    #[must_use]
    pub fn with_rate_adjust(&self, rate_adjust_ppm: i32, reference: MonotonicTime) -> Self {
        Self {
            reference_time: reference,
            local_time: self.apply(reference),
            rate_numer: (1_000_000 + rate_adjust_ppm) as u32,
            rate_denom: 1_000_000,
        }
    }
}

impl Default for TimelineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// One reference clock: identity, domain, and a monotonic-time query.
///
/// All methods are safe to call from any thread.
pub trait Clock: Send + Sync {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// This clock's stable identity.
    fn id(&self) -> ClockId;

    /// The clock's rate-relationship group.
    fn domain(&self) -> ClockDomain;

    /// Whether [`Clock::set_rate`] is permitted on this clock.
    fn adjustable(&self) -> bool;

    /// The current instant on this clock's local timeline.
    ///
    /// Fails with [`ClockError::RealmDestroyed`] for a synthetic clock whose
    /// realm has been dropped.
    fn now(&self) -> Result<MonotonicTime, ClockError>;

    /// The current reference-to-local mapping.
    fn to_local(&self) -> Result<TimelineTransform, ClockError>;

    /// Adjusts the clock's rate by `rate_adjust_ppm` parts per million.
    ///
    /// Fails with [`ClockError::NotAdjustable`] unless the clock was
    /// constructed adjustable, and with [`ClockError::InvalidRateAdjustment`]
    /// when the magnitude exceeds [`MAX_RATE_ADJUST_PPM`].
    fn set_rate(&self, rate_adjust_ppm: i32) -> Result<(), ClockError>;

    /// Captures an immutable snapshot of this clock for a mix job.
    fn snapshot(&self) -> Result<ClockSnapshot, ClockError> {
        Ok(ClockSnapshot {
            clock_id: self.id(),
            now: self.now()?,
            to_local: self.to_local()?,
        })
    }
}

pub(crate) fn validate_rate_adjust(rate_adjust_ppm: i32) -> Result<(), ClockError> {
    if rate_adjust_ppm.abs() > MAX_RATE_ADJUST_PPM {
        return Err(ClockError::InvalidRateAdjustment {
            ppm: rate_adjust_ppm,
            max: MAX_RATE_ADJUST_PPM,
        });
    }
    Ok(())
}

/// An immutable capture of one clock's state at the start of a mix job.
///
/// Stages translate between their reference clock and the caller's mix
/// timeline through snapshots rather than live clock queries, so a single mix
/// job observes a consistent set of instants.
#[derive(Debug, Clone, Copy)]
pub struct ClockSnapshot {
    /// Identity of the captured clock.
    pub clock_id: ClockId,
    /// The clock's local instant at capture time.
    pub now: MonotonicTime,
    /// The clock's reference-to-local mapping at capture time.
    pub to_local: TimelineTransform,
}

/// A set of clock snapshots, keyed by clock identity.
#[derive(Debug, Clone, Default)]
pub struct ClockSnapshots {
    snapshots: HashMap<ClockId, ClockSnapshot>,
}

impl ClockSnapshots {
    /// Adds or replaces a snapshot.
    pub fn insert(&mut self, snapshot: ClockSnapshot) {
        self.snapshots.insert(snapshot.clock_id, snapshot);
    }

    /// Looks up the snapshot for `id`.
    #[must_use]
    pub fn get(&self, id: ClockId) -> Option<&ClockSnapshot> {
        self.snapshots.get(&id)
    }

    /// Returns `true` if no snapshots were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
