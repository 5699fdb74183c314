//! Synthetic clocks whose time advances on request only.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::{
    validate_rate_adjust, Clock, ClockDomain, ClockId, MonotonicTime, TimelineTransform,
};
use crate::ClockError;

/// Shared state for one realm: the realm-local monotonic instant.
struct RealmCore {
    mono_now: Mutex<MonotonicTime>,
}

/// Creates and controls a collection of synthetic clocks.
///
/// Each realm has its own isolated monotonic timeline, starting at zero and
/// advancing only on [`advance_to`](SyntheticClockRealm::advance_to) /
/// [`advance_by`](SyntheticClockRealm::advance_by). Within a realm, all clocks
/// observe a new instant atomically: no caller can see one clock advanced
/// while a sibling has not.
///
/// Dropping the last handle to a realm invalidates every clock it created;
/// further queries on those clocks fail with
/// [`ClockError::RealmDestroyed`].
///
/// # Example
///
/// ```
/// use mix_pipeline::clock::{Clock, MonotonicTime, SyntheticClockRealm};
/// use std::time::Duration;
///
/// let realm = SyntheticClockRealm::new();
/// let clock = realm.create_clock("test", 0, false, Default::default());
///
/// assert_eq!(clock.now().unwrap(), MonotonicTime::ZERO);
/// realm.advance_by(Duration::from_millis(10));
/// assert_eq!(clock.now().unwrap(), MonotonicTime::ZERO + Duration::from_millis(10));
/// ```
#[derive(Clone)]
pub struct SyntheticClockRealm {
    core: Arc<RealmCore>,
}

impl SyntheticClockRealm {
    /// Creates a new realm with `now() == MonotonicTime::ZERO`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Arc::new(RealmCore {
                mono_now: Mutex::new(MonotonicTime::ZERO),
            }),
        }
    }

    /// The current realm-local monotonic time.
    #[must_use]
    pub fn now(&self) -> MonotonicTime {
        *self.core.mono_now.lock()
    }

    /// Creates a new clock in this realm.
    ///
    /// The clock's `now()` starts at the realm's current instant passed
    /// through `to_local` (by default, the identity transform).
    #[must_use]
    pub fn create_clock(
        &self,
        name: &str,
        domain: ClockDomain,
        adjustable: bool,
        to_local: TimelineTransform,
    ) -> Arc<SyntheticClock> {
        Arc::new(SyntheticClock {
            name: name.to_string(),
            id: ClockId::new_unique(),
            domain,
            adjustable,
            realm: Arc::downgrade(&self.core),
            to_local: Mutex::new(to_local),
        })
    }

    /// Advances the realm's time to `mono_now`.
    ///
    /// # Panics
    ///
    /// Panics unless `mono_now` is strictly greater than the current instant.
    /// Moving a monotonic timeline backwards is a caller programming error.
    pub fn advance_to(&self, mono_now: MonotonicTime) {
        let mut now = self.core.mono_now.lock();
        assert!(
            mono_now > *now,
            "realm time must advance: {mono_now} is not after {now}",
            now = *now
        );
        *now = mono_now;
    }

    /// Advances the realm's time by `mono_diff`.
    ///
    /// # Panics
    ///
    /// Panics unless `mono_diff` is strictly positive.
    pub fn advance_by(&self, mono_diff: Duration) {
        assert!(mono_diff > Duration::ZERO, "realm advance must be positive");
        let mut now = self.core.mono_now.lock();
        *now = *now + mono_diff;
    }
}

impl Default for SyntheticClockRealm {
    fn default() -> Self {
        Self::new()
    }
}

/// A synthetic clock. Time advances only when its realm is advanced.
///
/// Created by [`SyntheticClockRealm::create_clock`]. All methods are safe to
/// call from any thread. Once the owning realm is dropped the clock is
/// permanently invalid.
pub struct SyntheticClock {
    name: String,
    id: ClockId,
    domain: ClockDomain,
    adjustable: bool,
    realm: Weak<RealmCore>,
    to_local: Mutex<TimelineTransform>,
}

impl SyntheticClock {
    fn realm(&self) -> Result<Arc<RealmCore>, ClockError> {
        self.realm.upgrade().ok_or_else(|| ClockError::RealmDestroyed {
            name: self.name.clone(),
        })
    }
}

impl Clock for SyntheticClock {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> ClockId {
        self.id
    }

    fn domain(&self) -> ClockDomain {
        self.domain
    }

    fn adjustable(&self) -> bool {
        self.adjustable
    }

    fn now(&self) -> Result<MonotonicTime, ClockError> {
        let realm = self.realm()?;
        let mono_now = *realm.mono_now.lock();
        Ok(self.to_local.lock().apply(mono_now))
    }

    fn to_local(&self) -> Result<TimelineTransform, ClockError> {
        self.realm()?;
        Ok(*self.to_local.lock())
    }

    fn set_rate(&self, rate_adjust_ppm: i32) -> Result<(), ClockError> {
        if !self.adjustable {
            return Err(ClockError::NotAdjustable {
                name: self.name.clone(),
            });
        }
        validate_rate_adjust(rate_adjust_ppm)?;
        let realm = self.realm()?;

        // Anchor at the realm's current instant so local time is continuous
        // across the rate change.
        let mono_now = *realm.mono_now.lock();
        let mut to_local = self.to_local.lock();
        *to_local = to_local.with_rate_adjust(rate_adjust_ppm, mono_now);
        tracing::debug!(clock = %self.name, rate_adjust_ppm, "synthetic clock rate adjusted");
        Ok(())
    }
}
