//! Reference clock backed by the OS monotonic clock.

use std::sync::OnceLock;
use std::time::Instant;

use parking_lot::Mutex;

use super::{
    validate_rate_adjust, Clock, ClockDomain, ClockId, MonotonicTime, TimelineTransform,
};
use crate::ClockError;

/// The process-wide monotonic timeline shared by all real clocks.
///
/// Anchored the first time any real clock is queried, so clocks in the
/// monotonic domain observe a single consistent timeline.
fn process_now() -> MonotonicTime {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    let anchor = ANCHOR.get_or_init(Instant::now);
    MonotonicTime::from_nanos(anchor.elapsed().as_nanos() as i64)
}

/// A clock backed by the OS monotonic clock.
///
/// `now()` never fails. Rate adjustments, when permitted, are applied as a
/// software transform over the underlying OS clock.
///
/// # Example
///
/// ```
/// use mix_pipeline::clock::{Clock, RealClock, MONOTONIC_DOMAIN};
///
/// let clock = RealClock::new("device", MONOTONIC_DOMAIN);
/// assert!(!clock.adjustable());
/// let earlier = clock.now().unwrap();
/// assert!(clock.now().unwrap() >= earlier);
/// ```
pub struct RealClock {
    name: String,
    id: ClockId,
    domain: ClockDomain,
    adjustable: bool,
    to_local: Mutex<TimelineTransform>,
}

impl RealClock {
    /// Creates a non-adjustable clock on the OS monotonic timeline.
    #[must_use]
    pub fn new(name: &str, domain: ClockDomain) -> Self {
        Self::with_adjustability(name, domain, false)
    }

    /// Creates an adjustable clock on the OS monotonic timeline.
    #[must_use]
    pub fn adjustable(name: &str, domain: ClockDomain) -> Self {
        Self::with_adjustability(name, domain, true)
    }

    fn with_adjustability(name: &str, domain: ClockDomain, adjustable: bool) -> Self {
        Self {
            name: name.to_string(),
            id: ClockId::new_unique(),
            domain,
            adjustable,
            to_local: Mutex::new(TimelineTransform::identity()),
        }
    }
}

impl Clock for RealClock {
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
        Ok(self.to_local.lock().apply(process_now()))
    }

    fn to_local(&self) -> Result<TimelineTransform, ClockError> {
        Ok(*self.to_local.lock())
    }

    fn set_rate(&self, rate_adjust_ppm: i32) -> Result<(), ClockError> {
        if !self.adjustable {
            return Err(ClockError::NotAdjustable {
                name: self.name.clone(),
            });
        }
        validate_rate_adjust(rate_adjust_ppm)?;

        let mut to_local = self.to_local.lock();
        *to_local = to_local.with_rate_adjust(rate_adjust_ppm, process_now());
        tracing::debug!(clock = %self.name, rate_adjust_ppm, "real clock rate adjusted");
        Ok(())
    }
}
