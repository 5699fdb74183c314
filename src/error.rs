//! Error types for mix-pipeline.
//!
//! The fallible surface of this crate is deliberately small. `read`, `advance`
//! and `push` never return errors: missing data is a silent "nothing
//! returned", and expired data is reported through the advisory underflow
//! callback. Caller precondition violations (advancing a clock realm
//! backwards, constructing a malformed packet view) fail fast with a panic,
//! since corrupting frame-position math would be worse than crashing.
//!
//! What remains is the clock domain, where queries can genuinely fail.

/// Errors from clock queries and adjustments.
///
/// Returned by [`Clock`](crate::clock::Clock) methods. A clock whose owning
/// realm has been destroyed is permanently invalid; there is no way back to a
/// live state.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The clock's owning realm was destroyed; all further queries fail.
    #[error("clock '{name}' belongs to a destroyed realm")]
    RealmDestroyed {
        /// Name of the invalid clock.
        name: String,
    },

    /// `set_rate` was called on a clock not constructed as adjustable.
    ///
    /// Adjustability is a construction-time, immutable property.
    #[error("clock '{name}' is not adjustable")]
    NotAdjustable {
        /// Name of the non-adjustable clock.
        name: String,
    },

    /// The requested rate adjustment exceeds the permitted range.
    #[error("rate adjustment of {ppm} ppm is out of range (max ±{max} ppm)")]
    InvalidRateAdjustment {
        /// The rejected adjustment, in parts per million.
        ppm: i32,
        /// The largest permitted magnitude, in parts per million.
        max: i32,
    },
}
