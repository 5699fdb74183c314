//! Fixed-point frame positions.
//!
//! Every stage API in this crate traffics in [`FramePosition`] rather than in
//! raw byte offsets or wall-clock time. The fractional part exists for
//! non-integral resampling rates: after rate conversion, "the frame the mixer
//! wants next" is rarely a whole frame index.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A signed, fixed-point position on a stage's frame timeline.
///
/// The integer part is a whole frame index; the fractional part is a sub-frame
/// offset with [`FramePosition::FRAC_BITS`] bits of precision. Negative
/// positions are valid (pre-roll data) and behave identically to positive
/// ones.
///
/// Arithmetic never implicitly truncates the fractional part. The two places
/// truncation happens are explicit and documented: ring-buffer reads floor the
/// request start to a whole frame, and packet intersection aligns to the
/// packet's frame grid.
///
/// # Example
///
/// ```
/// use mix_pipeline::FramePosition;
///
/// let pos = FramePosition::from_frames(48) + FramePosition::from_raw(1);
/// assert_eq!(pos.floor(), 48);
/// assert_eq!(pos.ceil(), 49);
/// assert!(pos > FramePosition::from_frames(48));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FramePosition(i64);

impl FramePosition {
    /// Number of fractional bits in the representation.
    pub const FRAC_BITS: u32 = 13;

    /// The raw value of one whole frame (`1 << FRAC_BITS`).
    pub const FRAC_ONE: i64 = 1 << Self::FRAC_BITS;

    const FRAC_MASK: i64 = Self::FRAC_ONE - 1;

    /// Position zero.
    pub const ZERO: Self = Self(0);

    /// Creates a position at a whole frame index.
    ///
    /// # Panics
    ///
    /// Panics if `frames` does not fit in the fixed-point range.
    #[must_use]
    pub const fn from_frames(frames: i64) -> Self {
        match frames.checked_mul(Self::FRAC_ONE) {
            Some(raw) => Self(raw),
            None => panic!("whole-frame count overflows the fixed-point range"),
        }
    }

    /// Creates a position from a raw fixed-point value.
    #[must_use]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw fixed-point value.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Returns the whole-frame index at or before this position.
    ///
    /// Arithmetic shift, so this floors toward negative infinity:
    /// `(-0.5).floor() == -1`.
    #[must_use]
    pub const fn floor(self) -> i64 {
        self.0 >> Self::FRAC_BITS
    }

    /// Returns the whole-frame index at or after this position.
    #[must_use]
    pub const fn ceil(self) -> i64 {
        (self.0 + Self::FRAC_MASK) >> Self::FRAC_BITS
    }

    /// Returns the sub-frame remainder, in `[0, 1)` frames.
    #[must_use]
    pub const fn fraction(self) -> Self {
        Self(self.0 & Self::FRAC_MASK)
    }

    /// Returns `true` if this position lies exactly on a frame boundary.
    #[must_use]
    pub const fn is_whole(self) -> bool {
        self.0 & Self::FRAC_MASK == 0
    }

    /// Converts to a floating-point frame count.
    ///
    /// Lossy for very large positions; intended for telemetry (underflow
    /// duration estimates), not for timeline arithmetic.
    #[must_use]
    pub fn to_frames_f64(self) -> f64 {
        self.0 as f64 / Self::FRAC_ONE as f64
    }

    /// Checked addition of a whole-frame count, `None` on overflow.
    #[must_use]
    pub fn checked_add_frames(self, frames: i64) -> Option<Self> {
        frames
            .checked_mul(Self::FRAC_ONE)
            .and_then(|raw| self.0.checked_add(raw))
            .map(Self)
    }

    /// Returns the larger of two positions.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }
}

impl Add for FramePosition {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Add<i64> for FramePosition {
    type Output = Self;

    /// Adds a whole-frame count.
    ///
    /// Panics on overflow; use [`FramePosition::checked_add_frames`] when the
    /// count is untrusted.
    fn add(self, frames: i64) -> Self {
        match self.checked_add_frames(frames) {
            Some(pos) => pos,
            None => panic!("frame position overflow: {self} + {frames} frames"),
        }
    }
}

impl Sub for FramePosition {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sub<i64> for FramePosition {
    type Output = Self;

    /// Subtracts a whole-frame count.
    ///
    /// Panics on overflow.
    fn sub(self, frames: i64) -> Self {
        match frames
            .checked_mul(Self::FRAC_ONE)
            .and_then(|raw| self.0.checked_sub(raw))
        {
            Some(raw) => Self(raw),
            None => panic!("frame position overflow: {self} - {frames} frames"),
        }
    }
}

impl AddAssign for FramePosition {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for FramePosition {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for FramePosition {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Debug for FramePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FramePosition({}+{}/{})", self.floor(), self.fraction().raw(), Self::FRAC_ONE)
    }
}

impl fmt::Display for FramePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole() {
            write!(f, "{}", self.floor())
        } else {
            write!(f, "{}", self.to_frames_f64())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_frame_round_trip() {
        let pos = FramePosition::from_frames(480);
        assert_eq!(pos.floor(), 480);
        assert_eq!(pos.ceil(), 480);
        assert!(pos.is_whole());
        assert_eq!(pos.fraction(), FramePosition::ZERO);
    }

    #[test]
    fn test_fractional_floor_and_ceil() {
        let pos = FramePosition::from_frames(10) + FramePosition::from_raw(1);
        assert_eq!(pos.floor(), 10);
        assert_eq!(pos.ceil(), 11);
        assert!(!pos.is_whole());
    }

    #[test]
    fn test_negative_floor_rounds_down() {
        // -0.5 frames lives in frame -1.
        let pos = FramePosition::from_raw(-(FramePosition::FRAC_ONE / 2));
        assert_eq!(pos.floor(), -1);
        assert_eq!(pos.ceil(), 0);
    }

    #[test]
    fn test_arithmetic_preserves_fraction() {
        let a = FramePosition::from_raw(3);
        let b = FramePosition::from_frames(5);
        assert_eq!((a + b).raw(), 3 + 5 * FramePosition::FRAC_ONE);
        assert_eq!((b - a).raw(), 5 * FramePosition::FRAC_ONE - 3);
    }

    #[test]
    fn test_whole_frame_operators() {
        let pos = FramePosition::from_frames(100) + 28;
        assert_eq!(pos, FramePosition::from_frames(128));
        assert_eq!(pos - 128, FramePosition::ZERO);
    }

    #[test]
    fn test_ordering() {
        let lo = FramePosition::from_frames(-500);
        let hi = FramePosition::from_frames(-499);
        assert!(lo < hi);
        assert_eq!(lo.max(hi), hi);
    }

    #[test]
    fn test_checked_add_frames_overflow() {
        assert!(FramePosition::from_raw(i64::MAX).checked_add_frames(1).is_none());
        assert_eq!(
            FramePosition::ZERO.checked_add_frames(7),
            Some(FramePosition::from_frames(7))
        );
    }

    #[test]
    #[should_panic(expected = "fixed-point range")]
    fn test_from_frames_overflow_panics() {
        let _ = FramePosition::from_frames(i64::MAX);
    }

    #[test]
    #[should_panic(expected = "frame position overflow")]
    fn test_whole_frame_add_overflow_panics() {
        let _ = FramePosition::from_raw(i64::MAX) + 1;
    }

    #[test]
    fn test_display() {
        assert_eq!(FramePosition::from_frames(48).to_string(), "48");
        let half = FramePosition::from_raw(FramePosition::FRAC_ONE / 2);
        assert_eq!(half.to_string(), "0.5");
    }
}
