//! Stream format for producer stages.

use std::time::Duration;

/// The format of a frame timeline: sample rate and channel count.
///
/// Every stage declares its format at construction. Payload samples are
/// 32-bit float throughout this crate (the mixing pipeline's internal sample
/// type), so `Format` does not carry a sample-type tag.
///
/// # Example
///
/// ```
/// use mix_pipeline::Format;
/// use std::time::Duration;
///
/// let format = Format::new(48_000, 2);
/// assert_eq!(format.samples_per_frame(), 2);
/// assert_eq!(format.frames_to_duration(48.0), Duration::from_millis(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Frame rate in Hz (e.g., 16000, 44100, 48000).
    pub sample_rate_hz: u32,
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
}

impl Format {
    /// Creates a new format.
    #[must_use]
    pub const fn new(sample_rate_hz: u32, channels: u16) -> Self {
        Self {
            sample_rate_hz,
            channels,
        }
    }

    /// Returns the number of samples in one frame (one per channel).
    #[must_use]
    pub const fn samples_per_frame(&self) -> usize {
        self.channels as usize
    }

    /// Converts a frame count to a duration at this format's rate.
    ///
    /// Negative or zero-rate inputs yield `Duration::ZERO`; this conversion is
    /// used for telemetry estimates, not timeline arithmetic.
    #[must_use]
    pub fn frames_to_duration(&self, frames: f64) -> Duration {
        if self.sample_rate_hz == 0 || frames <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames / f64::from(self.sample_rate_hz))
    }

    /// Returns the duration of a single frame.
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        self.frames_to_duration(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_to_duration_stereo_48khz() {
        let format = Format::new(48_000, 2);
        // Channel count does not affect frame timing.
        assert_eq!(format.frames_to_duration(4800.0), Duration::from_millis(100));
    }

    #[test]
    fn test_frames_to_duration_zero_rate() {
        let format = Format::new(0, 1);
        assert_eq!(format.frames_to_duration(100.0), Duration::ZERO);
    }

    #[test]
    fn test_frames_to_duration_negative_clamps() {
        let format = Format::new(48_000, 2);
        assert_eq!(format.frames_to_duration(-5.0), Duration::ZERO);
    }

    #[test]
    fn test_frame_duration_16khz() {
        let format = Format::new(16_000, 1);
        assert_eq!(format.frame_duration(), Duration::from_micros(62) + Duration::from_nanos(500));
    }
}
