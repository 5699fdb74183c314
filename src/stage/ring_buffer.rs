//! Producer stage serving frames from a circular buffer.

use std::sync::Arc;

use super::{MixJobContext, PipelineStage, ProducerStage};
use crate::clock::ClockId;
use crate::{Format, FramePosition, PacketView};

/// External source of truth for how far the ring has been validly written.
///
/// Returns the highest absolute frame position that is safe to read. Must not
/// block; may be called multiple times per read. The stage treats the value
/// as monotonically non-decreasing within a mix job but does not enforce it.
pub type SafeReadFrameFn = Box<dyn Fn() -> i64 + Send>;

/// A producer stage that serves frames out of a fixed-size circular memory
/// region written by an external party (typically a driver).
///
/// The stage only ever reads the region; the writer owns write access and
/// reports its progress through the safe-read-frame oracle. Frames older than
/// `safe_read_frame - capacity + 1` have been overwritten by wraparound and
/// read as nothing.
///
/// All arithmetic is on signed frame positions, never on unsigned byte
/// offsets, so negative positions (pre-roll data) behave identically to
/// positive ones.
///
/// # Example
///
/// ```
/// use mix_pipeline::clock::{Clock, SyntheticClockRealm};
/// use mix_pipeline::{
///     Format, FramePosition, MixJobContext, PipelineStage, RingBufferProducerStage,
/// };
/// use std::sync::Arc;
///
/// let format = Format::new(48_000, 2);
/// let realm = SyntheticClockRealm::new();
/// let clock = realm.create_clock("driver", 0, false, Default::default());
///
/// let ring = Arc::new(vec![0.0f32; 480 * 2]);
/// let mut stage =
///     RingBufferProducerStage::new("driver", format, clock.id(), ring, 480, Box::new(|| 47));
///
/// let ctx = MixJobContext::default();
/// let packet = stage.read(&ctx, FramePosition::from_frames(0), 96).unwrap();
/// // Clamped to the written prefix: frames 48..96 do not exist yet.
/// assert_eq!(packet.length(), 48);
/// ```
pub struct RingBufferProducerStage {
    name: String,
    format: Format,
    reference_clock: ClockId,
    payload: Arc<Vec<f32>>,
    capacity_frames: i64,
    safe_read_frame: SafeReadFrameFn,
    // Positions before this have been released by the caller. The ring itself
    // is externally managed, so there is nothing else to discard.
    released_before: Option<FramePosition>,
}

impl RingBufferProducerStage {
    /// Creates a stage over `payload`, a circular region holding exactly
    /// `capacity_frames` frames of `format`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity_frames` is not positive or if `payload` does not
    /// hold exactly `capacity_frames` frames.
    #[must_use]
    pub fn new(
        name: &str,
        format: Format,
        reference_clock: ClockId,
        payload: Arc<Vec<f32>>,
        capacity_frames: i64,
        safe_read_frame: SafeReadFrameFn,
    ) -> Self {
        assert!(
            capacity_frames > 0,
            "ring capacity must be positive, got {capacity_frames}"
        );
        assert!(
            payload.len() == (capacity_frames as usize) * format.samples_per_frame(),
            "ring payload holds {} samples, expected {} ({capacity_frames} frames x {} channels)",
            payload.len(),
            (capacity_frames as usize) * format.samples_per_frame(),
            format.channels
        );
        Self {
            name: name.to_string(),
            format,
            reference_clock,
            payload,
            capacity_frames,
            safe_read_frame,
            released_before: None,
        }
    }

    /// The ring's capacity in frames.
    #[must_use]
    pub fn capacity_frames(&self) -> i64 {
        self.capacity_frames
    }

    /// The highest position the caller has released via `advance`, or `None`
    /// before the first `advance`.
    #[must_use]
    pub fn released_before(&self) -> Option<FramePosition> {
        self.released_before
    }
}

impl PipelineStage for RingBufferProducerStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Format {
        self.format
    }

    fn reference_clock(&self) -> ClockId {
        self.reference_clock
    }

    /// Serves the readable portion of `[start_frame, start_frame +
    /// frame_count)`:
    ///
    /// - frames past the oracle's safe-read position have not been written
    ///   and read as nothing;
    /// - frames behind the ring's oldest retained position were overwritten
    ///   by wraparound; a fully-overwritten request reads as nothing and a
    ///   partially-overwritten one is truncated to the surviving suffix;
    /// - a request spanning the physical wrap point is truncated at the end
    ///   of the ring, and the caller reads the remainder with a second call
    ///   starting at the wrap point.
    ///
    /// The request start is floored to a whole frame; the ring is addressed
    /// in whole frames only.
    fn read(
        &mut self,
        _ctx: &MixJobContext,
        start_frame: FramePosition,
        frame_count: i64,
    ) -> Option<PacketView> {
        let safe_read_frame = (self.safe_read_frame)();
        let mut start = start_frame.floor();

        // Nothing written at or after the requested start yet.
        if start > safe_read_frame {
            return None;
        }

        let oldest_available = safe_read_frame - self.capacity_frames + 1;
        let mut end = start.checked_add(frame_count)?;
        if end <= oldest_available {
            // Every requested frame has been overwritten.
            return None;
        }
        if start < oldest_available {
            // Skip the overwritten prefix.
            start = oldest_available;
        }

        // Cannot read past the last written frame.
        end = end.min(safe_read_frame + 1);

        // Never cross the physical wrap boundary in a single packet.
        let ring_offset = start.rem_euclid(self.capacity_frames);
        let length = (end - start).min(self.capacity_frames - ring_offset);
        if length <= 0 {
            return None;
        }

        Some(PacketView::new(
            self.format,
            FramePosition::from_frames(start),
            length,
            Arc::clone(&self.payload),
            (ring_offset as usize) * self.format.samples_per_frame(),
        ))
    }

    fn advance(&mut self, frame: FramePosition) {
        // The ring is externally managed; just track the low-water mark.
        self.released_before = Some(match self.released_before {
            Some(mark) => mark.max(frame),
            None => frame,
        });
    }
}

impl ProducerStage for RingBufferProducerStage {}
