//! Packet descriptors over shared audio payloads.

use std::sync::Arc;

use crate::{Format, FramePosition};

/// A lightweight descriptor of a contiguous run of frames in a buffer.
///
/// `PacketView` is the unit of data returned by every producer stage. It pairs
/// a timeline range (`start`, `length`) with a reference into a payload
/// buffer. Payloads are `Arc`-wrapped for zero-copy sharing: cloning or
/// narrowing a view never copies samples.
///
/// A view is immutable once constructed. Stages may narrow a view (shorter
/// length, later start) via [`PacketView::intersection`] before returning it
/// to a caller, never widen it.
///
/// # Example
///
/// ```
/// use mix_pipeline::{Format, FramePosition, PacketView};
/// use std::sync::Arc;
///
/// let format = Format::new(48_000, 2);
/// let payload = Arc::new(vec![0.0f32; 96 * 2]);
/// let packet = PacketView::new(format, FramePosition::from_frames(0), 96, payload, 0);
///
/// // Narrow to the middle 48 frames - shares the same payload.
/// let middle = packet.intersection(FramePosition::from_frames(24), 48).unwrap();
/// assert_eq!(middle.start(), FramePosition::from_frames(24));
/// assert_eq!(middle.length(), 48);
/// assert_eq!(middle.samples().len(), 48 * 2);
/// ```
#[derive(Debug, Clone)]
pub struct PacketView {
    format: Format,
    start: FramePosition,
    length: i64,
    payload: Arc<Vec<f32>>,
    payload_offset: usize,
}

impl PacketView {
    /// Creates a new view over `length` frames of `payload`, beginning
    /// `payload_offset` samples into the buffer.
    ///
    /// # Panics
    ///
    /// Panics if `length` is negative, if `start + length` overflows the
    /// representable frame range, or if the described sample range does not
    /// fit in `payload`.
    #[must_use]
    pub fn new(
        format: Format,
        start: FramePosition,
        length: i64,
        payload: Arc<Vec<f32>>,
        payload_offset: usize,
    ) -> Self {
        assert!(length >= 0, "packet length must be non-negative, got {length}");
        assert!(
            start.checked_add_frames(length).is_some(),
            "packet end overflows the frame range (start {start}, length {length})"
        );
        let samples = (length as usize) * format.samples_per_frame();
        assert!(
            payload_offset + samples <= payload.len(),
            "packet range [{payload_offset}, {}) exceeds payload of {} samples",
            payload_offset + samples,
            payload.len()
        );
        Self {
            format,
            start,
            length,
            payload,
            payload_offset,
        }
    }

    /// The timeline position of the first frame.
    #[must_use]
    pub fn start(&self) -> FramePosition {
        self.start
    }

    /// The position one past the last frame (`start + length`).
    #[must_use]
    pub fn end(&self) -> FramePosition {
        self.start + self.length
    }

    /// The number of frames in this view.
    #[must_use]
    pub fn length(&self) -> i64 {
        self.length
    }

    /// The stream format of the payload.
    #[must_use]
    pub fn format(&self) -> Format {
        self.format
    }

    /// The samples covered by this view, interleaved by channel.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        let len = (self.length as usize) * self.format.samples_per_frame();
        &self.payload[self.payload_offset..self.payload_offset + len]
    }

    /// Returns `true` if this view covers no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Narrows this view to the frames overlapping
    /// `[start, start + frame_count)`, or `None` if there is no overlap.
    ///
    /// The result is aligned to this packet's frame grid: if `start` falls
    /// mid-frame, the returned view begins at the packet frame containing
    /// `start`. The result never exceeds `frame_count` frames and is never
    /// wider than this view.
    #[must_use]
    pub fn intersection(&self, start: FramePosition, frame_count: i64) -> Option<PacketView> {
        let request_end = start.checked_add_frames(frame_count)?;
        if request_end <= self.start || self.end() <= start {
            return None;
        }

        // First overlapping frame on this packet's grid.
        let first = if start <= self.start {
            0
        } else {
            (start - self.start).floor()
        };
        // One past the last packet frame that begins before the request end.
        let last = (request_end - self.start).ceil().min(self.length);
        let length = (last - first).min(frame_count);
        if length <= 0 {
            return None;
        }

        Some(PacketView {
            format: self.format,
            start: self.start + first,
            length,
            payload: Arc::clone(&self.payload),
            payload_offset: self.payload_offset + (first as usize) * self.format.samples_per_frame(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(start: i64, length: i64) -> PacketView {
        let format = Format::new(48_000, 2);
        let payload = Arc::new(vec![0.0f32; (length as usize) * 2]);
        PacketView::new(format, FramePosition::from_frames(start), length, payload, 0)
    }

    #[test]
    fn test_bounds() {
        let view = packet(10, 20);
        assert_eq!(view.start(), FramePosition::from_frames(10));
        assert_eq!(view.end(), FramePosition::from_frames(30));
        assert_eq!(view.length(), 20);
        assert_eq!(view.samples().len(), 40);
        assert!(!view.is_empty());
    }

    #[test]
    fn test_intersection_inside_packet_is_exact() {
        let view = packet(0, 100);
        let got = view.intersection(FramePosition::from_frames(25), 50).unwrap();
        assert_eq!(got.start(), FramePosition::from_frames(25));
        assert_eq!(got.length(), 50);
    }

    #[test]
    fn test_intersection_truncates_to_packet() {
        let view = packet(10, 20);
        // Request extends past both ends of the packet.
        let got = view.intersection(FramePosition::from_frames(0), 100).unwrap();
        assert_eq!(got.start(), FramePosition::from_frames(10));
        assert_eq!(got.length(), 20);
    }

    #[test]
    fn test_intersection_disjoint() {
        let view = packet(10, 20);
        assert!(view.intersection(FramePosition::from_frames(30), 10).is_none());
        assert!(view.intersection(FramePosition::from_frames(0), 10).is_none());
    }

    #[test]
    fn test_intersection_fractional_start_aligns_to_grid() {
        let view = packet(0, 10);
        // Request starts half a frame in; the first returned frame is the
        // frame containing the request start.
        let half = FramePosition::from_raw(FramePosition::FRAC_ONE / 2);
        let got = view.intersection(FramePosition::from_frames(3) + half, 4).unwrap();
        assert_eq!(got.start(), FramePosition::from_frames(3));
        assert_eq!(got.length(), 4);
    }

    #[test]
    fn test_intersection_shares_payload() {
        let format = Format::new(48_000, 1);
        let payload = Arc::new((0..10).map(|i| i as f32).collect::<Vec<f32>>());
        let view = PacketView::new(format, FramePosition::from_frames(0), 10, payload, 0);
        let got = view.intersection(FramePosition::from_frames(4), 3).unwrap();
        assert_eq!(got.samples(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_negative_positions() {
        let view = packet(-500, 10);
        let got = view.intersection(FramePosition::from_frames(-495), 100).unwrap();
        assert_eq!(got.start(), FramePosition::from_frames(-495));
        assert_eq!(got.length(), 5);
    }

    #[test]
    #[should_panic(expected = "exceeds payload")]
    fn test_new_rejects_short_payload() {
        let format = Format::new(48_000, 2);
        let payload = Arc::new(vec![0.0f32; 10]);
        let _ = PacketView::new(format, FramePosition::ZERO, 10, payload, 0);
    }
}
