//! Pipeline stages and the read/advance contract.
//!
//! A mixing graph is a tree of stages. This module defines the contract every
//! stage implements ([`PipelineStage`]) and the two leaf producers:
//!
//! - [`PacketQueueProducerStage`]: serves discretely-pushed client packets
//! - [`RingBufferProducerStage`]: serves frames from a driver-written ring
//!
//! Both are invoked synchronously from a deadline-scheduled mix thread, so
//! `read` and `advance` never block and never allocate.

mod packet_queue;
mod ring_buffer;

pub use packet_queue::{
    PacketQueueProducerStage, PacketQueueWriter, PacketReleaseFn, UnderflowReporter,
};
pub use ring_buffer::{RingBufferProducerStage, SafeReadFrameFn};

use crate::clock::{ClockId, ClockSnapshots};
use crate::{Format, FramePosition, PacketView};

/// Per-invocation context for one mix job.
///
/// Supplies the clock snapshots a stage needs to translate between its
/// reference clock and the caller's mix timeline. Stages treat the context as
/// read-only input and never mutate it.
#[derive(Debug, Clone, Default)]
pub struct MixJobContext {
    clocks: ClockSnapshots,
}

impl MixJobContext {
    /// Creates a context carrying the given clock snapshots.
    #[must_use]
    pub fn new(clocks: ClockSnapshots) -> Self {
        Self { clocks }
    }

    /// The clock snapshots captured for this job.
    #[must_use]
    pub fn clocks(&self) -> &ClockSnapshots {
        &self.clocks
    }
}

/// One stage of a mixing pipeline.
///
/// A caller repeatedly invokes [`read`](PipelineStage::read), consumes the
/// returned packet (if any), then calls [`advance`](PipelineStage::advance)
/// to release frames it will never request again.
///
/// # Implementation Notes
///
/// - `read` returning `None` means "nothing available", not an error. Data
///   that has not arrived yet and data that expired both read as `None`; the
///   expired case additionally surfaces through stage-specific telemetry.
/// - `read` must be idempotent: identical arguments return equal results
///   until the next `advance`, push, or oracle movement.
/// - Both methods run on a deadline-scheduled thread; they must complete in
///   bounded time with no blocking and no heap allocation (cloning an `Arc`
///   payload reference is fine).
pub trait PipelineStage: Send {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// The format of this stage's frame timeline.
    fn format(&self) -> Format;

    /// Identity of the clock this stage's timeline is measured against.
    fn reference_clock(&self) -> ClockId;

    /// Returns the frames overlapping `[start_frame, start_frame +
    /// frame_count)` that this stage currently has available, truncated to a
    /// single contiguous run.
    fn read(
        &mut self,
        ctx: &MixJobContext,
        start_frame: FramePosition,
        frame_count: i64,
    ) -> Option<PacketView>;

    /// Releases all state needed to answer `read` for positions strictly
    /// before `frame`.
    ///
    /// Packets already returned and still referenced by the caller stay
    /// valid; only the stage's ability to serve earlier positions is given
    /// up.
    fn advance(&mut self, frame: FramePosition);
}

/// Marker for leaf stages that produce data with no upstream stage.
pub trait ProducerStage: PipelineStage {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context_has_no_clocks() {
        let ctx = MixJobContext::default();
        assert!(ctx.clocks().is_empty());
    }
}
