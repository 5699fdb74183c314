//! Producer stage fed by discretely-pushed packets.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{MixJobContext, PipelineStage, ProducerStage};
use crate::clock::ClockId;
use crate::{Format, FramePosition, PacketView};

/// Callback fired exactly once when a pushed packet is fully consumed or
/// cleared, letting the pusher reclaim or recycle the payload.
///
/// Runs with the queue lock released, so it may push or clear through a
/// [`PacketQueueWriter`].
pub type PacketReleaseFn = Box<dyn FnOnce() + Send>;

/// Advisory callback invoked when a read requests frames that expired before
/// they were served. The duration estimates how late the missing frames were.
///
/// Invoked synchronously inside `read` after the queue lock is released; must
/// not block.
pub type UnderflowReporter = Box<dyn Fn(Duration) + Send>;

/// A queued packet that owns its release callback.
///
/// The callback fires from `Drop`, so a packet is released exactly once no
/// matter which path consumes it: read-side expiry, `advance`, or `clear`.
struct PendingPacket {
    view: PacketView,
    on_release: Option<PacketReleaseFn>,
}

impl Drop for PendingPacket {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

type SharedQueue = Arc<Mutex<VecDeque<PendingPacket>>>;

/// Empties the queue, dropping the packets only after the guard is released
/// so their release callbacks may re-enter the queue.
fn drain_queue(queue: &SharedQueue) {
    let drained = std::mem::take(&mut *queue.lock());
    drop(drained);
}

/// A producer stage that buffers discretely-pushed packets in arrival order
/// and serves them back on the mix thread's cadence.
///
/// Packets are expected, but not required, to arrive in non-decreasing start
/// order; the stage does not sort. A caller pushing out-of-order packets gets
/// out-of-order service.
///
/// # Thread Safety
///
/// The pending queue is a mutex-protected deque so the transport thread can
/// push while the mix thread reads. Any `push` that completes before a `read`
/// call begins is visible to that read. Obtain a [`PacketQueueWriter`] for
/// the producing thread; `read`/`advance` stay with the stage's owner.
///
/// # Example
///
/// ```
/// use mix_pipeline::{
///     Format, FramePosition, MixJobContext, PacketQueueProducerStage, PacketView, PipelineStage,
/// };
/// use std::sync::Arc;
///
/// let format = Format::new(48_000, 1);
/// let realm = mix_pipeline::clock::SyntheticClockRealm::new();
/// let clock = realm.create_clock("src", 0, false, Default::default());
/// let clock_id = mix_pipeline::clock::Clock::id(&*clock);
/// let mut stage = PacketQueueProducerStage::new("client", format, clock_id);
///
/// stage.push(PacketView::new(
///     format,
///     FramePosition::from_frames(0),
///     100,
///     Arc::new(vec![0.0; 100]),
///     0,
/// ));
///
/// let ctx = MixJobContext::default();
/// let packet = stage.read(&ctx, FramePosition::from_frames(40), 30).unwrap();
/// assert_eq!(packet.start(), FramePosition::from_frames(40));
/// assert_eq!(packet.length(), 30);
/// ```
pub struct PacketQueueProducerStage {
    name: String,
    format: Format,
    reference_clock: ClockId,
    queue: SharedQueue,
    underflow_reporter: Option<UnderflowReporter>,
    underflow_count: u64,
}

impl PacketQueueProducerStage {
    /// Creates an empty queue stage.
    #[must_use]
    pub fn new(name: &str, format: Format, reference_clock: ClockId) -> Self {
        Self {
            name: name.to_string(),
            format,
            reference_clock,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            underflow_reporter: None,
            underflow_count: 0,
        }
    }

    /// Returns a cloneable handle for the thread that delivers packets.
    #[must_use]
    pub fn writer(&self) -> PacketQueueWriter {
        PacketQueueWriter {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Appends a packet to the tail of the queue.
    pub fn push(&self, packet: PacketView) {
        self.push_inner(packet, None);
    }

    /// Appends a packet whose `on_release` callback fires exactly once when
    /// the packet is fully consumed or cleared.
    pub fn push_with_release(&self, packet: PacketView, on_release: PacketReleaseFn) {
        self.push_inner(packet, Some(on_release));
    }

    fn push_inner(&self, packet: PacketView, on_release: Option<PacketReleaseFn>) {
        self.queue.lock().push_back(PendingPacket {
            view: packet,
            on_release,
        });
    }

    /// Drops all pending packets immediately, firing each release callback in
    /// queue order. Used when a source is reset or disconnected.
    pub fn clear(&self) {
        drain_queue(&self.queue);
    }

    /// Returns `true` iff no packets are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Registers a callback invoked whenever a read requests frames that are
    /// no longer in any queued packet.
    ///
    /// The reported duration is the number of frames by which the request
    /// preceded the missing packet, converted via the stage's frame rate.
    /// This is advisory telemetry, not a control-flow signal.
    pub fn set_underflow_reporter(&mut self, reporter: UnderflowReporter) {
        self.underflow_reporter = Some(reporter);
    }

    /// Total underflows observed since construction.
    #[must_use]
    pub fn underflow_count(&self) -> u64 {
        self.underflow_count
    }
}

impl PipelineStage for PacketQueueProducerStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Format {
        self.format
    }

    fn reference_clock(&self) -> ClockId {
        self.reference_clock
    }

    /// Walks the queue from the front. Packets ending at or before
    /// `start_frame` are expired: they are popped and released without being
    /// returned, each reported as one underflow. The first packet overlapping
    /// the request yields a view truncated to the overlap; frames beyond that
    /// packet are not pulled from the next packet even if contiguous. A front
    /// packet starting strictly after `start_frame` has simply not been
    /// reached yet, so nothing is returned and no underflow is reported.
    fn read(
        &mut self,
        _ctx: &MixJobContext,
        start_frame: FramePosition,
        frame_count: i64,
    ) -> Option<PacketView> {
        // Expired packets are popped under the lock but dropped and reported
        // after it is released, so release callbacks and the underflow
        // reporter may re-enter the queue.
        let mut expired = Vec::new();
        let mut queue = self.queue.lock();
        while let Some(front) = queue.front() {
            if front.view.end() > start_frame {
                break;
            }
            if let Some(packet) = queue.pop_front() {
                expired.push(packet);
            }
        }

        let result = match queue.front() {
            // Not yet arrived, not missed.
            Some(front) if front.view.start() > start_frame => None,
            Some(front) => front.view.intersection(start_frame, frame_count),
            None => None,
        };
        drop(queue);

        for packet in expired {
            // The entire packet is in the past: it was available once and the
            // caller never got it.
            let lateness = self
                .format
                .frames_to_duration((start_frame - packet.view.start()).to_frames_f64());
            self.underflow_count += 1;
            tracing::warn!(
                stage = %self.name,
                count = self.underflow_count,
                ?lateness,
                "packet queue underflow"
            );
            if let Some(reporter) = &self.underflow_reporter {
                reporter(lateness);
            }
        }
        result
    }

    /// Pops and releases every packet ending at or before `frame`. This is
    /// the caller voluntarily skipping ahead, so no underflow is reported.
    fn advance(&mut self, frame: FramePosition) {
        let mut released = Vec::new();
        let mut queue = self.queue.lock();
        while let Some(front) = queue.front() {
            if front.view.end() > frame {
                break;
            }
            if let Some(packet) = queue.pop_front() {
                released.push(packet);
            }
        }
        drop(queue);
        // Release callbacks fire here, outside the lock.
        drop(released);
    }
}

impl ProducerStage for PacketQueueProducerStage {}

/// Cloneable producer-side handle to a [`PacketQueueProducerStage`].
///
/// Lets the transport thread push and clear packets while the mix thread owns
/// the stage itself.
#[derive(Clone)]
pub struct PacketQueueWriter {
    queue: SharedQueue,
}

impl PacketQueueWriter {
    /// Appends a packet to the tail of the queue.
    pub fn push(&self, packet: PacketView) {
        self.queue.lock().push_back(PendingPacket {
            view: packet,
            on_release: None,
        });
    }

    /// Appends a packet with a release callback.
    pub fn push_with_release(&self, packet: PacketView, on_release: PacketReleaseFn) {
        self.queue.lock().push_back(PendingPacket {
            view: packet,
            on_release: Some(on_release),
        });
    }

    /// Drops all pending packets, firing release callbacks in queue order.
    pub fn clear(&self) {
        drain_queue(&self.queue);
    }

    /// Returns `true` iff no packets are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
