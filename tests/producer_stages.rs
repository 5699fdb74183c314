//! Integration tests for mix-pipeline.
//!
//! These drive the producer stages the way the mixing graph does: repeated
//! `read`/`advance` calls at a steady cadence, with packets arriving from a
//! separate thread and time driven by a synthetic clock realm.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mix_pipeline::clock::{Clock, ClockId, SyntheticClockRealm};
use mix_pipeline::{
    Format, FramePosition, MixJobContext, PacketQueueProducerStage, PacketView, PipelineStage,
    RingBufferProducerStage,
};
use parking_lot::Mutex;

const FORMAT: Format = Format::new(48_000, 2);

fn test_clock_id(realm: &SyntheticClockRealm) -> ClockId {
    realm.create_clock("test", 0, false, Default::default()).id()
}

fn frames(n: i64) -> FramePosition {
    FramePosition::from_frames(n)
}

fn packet(start: i64, length: i64) -> PacketView {
    PacketView::new(
        FORMAT,
        frames(start),
        length,
        Arc::new(vec![0.0; (length as usize) * 2]),
        0,
    )
}

/// A mix thread consuming 48-frame jobs from a queue fed by another thread.
#[test]
fn packet_queue_cross_thread_session() {
    let realm = SyntheticClockRealm::new();
    let mut stage = PacketQueueProducerStage::new("client", FORMAT, test_clock_id(&realm));
    let writer = stage.writer();

    let released = Arc::new(AtomicUsize::new(0));
    let transport = {
        let released = Arc::clone(&released);
        std::thread::spawn(move || {
            for i in 0..10 {
                let released = Arc::clone(&released);
                writer.push_with_release(
                    packet(i * 48, 48),
                    Box::new(move || {
                        released.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }
        })
    };
    transport.join().unwrap();

    let ctx = MixJobContext::default();
    let mut next = frames(0);
    for _ in 0..10 {
        let got = stage.read(&ctx, next, 48).expect("packet should be queued");
        assert_eq!(got.start(), next);
        assert_eq!(got.length(), 48);
        next = got.end();
        stage.advance(next);
    }

    assert!(stage.is_empty());
    assert_eq!(released.load(Ordering::SeqCst), 10);
    assert_eq!(stage.underflow_count(), 0);
}

/// A consumer that falls behind sees one underflow per missed packet, then
/// resumes cleanly.
#[test]
fn packet_queue_underflow_after_stall() {
    let realm = SyntheticClockRealm::new();
    let mut stage = PacketQueueProducerStage::new("client", FORMAT, test_clock_id(&realm));

    let reported = Arc::new(Mutex::new(Vec::new()));
    let reports = Arc::clone(&reported);
    stage.set_underflow_reporter(Box::new(move |lateness| {
        reports.lock().push(lateness);
    }));

    for i in 0..4 {
        stage.push(packet(i * 48, 48));
    }

    // The mix timeline jumped to frame 100: packets [0,48) and [48,96) are
    // gone, packet [96,144) still overlaps.
    let ctx = MixJobContext::default();
    let got = stage.read(&ctx, frames(100), 48).unwrap();
    assert_eq!(got.start(), frames(100));
    assert_eq!(got.length(), 44);

    let reported = reported.lock();
    assert_eq!(
        reported.as_slice(),
        &[
            FORMAT.frames_to_duration(100.0),
            FORMAT.frames_to_duration(52.0),
        ]
    );
    assert_eq!(stage.underflow_count(), 2);
}

/// `clear()` releases everything in push order and leaves the queue empty.
#[test]
fn packet_queue_clear_releases_in_order() {
    let realm = SyntheticClockRealm::new();
    let stage = PacketQueueProducerStage::new("client", FORMAT, test_clock_id(&realm));

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..5 {
        let order = Arc::clone(&order);
        stage.push_with_release(
            packet(i * 48, 48),
            Box::new(move || {
                order.lock().push(i);
            }),
        );
    }

    stage.clear();
    assert!(stage.is_empty());
    assert_eq!(order.lock().as_slice(), &[0, 1, 2, 3, 4]);
}

struct RingHarness {
    stage: RingBufferProducerStage,
    safe_read_frame: Arc<AtomicI64>,
}

/// 48 kHz stereo ring holding 480 frames, oracle starting at -1.
fn ring_harness() -> RingHarness {
    let realm = SyntheticClockRealm::new();
    let safe_read_frame = Arc::new(AtomicI64::new(-1));
    let oracle = Arc::clone(&safe_read_frame);
    let stage = RingBufferProducerStage::new(
        "driver",
        FORMAT,
        test_clock_id(&realm),
        Arc::new(vec![0.0; 480 * 2]),
        480,
        Box::new(move || oracle.load(Ordering::Acquire)),
    );
    RingHarness {
        stage,
        safe_read_frame,
    }
}

#[test]
fn ring_buffer_edge_cases() {
    let mut h = ring_harness();
    let ctx = MixJobContext::default();

    // Nothing written yet.
    assert!(h.stage.read(&ctx, frames(0), 1).is_none());

    // Fully overwritten: oldest available is 959 - 480 + 1 = 480.
    h.safe_read_frame.store(959, Ordering::Release);
    assert!(h.stage.read(&ctx, frames(0), 480).is_none());

    // Written prefix only.
    h.safe_read_frame.store(47, Ordering::Release);
    let got = h.stage.read(&ctx, frames(0), 48).unwrap();
    assert_eq!((got.start(), got.length()), (frames(0), 48));
    let got = h.stage.read(&ctx, frames(0), 96).unwrap();
    assert_eq!((got.start(), got.length()), (frames(0), 48));

    // Expired prefix skipped.
    h.safe_read_frame.store(527, Ordering::Release);
    let got = h.stage.read(&ctx, frames(0), 96).unwrap();
    assert_eq!((got.start(), got.length()), (frames(48), 48));
}

#[test]
fn ring_buffer_wrap_requires_second_read() {
    let mut h = ring_harness();
    let ctx = MixJobContext::default();
    h.safe_read_frame.store(527, Ordering::Release);

    let first = h.stage.read(&ctx, frames(432), 96).unwrap();
    assert_eq!((first.start(), first.length()), (frames(432), 48));
    // The truncated packet ends exactly at the wrap boundary.
    assert_eq!(first.end(), frames(480));

    let second = h.stage.read(&ctx, frames(480), 48).unwrap();
    assert_eq!((second.start(), second.length()), (frames(480), 48));
}

#[test]
fn ring_buffer_negative_positions() {
    let mut h = ring_harness();
    let ctx = MixJobContext::default();

    // Pre-roll data entirely in negative positions.
    h.safe_read_frame.store(-481, Ordering::Release);
    let got = h.stage.read(&ctx, frames(-500), 10).unwrap();
    assert_eq!((got.start(), got.length()), (frames(-500), 10));
}

/// The mix loop reads at a steady cadence while the oracle advances, as a
/// driver would during capture.
#[test]
fn ring_buffer_steady_consumption() {
    let mut h = ring_harness();
    let ctx = MixJobContext::default();

    let mut next = 0i64;
    for job in 1..=20 {
        h.safe_read_frame.store(job * 48 - 1, Ordering::Release);
        let mut remaining = 48;
        while remaining > 0 {
            let got = h.stage.read(&ctx, frames(next), remaining).unwrap();
            assert_eq!(got.start(), frames(next));
            next += got.length();
            remaining -= got.length();
            h.stage.advance(frames(next));
        }
    }
    assert_eq!(next, 20 * 48);
}

/// Producer stages keep serving a timeline that a synthetic realm drives,
/// with all clocks observing the same instants.
#[test]
fn synthetic_realm_drives_deterministic_timeline() {
    let realm = SyntheticClockRealm::new();
    let client_clock = realm.create_clock("client", 1, false, Default::default());
    let driver_clock = realm.create_clock("driver", 2, false, Default::default());

    let mut snapshots = mix_pipeline::clock::ClockSnapshots::default();
    realm.advance_by(Duration::from_millis(10));
    snapshots.insert(client_clock.snapshot().unwrap());
    snapshots.insert(driver_clock.snapshot().unwrap());
    let ctx = MixJobContext::new(snapshots);

    // Both snapshots observed the same realm instant.
    let a = ctx.clocks().get(client_clock.id()).unwrap();
    let b = ctx.clocks().get(driver_clock.id()).unwrap();
    assert_eq!(a.now, b.now);

    let mut stage = PacketQueueProducerStage::new("client", FORMAT, client_clock.id());
    stage.push(packet(0, 48));
    let got = stage.read(&ctx, frames(0), 48).unwrap();
    assert_eq!(got.length(), 48);
}

/// Packets returned before an `advance` stay valid afterwards.
#[test]
fn advance_does_not_invalidate_returned_packets() {
    let realm = SyntheticClockRealm::new();
    let mut stage = PacketQueueProducerStage::new("client", FORMAT, test_clock_id(&realm));

    let payload: Vec<f32> = (0..96).map(|i| i as f32).collect();
    stage.push(PacketView::new(FORMAT, frames(0), 48, Arc::new(payload), 0));

    let ctx = MixJobContext::default();
    let got = stage.read(&ctx, frames(0), 48).unwrap();
    stage.advance(frames(48));
    assert!(stage.is_empty());

    // The view still references its payload.
    assert_eq!(got.samples()[0], 0.0);
    assert_eq!(got.samples()[95], 95.0);
}
