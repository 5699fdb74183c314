//! # mix-pipeline
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Real-time producer stages and clock substrate for an audio mixing pipeline.
//!
//! `mix-pipeline` turns heterogeneous audio sources (client-submitted packets,
//! driver-written ring buffers) into a timeline of frames that a mixing graph
//! can read at an arbitrary cadence, with frame-exact timing, bounded-latency
//! reads, and deterministic behavior under test via substitutable clocks.
//!
//! ## Quick Start
//!
//! ```
//! use mix_pipeline::clock::{Clock, SyntheticClockRealm};
//! use mix_pipeline::{
//!     Format, FramePosition, MixJobContext, PacketQueueProducerStage, PacketView, PipelineStage,
//! };
//! use std::sync::Arc;
//!
//! // Deterministic clocks for the whole pipeline.
//! let realm = SyntheticClockRealm::new();
//! let clock = realm.create_clock("source", 0, false, Default::default());
//!
//! let format = Format::new(48_000, 2);
//! let mut queue = PacketQueueProducerStage::new("client", format, clock.id());
//!
//! // The transport thread pushes packets...
//! let payload = Arc::new(vec![0.0f32; 480 * 2]);
//! queue.push(PacketView::new(format, FramePosition::from_frames(0), 480, payload, 0));
//!
//! // ...and the mix thread reads them back on its own cadence.
//! let ctx = MixJobContext::default();
//! let packet = queue.read(&ctx, FramePosition::from_frames(0), 480).unwrap();
//! assert_eq!(packet.length(), 480);
//! queue.advance(packet.end());
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! ```text
//! Transport Thread → push() → Packet Queue ─┐
//!                                           ├→ read()/advance() → Mix Thread
//! Driver          → writes  → Ring Buffer ──┘
//! ```
//!
//! - **Mix Thread**: Deadline-scheduled task that calls [`PipelineStage::read`]
//!   and [`PipelineStage::advance`]; these never block and never allocate.
//! - **Packet Queue**: Mutex-protected hand-off absorbs discretely-pushed
//!   packets from the transport thread.
//! - **Ring Buffer**: Position-addressed view over an externally-written
//!   circular region, bounded by a safe-read-frame oracle.
//!
//! Missing data is never an error: a read that cannot be served returns
//! nothing, and data that expired before it was read is reported through an
//! advisory underflow callback rather than an error path.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between frame/sample/time
// representations.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

pub mod clock;
mod error;
mod format;
mod frame;
mod packet;
mod stage;

pub use error::ClockError;
pub use format::Format;
pub use frame::FramePosition;
pub use packet::PacketView;
pub use stage::{
    MixJobContext, PacketQueueProducerStage, PacketQueueWriter, PacketReleaseFn, PipelineStage,
    ProducerStage, RingBufferProducerStage, SafeReadFrameFn, UnderflowReporter,
};
