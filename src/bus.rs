//! In-process frame fan-out.
//!
//! Every ingestion source submits decoded frames here and every consumer
//! (dispatcher, reporter, loggers) drains its own subscription at its own
//! pace. Backpressure discipline: drop-oldest. A subscriber that stops
//! draining loses its oldest frames (surfaced as a lag error it should log)
//! rather than ever stalling ingestion from the serial or network sources.
//! Within a single source, delivery preserves arrival order.

use crate::frame::Frame;
use tokio::sync::broadcast;
use tracing::debug;

/// Sender half of the frame bus. Cheap to clone; one per ingestion source.
pub type FrameBus = broadcast::Sender<Frame>;

/// Subscription handle with its own bounded queue. Dropping it unregisters.
pub type FrameSub = broadcast::Receiver<Frame>;

/// Create a fan-out bus whose per-subscriber queues hold `capacity` frames.
pub fn create_bus(capacity: usize) -> FrameBus {
    let (tx, _) = broadcast::channel(capacity);
    tx
}

/// Submit a frame to every current subscriber. A bus with no subscribers
/// quietly discards, which only happens during startup and shutdown.
pub fn submit(bus: &FrameBus, frame: Frame) {
    if bus.send(frame).is_err() {
        debug!("frame dropped: no subscribers");
    }
}
