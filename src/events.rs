//! What the core tells the render boundary. The core only ever sends these, it never reads them.

use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    blocks::{Block, TxHash},
    monitor::MonitorState,
    network::Network,
    race::AttemptId,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    WindowChanged {
        network: Network,
        /// Newest first.
        blocks: Vec<Block>,
        displayed_block: Block,
        state: MonitorState,
    },
    LegCompleted {
        attempt: AttemptId,
        network: Network,
        hash: TxHash,
        duration_ms: u64,
    },
    LegFailed {
        attempt: AttemptId,
        network: Network,
        reason: String,
    },
    RaceCompared {
        attempt: AttemptId,
        /// `None` when both legs took exactly as long.
        faster_network: Option<Network>,
        speed_factor: f64,
    },
}

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// A render boundary that went away is not our problem, we keep monitoring.
pub fn emit(events: &EventSender, event: Event) {
    if let Err(err) = events.send(event) {
        debug!(event = ?err.0, "no event receiver, dropping event");
    }
}
