use serde::Serialize;
use tokio::sync::broadcast;

use super::state::PlaybackSnapshot;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Someone called `stop`.
    Requested,
    /// The countdown reached zero.
    Expired,
    /// The rotation had no words in it.
    EmptyRotation,
    /// A configuration problem halted the loop; see `BlockingReason`.
    Blocked,
    /// The controller was dropped while playing.
    Teardown,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BlockingReason {
    EmptyPattern,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlaybackEvent {
    StateChanged { snapshot: PlaybackSnapshot },
    Tick { remaining_secs: u64 },
    WordStarted { word_id: String, index: usize },
    PlayCountIncremented { word_id: String },
    BlockingCondition { reason: BlockingReason },
    Stopped { reason: StopReason },
}

/// Fan-out of playback events. Sending with nobody listening is fine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlaybackEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: PlaybackEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.tx.subscribe()
    }
}
