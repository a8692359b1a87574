//! The contract between the playback loop and whatever turns text into sound.

use tokio::sync::mpsc;

use super::sequence::Utterance;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// Fired once per utterance, in order, just before its audio begins.
    UnitStarted { index: usize },
    /// Fired once after the last utterance ends. An empty request completes
    /// immediately.
    Completed,
    /// Something went wrong. Ends the request just like `Completed`.
    Failed { index: Option<usize>, message: String },
}

pub type RenderEventSender = mpsc::UnboundedSender<RenderEvent>;
pub type RenderEventReceiver = mpsc::UnboundedReceiver<RenderEvent>;

/// Anything that can voice a list of utterances.
///
/// Implementations own the lifetime of their in-flight audio. They must end
/// every request with exactly one `Completed` or `Failed` unless the request
/// was cancelled, and dropping the sender counts as completion. Events sent
/// after the receiver is gone are simply lost.
pub trait UtteranceRenderer: Send + Sync {
    fn render(&self, utterances: Vec<Utterance>, events: RenderEventSender);

    /// Silence everything playing or queued. Safe to call when idle.
    fn cancel_all(&self);
}
