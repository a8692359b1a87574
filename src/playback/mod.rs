pub mod controller;
pub mod events;
pub mod renderer;
pub mod sequence;
pub mod speech;
pub mod state;
pub mod store;

pub use controller::{PlaybackController, PlaybackTimings, SETTLE_DELAY, TICK_INTERVAL};
pub use events::{BlockingReason, EventBus, PlaybackEvent, StopReason};
pub use renderer::{RenderEvent, RenderEventReceiver, RenderEventSender, UtteranceRenderer};
pub use sequence::{compile, Utterance, UtteranceUnit};
pub use speech::{voice_from_name, CommandVoice, ConsoleVoice, SpeechEngineHandle, Voice};
pub use state::{PlaybackSnapshot, PlaybackState, PlaybackStatus};
pub use store::{StoreFuture, WordStore};
