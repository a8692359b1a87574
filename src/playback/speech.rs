//! Concrete renderers: a dedicated speech thread driving a blocking voice
//! backend.

use anyhow::{anyhow, bail, Context, Result};
use std::{
    io::Write,
    process::{Command, Stdio},
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Sender},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use super::{
    renderer::{RenderEvent, RenderEventSender, UtteranceRenderer},
    sequence::{Utterance, TRANSLATION_LANGUAGE},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A blocking text-to-speech backend. `speak` returns once the utterance has
/// finished, or early once `cancelled` reports true.
pub trait Voice: Send + 'static {
    fn speak(&mut self, utterance: &Utterance, cancelled: &dyn Fn() -> bool) -> Result<()>;
}

enum SpeechCommand {
    Render {
        utterances: Vec<Utterance>,
        events: RenderEventSender,
        generation: u64,
    },
    Shutdown,
}

/// Renderer backed by a speech thread. Requests queue up in order; bumping
/// the generation silences everything issued before the bump.
pub struct SpeechEngineHandle {
    tx: Mutex<Option<Sender<SpeechCommand>>>,
    generation: Arc<AtomicU64>,
}

impl SpeechEngineHandle {
    pub fn spawn<V: Voice>(voice: V) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<SpeechCommand>();
        let generation = Arc::new(AtomicU64::new(0));
        let thread_generation = Arc::clone(&generation);

        thread::Builder::new()
            .name("speech-engine".to_string())
            .spawn(move || {
                let mut voice = voice;
                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        SpeechCommand::Render {
                            utterances,
                            events,
                            generation,
                        } => {
                            let cancelled =
                                || thread_generation.load(Ordering::SeqCst) != generation;
                            speak_request(&mut voice, &utterances, &events, &cancelled);
                        }
                        SpeechCommand::Shutdown => break,
                    }
                }
                log_debug!("speech thread exiting");
            })
            .context("failed to spawn speech thread")?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            generation,
        })
    }

    fn sender(&self) -> Option<Sender<SpeechCommand>> {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn speak_request<V: Voice>(
    voice: &mut V,
    utterances: &[Utterance],
    events: &RenderEventSender,
    cancelled: &dyn Fn() -> bool,
) {
    if cancelled() {
        return;
    }

    for (index, utterance) in utterances.iter().enumerate() {
        if cancelled() {
            return;
        }
        let _ = events.send(RenderEvent::UnitStarted { index });

        if let Err(err) = voice.speak(utterance, cancelled) {
            if cancelled() {
                return;
            }
            log_warn!("speech failed on '{}': {err:#}", utterance.text);
            let _ = events.send(RenderEvent::Failed {
                index: Some(index),
                message: err.to_string(),
            });
            return;
        }
    }

    if !cancelled() {
        let _ = events.send(RenderEvent::Completed);
    }
}

impl UtteranceRenderer for SpeechEngineHandle {
    fn render(&self, utterances: Vec<Utterance>, events: RenderEventSender) {
        let generation = self.generation.load(Ordering::SeqCst);
        let command = SpeechCommand::Render {
            utterances,
            events: events.clone(),
            generation,
        };

        let sent = self
            .sender()
            .map(|tx| tx.send(command).is_ok())
            .unwrap_or(false);

        if !sent {
            log_error!("speech thread is gone; failing render request");
            let _ = events.send(RenderEvent::Failed {
                index: None,
                message: "speech thread is not running".into(),
            });
        }
    }

    fn cancel_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for SpeechEngineHandle {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            let _ = tx.send(SpeechCommand::Shutdown);
        }
    }
}

/// Prints each utterance and waits roughly as long as saying it would take.
pub struct ConsoleVoice {
    base: Duration,
    per_char: Duration,
}

impl ConsoleVoice {
    pub fn new() -> Self {
        Self {
            base: Duration::from_millis(350),
            per_char: Duration::from_millis(90),
        }
    }

    pub fn with_timing(base: Duration, per_char: Duration) -> Self {
        Self { base, per_char }
    }

    pub fn estimate(&self, utterance: &Utterance) -> Duration {
        let chars = utterance.text.chars().count() as u32;
        let spoken = self.base + self.per_char * chars;
        let rate = if utterance.rate > 0.0 { utterance.rate } else { 1.0 };
        Duration::from_millis((spoken.as_millis() as f32 / rate).round() as u64)
    }
}

impl Default for ConsoleVoice {
    fn default() -> Self {
        Self::new()
    }
}

impl Voice for ConsoleVoice {
    fn speak(&mut self, utterance: &Utterance, cancelled: &dyn Fn() -> bool) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(
            stdout,
            "  ♪ [{} x{:.2}] {}",
            utterance.language, utterance.rate, utterance.text
        )?;
        drop(stdout);

        let deadline = Instant::now() + self.estimate(utterance);
        while Instant::now() < deadline {
            if cancelled() {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        }
        Ok(())
    }
}

/// Shells out to an external speech program such as `espeak-ng`, invoked as
/// `<program> -v <voice> -s <words-per-minute> <text>`.
pub struct CommandVoice {
    program: String,
    base_wpm: f32,
}

impl CommandVoice {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_wpm: 175.0,
        }
    }

    fn voice_for(language: &str) -> &'static str {
        if language == TRANSLATION_LANGUAGE {
            "cmn"
        } else {
            "en-us"
        }
    }

    fn words_per_minute(&self, rate: f32) -> u32 {
        (self.base_wpm * rate).round().max(80.0) as u32
    }
}

impl Voice for CommandVoice {
    fn speak(&mut self, utterance: &Utterance, cancelled: &dyn Fn() -> bool) -> Result<()> {
        let mut child = Command::new(&self.program)
            .arg("-v")
            .arg(Self::voice_for(utterance.language))
            .arg("-s")
            .arg(self.words_per_minute(utterance.rate).to_string())
            .arg(&utterance.text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch speech program '{}'", self.program))?;

        loop {
            if cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(());
            }
            match child.try_wait()? {
                Some(status) if status.success() => return Ok(()),
                Some(status) => bail!("speech program exited with {status}"),
                None => thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

/// Pick a backend by name: `console`, or `command` (uses `program`).
pub fn voice_from_name(name: &str, program: &str) -> Result<Box<dyn Voice>> {
    match name {
        "console" => Ok(Box::new(ConsoleVoice::new())),
        "command" => Ok(Box::new(CommandVoice::new(program))),
        other => Err(anyhow!("unknown voice backend '{other}'")),
    }
}

impl Voice for Box<dyn Voice> {
    fn speak(&mut self, utterance: &Utterance, cancelled: &dyn Fn() -> bool) -> Result<()> {
        (**self).speak(utterance, cancelled)
    }
}
