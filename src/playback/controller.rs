use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::Utc;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    db::{GroupFilter, Word},
    error::PlaybackError,
    settings::SettingsStore,
};

use super::{
    events::{BlockingReason, EventBus, PlaybackEvent, StopReason},
    renderer::{RenderEvent, RenderEventReceiver, UtteranceRenderer},
    sequence::{compile, UtteranceUnit},
    state::{PlaybackSnapshot, PlaybackState, PlaybackStatus},
    store::WordStore,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct PlaybackTimings {
    /// Countdown granularity. One tick takes one second off the clock.
    pub tick_interval: Duration,
    /// Pause between one word finishing and the next one starting.
    pub settle_delay: Duration,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            tick_interval: TICK_INTERVAL,
            settle_delay: SETTLE_DELAY,
        }
    }
}

/// Everything the background tasks of a run need. Cloning is cheap.
#[derive(Clone)]
struct PlaybackCore {
    state: Arc<Mutex<PlaybackState>>,
    store: Arc<dyn WordStore>,
    renderer: Arc<dyn UtteranceRenderer>,
    settings: Arc<SettingsStore>,
    events: EventBus,
    timings: PlaybackTimings,
}

/// One word, compiled under the settings current at its boundary.
struct WordStep {
    word: Word,
    units: Vec<UtteranceUnit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordOutcome {
    Finished,
    Cancelled,
}

/// Task handles of the current run. Dropping the last controller handle tears
/// the run down.
struct RunTasks {
    core: PlaybackCore,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for RunTasks {
    fn drop(&mut self) {
        self.core.stop(StopReason::Teardown);
        let handles = std::mem::take(
            self.handles
                .get_mut()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for handle in handles {
            handle.abort();
        }
    }
}

/// Drives the drill loop: freezes a rotation, feeds one word at a time to the
/// renderer, attributes play-counts, and counts down the session clock.
#[derive(Clone)]
pub struct PlaybackController {
    core: PlaybackCore,
    tasks: Arc<RunTasks>,
}

impl PlaybackController {
    pub fn new(
        store: Arc<dyn WordStore>,
        renderer: Arc<dyn UtteranceRenderer>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self::with_timings(store, renderer, settings, PlaybackTimings::default())
    }

    pub fn with_timings(
        store: Arc<dyn WordStore>,
        renderer: Arc<dyn UtteranceRenderer>,
        settings: Arc<SettingsStore>,
        timings: PlaybackTimings,
    ) -> Self {
        let core = PlaybackCore {
            state: Arc::new(Mutex::new(PlaybackState::new())),
            store,
            renderer,
            settings,
            events: EventBus::new(EVENT_CAPACITY),
            timings,
        };

        Self {
            tasks: Arc::new(RunTasks {
                core: core.clone(),
                handles: Mutex::new(Vec::new()),
            }),
            core,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.core.events.subscribe()
    }

    pub fn get_snapshot(&self) -> PlaybackSnapshot {
        self.core.lock_state().snapshot()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.core.lock_state().status
    }

    /// Start a run over `selection`, in the order given. The rotation is a
    /// copy: later edits to the store do not reach a run already in flight.
    pub fn start(&self, selection: Vec<Word>) -> Result<PlaybackSnapshot, PlaybackError> {
        if selection.is_empty() {
            log_info!("start ignored: no words selected");
            return Err(PlaybackError::EmptySelection);
        }

        if self.core.lock_state().is_active() {
            return Err(PlaybackError::AlreadyPlaying);
        }

        let settings = self.core.settings.current();
        if !settings.has_playable_pattern() {
            log_warn!("start refused: playback pattern has nothing to say");
            self.core.events.emit(PlaybackEvent::BlockingCondition {
                reason: BlockingReason::EmptyPattern,
            });
            return Err(PlaybackError::EmptyPattern);
        }

        let run_id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        let rotation_len = selection.len();

        {
            let mut state = self.core.lock_state();
            if state.is_active() {
                return Err(PlaybackError::AlreadyPlaying);
            }
            state.begin_run(
                run_id.clone(),
                selection,
                settings.duration_secs(),
                Utc::now(),
                token.clone(),
            );
        }

        log_info!(
            "playback {} started: {} words, {} min, pattern {:?}",
            run_id,
            rotation_len,
            settings.duration_minutes,
            settings.pattern
        );

        let ticker = tokio::spawn(countdown_loop(
            self.core.clone(),
            run_id.clone(),
            token.clone(),
        ));
        let player = tokio::spawn(rotation_loop(self.core.clone(), run_id, token));

        {
            let mut handles = self.tasks.lock_handles();
            handles.retain(|handle| !handle.is_finished());
            handles.push(ticker);
            handles.push(player);
        }

        let snapshot = self.get_snapshot();
        self.core.events.emit(PlaybackEvent::StateChanged {
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// Load the current selection from the store and start on it.
    pub async fn start_selected(
        &self,
        filter: GroupFilter,
    ) -> Result<PlaybackSnapshot, PlaybackError> {
        let selection = self.core.store.get_selected(filter).await?;
        self.start(selection)
    }

    /// Stop playback. Idempotent and safe from any context, including from
    /// inside a renderer callback. Returns whether anything was running.
    pub fn stop(&self) -> bool {
        self.core.stop(StopReason::Requested)
    }

    /// Stop and wait for the run's background tasks to wind down.
    pub async fn shutdown(&self) {
        self.core.stop(StopReason::Requested);
        let handles = std::mem::take(&mut *self.tasks.lock_handles());
        for handle in handles {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    log_error!("playback task failed: {err}");
                }
            }
        }
    }

    /// Whether any countdown or rotation task is still alive.
    pub fn has_pending_tasks(&self) -> bool {
        self.tasks
            .lock_handles()
            .iter()
            .any(|handle| !handle.is_finished())
    }
}

impl RunTasks {
    fn lock_handles(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlaybackCore {
    fn lock_state(&self) -> MutexGuard<'_, PlaybackState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stop(&self, reason: StopReason) -> bool {
        let (token, run_id) = {
            let mut state = self.lock_state();
            if !state.is_active() {
                return false;
            }
            let run_id = state.run_id.clone();
            (state.reset(), run_id)
        };

        if let Some(token) = token {
            token.cancel();
        }
        self.renderer.cancel_all();

        log_info!(
            "playback {} stopped: {:?}",
            run_id.as_deref().unwrap_or("-"),
            reason
        );

        self.events.emit(PlaybackEvent::Stopped { reason });
        self.events.emit(PlaybackEvent::StateChanged {
            snapshot: self.lock_state().snapshot(),
        });
        true
    }

    fn is_running(&self, run_id: &str) -> bool {
        self.lock_state().is_running(run_id)
    }

    /// Pick the word at the cursor and compile it under the current settings.
    /// Returns `None` once the run is over.
    fn next_step(&self, run_id: &str) -> Option<WordStep> {
        let selected = {
            let mut state = self.lock_state();
            if !state.is_running(run_id) {
                return None;
            }
            state.select_current()
        };

        let Some((index, word)) = selected else {
            self.stop(StopReason::EmptyRotation);
            return None;
        };

        let settings = self.settings.current();
        if !settings.has_playable_pattern() {
            log_warn!("playback pattern emptied mid-run; halting");
            self.events.emit(PlaybackEvent::BlockingCondition {
                reason: BlockingReason::EmptyPattern,
            });
            self.stop(StopReason::Blocked);
            return None;
        }

        let units = compile(&word, &settings);
        log_debug!(
            "word {} '{}' -> {} utterances",
            index,
            word.term,
            units.len()
        );

        self.events.emit(PlaybackEvent::WordStarted {
            word_id: word.id.clone(),
            index,
        });

        Some(WordStep { word, units })
    }

    /// Hand one word to the renderer and wait for it to finish or for the run
    /// to be cancelled.
    async fn play_word(&self, step: &WordStep, token: &CancellationToken) -> WordOutcome {
        if step.units.is_empty() {
            log_warn!(
                "word '{}' has nothing to say under the current pattern; skipping",
                step.word.term
            );
            return WordOutcome::Finished;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let utterances = step.units.iter().map(|u| u.utterance.clone()).collect();
        self.renderer.render(utterances, tx);
        // A stop that landed between picking the word and handing it over
        // cancelled nothing; silence the request just issued.
        if token.is_cancelled() {
            self.renderer.cancel_all();
        }

        let mut counted = false;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.drain_started(step, &mut rx, &mut counted).await;
                    return WordOutcome::Cancelled;
                }
                event = rx.recv() => match event {
                    Some(RenderEvent::UnitStarted { index }) => {
                        self.attribute_start(step, index, &mut counted).await;
                    }
                    Some(RenderEvent::Completed) => return WordOutcome::Finished,
                    Some(RenderEvent::Failed { index, message }) => {
                        log_warn!(
                            "renderer failed on '{}' (unit {:?}): {}; moving on",
                            step.word.term,
                            index,
                            message
                        );
                        return WordOutcome::Finished;
                    }
                    None => {
                        log_warn!("renderer dropped '{}' without completing", step.word.term);
                        return WordOutcome::Finished;
                    }
                },
            }
        }
    }

    /// Starts that were already reported when the run was cancelled still
    /// count.
    async fn drain_started(
        &self,
        step: &WordStep,
        rx: &mut RenderEventReceiver,
        counted: &mut bool,
    ) {
        while let Ok(event) = rx.try_recv() {
            if let RenderEvent::UnitStarted { index } = event {
                self.attribute_start(step, index, counted).await;
            }
        }
    }

    /// At most one increment per word per pass, and only from the first unit
    /// of a term step.
    async fn attribute_start(&self, step: &WordStep, index: usize, counted: &mut bool) {
        if *counted {
            return;
        }
        let Some(unit) = step.units.get(index) else {
            log_warn!("renderer reported unknown unit {index} for '{}'", step.word.term);
            return;
        };
        if !unit.starts_term() {
            return;
        }
        *counted = true;

        match self.store.increment_play_count(&step.word.id).await {
            Ok(true) => {
                log_debug!("play-count +1 for '{}'", step.word.term);
                self.events.emit(PlaybackEvent::PlayCountIncremented {
                    word_id: step.word.id.clone(),
                });
            }
            Ok(false) => {
                log_info!(
                    "word '{}' no longer exists; play-count increment dropped",
                    step.word.term
                );
            }
            Err(err) => {
                log_error!("failed to record play for '{}': {err:#}", step.word.term);
            }
        }
    }

    /// Move past the word that just finished, if the run is still live.
    fn finish_word(&self, run_id: &str) -> bool {
        let mut state = self.lock_state();
        if !state.is_running(run_id) {
            return false;
        }
        state.advance_cursor();
        true
    }
}

/// Plays words back to back until the run is stopped. Each iteration is one
/// word boundary; nothing here recurses.
async fn rotation_loop(core: PlaybackCore, run_id: String, token: CancellationToken) {
    loop {
        let Some(step) = core.next_step(&run_id) else {
            break;
        };

        if core.play_word(&step, &token).await == WordOutcome::Cancelled {
            break;
        }

        if !core.finish_word(&run_id) {
            break;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = time::sleep(core.timings.settle_delay) => {}
        }
    }
    log_debug!("rotation loop for {} exited", run_id);
}

/// Takes one second off the clock per tick and stops the run at zero.
async fn countdown_loop(core: PlaybackCore, run_id: String, token: CancellationToken) {
    let period = core.timings.tick_interval;
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }

        let remaining = {
            let mut state = core.lock_state();
            if !state.is_running(&run_id) {
                break;
            }
            state.tick()
        };

        core.events.emit(PlaybackEvent::Tick {
            remaining_secs: remaining,
        });

        if remaining == 0 {
            log_info!("playback {} time is up", run_id);
            core.stop(StopReason::Expired);
            break;
        }
    }
    log_debug!("countdown for {} exited", run_id);
}
