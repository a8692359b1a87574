use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::db::Word;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Playing,
    /// Not reachable today: there is no pause operation.
    Paused,
    /// Not reachable today: a finished run collapses straight into `Idle`.
    Finished,
}

/// Runtime state of the loop. The rotation is frozen when a run starts and is
/// only ever touched by the controller.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub run_id: Option<String>,
    pub rotation: Vec<Word>,
    pub cursor: usize,
    pub current_word_id: Option<String>,
    pub remaining_secs: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub cancel_token: Option<CancellationToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub run_id: Option<String>,
    pub current_word_id: Option<String>,
    pub cursor: usize,
    pub rotation_len: usize,
    pub remaining_secs: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_run(
        &mut self,
        run_id: String,
        rotation: Vec<Word>,
        duration_secs: u64,
        started_at: DateTime<Utc>,
        cancel_token: CancellationToken,
    ) {
        *self = Self {
            status: PlaybackStatus::Playing,
            run_id: Some(run_id),
            rotation,
            cursor: 0,
            current_word_id: None,
            remaining_secs: Some(duration_secs),
            started_at: Some(started_at),
            cancel_token: Some(cancel_token),
        };
    }

    /// Whether `run_id` is still the live run. Every deferred continuation
    /// checks this before it touches anything.
    pub fn is_running(&self, run_id: &str) -> bool {
        self.status == PlaybackStatus::Playing && self.run_id.as_deref() == Some(run_id)
    }

    /// Whether there is anything for `stop` to tear down.
    pub fn is_active(&self) -> bool {
        self.status != PlaybackStatus::Idle || self.cancel_token.is_some()
    }

    /// Point the cursor at the word to play next, wrapping at the end of the
    /// rotation. Returns `None` when the rotation is empty.
    pub fn select_current(&mut self) -> Option<(usize, Word)> {
        if self.rotation.is_empty() {
            return None;
        }
        if self.cursor >= self.rotation.len() {
            self.cursor = 0;
        }
        let word = self.rotation[self.cursor].clone();
        self.current_word_id = Some(word.id.clone());
        Some((self.cursor, word))
    }

    pub fn advance_cursor(&mut self) {
        self.cursor += 1;
    }

    /// One countdown step. Returns the seconds left afterwards.
    pub fn tick(&mut self) -> u64 {
        let remaining = self.remaining_secs.unwrap_or(0).saturating_sub(1);
        self.remaining_secs = Some(remaining);
        remaining
    }

    /// Drop back to idle, handing back the run's cancel token.
    pub fn reset(&mut self) -> Option<CancellationToken> {
        let token = self.cancel_token.take();
        *self = Self::default();
        token
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            status: self.status,
            run_id: self.run_id.clone(),
            current_word_id: self.current_word_id.clone(),
            cursor: self.cursor,
            rotation_len: self.rotation.len(),
            remaining_secs: self.remaining_secs,
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(id: &str) -> Word {
        Word {
            id: id.into(),
            term: id.into(),
            translation: id.into(),
            selected: true,
            group_id: None,
            created_at: Utc::now(),
            play_count: 0,
        }
    }

    #[test]
    fn cursor_wraps_around_the_rotation() {
        let mut state = PlaybackState::new();
        state.begin_run(
            "run".into(),
            vec![word("a"), word("b")],
            60,
            Utc::now(),
            CancellationToken::new(),
        );

        let mut played = Vec::new();
        for _ in 0..5 {
            let (_, w) = state.select_current().unwrap();
            played.push(w.id);
            state.advance_cursor();
        }
        assert_eq!(played, ["a", "b", "a", "b", "a"]);
        assert_eq!(state.current_word_id.as_deref(), Some("a"));
    }

    #[test]
    fn empty_rotation_has_nothing_to_select() {
        let mut state = PlaybackState::new();
        state.begin_run("run".into(), Vec::new(), 60, Utc::now(), CancellationToken::new());
        assert!(state.select_current().is_none());
    }

    #[test]
    fn reset_returns_token_and_goes_idle() {
        let mut state = PlaybackState::new();
        state.begin_run("run".into(), vec![word("a")], 2, Utc::now(), CancellationToken::new());
        assert!(state.is_running("run"));
        assert!(!state.is_running("other"));
        assert_eq!(state.tick(), 1);
        assert_eq!(state.tick(), 0);
        assert_eq!(state.tick(), 0);

        assert!(state.reset().is_some());
        assert!(!state.is_active());
        assert_eq!(state.snapshot().remaining_secs, None);
        assert!(state.reset().is_none());
    }
}
