use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::Path,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

pub const MIN_PLAYBACK_RATE: f32 = 0.5;
pub const MAX_PLAYBACK_RATE: f32 = 1.2;
pub const DURATION_PRESETS_MINUTES: [u32; 6] = [1, 5, 10, 15, 30, 60];

/// One step of the per-word recipe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PatternItem {
    #[serde(alias = "en", alias = "english")]
    Term,
    #[serde(alias = "zh", alias = "chinese")]
    Translation,
    #[serde(alias = "spelled-out", alias = "spelledOut", alias = "spelled")]
    Spell,
    /// Anything a newer settings file names that this build does not know.
    /// Compiles to nothing.
    #[serde(other)]
    Unknown,
}

impl PatternItem {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "term" | "en" | "english" => Some(PatternItem::Term),
            "translation" | "zh" | "chinese" => Some(PatternItem::Translation),
            "spell" | "spelled-out" | "spelled" => Some(PatternItem::Spell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternItem::Term => "term",
            PatternItem::Translation => "translation",
            PatternItem::Spell => "spell",
            PatternItem::Unknown => "unknown",
        }
    }
}

pub fn default_pattern() -> Vec<PatternItem> {
    vec![
        PatternItem::Term,
        PatternItem::Translation,
        PatternItem::Term,
        PatternItem::Term,
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackSettings {
    pub duration_minutes: u32,
    pub playback_rate: f32,
    pub pattern: Vec<PatternItem>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            duration_minutes: 5,
            playback_rate: 1.0,
            pattern: default_pattern(),
        }
    }
}

impl PlaybackSettings {
    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    /// Whether the pattern has at least one step this build knows how to say.
    pub fn has_playable_pattern(&self) -> bool {
        self.pattern.iter().any(|item| *item != PatternItem::Unknown)
    }

    /// Clamp the rate and reject durations outside the preset list.
    pub fn validated(mut self) -> Result<Self> {
        if !DURATION_PRESETS_MINUTES.contains(&self.duration_minutes) {
            bail!(
                "duration {} min is not one of {:?}",
                self.duration_minutes,
                DURATION_PRESETS_MINUTES
            );
        }
        self.playback_rate = clamp_rate(self.playback_rate);
        Ok(self)
    }
}

fn clamp_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        return 1.0;
    }
    rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}

/// Live playback settings shared between whoever edits them and the playback
/// loop, which reads them once per word boundary.
pub struct SettingsStore {
    data: RwLock<PlaybackSettings>,
}

impl SettingsStore {
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            data: RwLock::new(settings),
        }
    }

    /// Seed from a JSON file if one is given. The file is only ever read; an
    /// unreadable or invalid file falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::new(PlaybackSettings::default()));
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let settings = match serde_json::from_str::<PlaybackSettings>(&contents)
            .map_err(anyhow::Error::from)
            .and_then(PlaybackSettings::validated)
        {
            Ok(settings) => settings,
            Err(err) => {
                warn!(
                    "Ignoring settings in {}: {err}. Using defaults.",
                    path.display()
                );
                PlaybackSettings::default()
            }
        };

        Ok(Self::new(settings))
    }

    pub fn current(&self) -> PlaybackSettings {
        self.read().clone()
    }

    pub fn replace(&self, settings: PlaybackSettings) -> Result<()> {
        let settings = settings.validated()?;
        *self.write() = settings;
        Ok(())
    }

    pub fn set_playback_rate(&self, rate: f32) -> f32 {
        let rate = clamp_rate(rate);
        self.write().playback_rate = rate;
        rate
    }

    pub fn set_duration_minutes(&self, minutes: u32) -> Result<()> {
        if !DURATION_PRESETS_MINUTES.contains(&minutes) {
            bail!(
                "duration {minutes} min is not one of {:?}",
                DURATION_PRESETS_MINUTES
            );
        }
        self.write().duration_minutes = minutes;
        Ok(())
    }

    pub fn set_pattern(&self, pattern: Vec<PatternItem>) {
        self.write().pattern = pattern;
    }

    pub fn push_pattern_item(&self, item: PatternItem) {
        self.write().pattern.push(item);
    }

    pub fn remove_pattern_item(&self, index: usize) -> Result<PatternItem> {
        let mut guard = self.write();
        if index >= guard.pattern.len() {
            bail!(
                "pattern index {index} out of range (len {})",
                guard.pattern.len()
            );
        }
        Ok(guard.pattern.remove(index))
    }

    pub fn reset_pattern(&self) {
        self.write().pattern = default_pattern();
    }

    fn read(&self) -> RwLockReadGuard<'_, PlaybackSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PlaybackSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(PlaybackSettings::default())
    }
}
