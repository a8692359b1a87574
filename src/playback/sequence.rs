//! Expands one word under the current settings into the ordered list of
//! utterances the renderer speaks.

use serde::Serialize;

use crate::{
    db::Word,
    settings::{PatternItem, PlaybackSettings},
};

pub const TERM_LANGUAGE: &str = "en-US";
pub const TRANSLATION_LANGUAGE: &str = "zh-CN";

/// Single letters leave an audible gap between utterances; spelling runs a
/// little faster than the configured rate to compensate.
pub const SPELL_RATE_FLOOR: f32 = 0.9;
pub const SPELL_RATE_MULTIPLIER: f32 = 1.1;

/// What the renderer needs to voice one chunk of text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub text: String,
    pub language: &'static str,
    pub rate: f32,
}

/// An utterance tagged with the pattern step it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceUnit {
    pub utterance: Utterance,
    pub item: PatternItem,
    /// Position of the owning step in the pattern.
    pub item_index: usize,
    /// Set on the first unit of each step. Its start is the attribution point
    /// for play-counts and the "now playing" marker.
    pub first_of_item: bool,
}

impl UtteranceUnit {
    /// True for the unit whose start should bump the word's play-count.
    pub fn starts_term(&self) -> bool {
        self.first_of_item && self.item == PatternItem::Term
    }
}

pub fn spell_rate(configured: f32) -> f32 {
    SPELL_RATE_FLOOR.max(configured * SPELL_RATE_MULTIPLIER)
}

/// Compile a word into utterance units, in pattern order. An empty pattern
/// yields an empty list; the caller decides what that means.
pub fn compile(word: &Word, settings: &PlaybackSettings) -> Vec<UtteranceUnit> {
    let rate = settings.playback_rate;
    let mut units = Vec::new();

    for (item_index, item) in settings.pattern.iter().copied().enumerate() {
        let step: Vec<Utterance> = match item {
            PatternItem::Term => vec![Utterance {
                text: word.term.clone(),
                language: TERM_LANGUAGE,
                rate,
            }],
            PatternItem::Translation => vec![Utterance {
                text: word.translation.clone(),
                language: TRANSLATION_LANGUAGE,
                rate,
            }],
            PatternItem::Spell => word
                .term
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| Utterance {
                    text: c.to_string(),
                    language: TERM_LANGUAGE,
                    rate: spell_rate(rate),
                })
                .collect(),
            PatternItem::Unknown => Vec::new(),
        };

        units.extend(
            step.into_iter()
                .enumerate()
                .map(|(position, utterance)| UtteranceUnit {
                    utterance,
                    item,
                    item_index,
                    first_of_item: position == 0,
                }),
        );
    }

    units
}
