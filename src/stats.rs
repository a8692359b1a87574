//! Read-only statistics view over the word list.

use std::{cmp::Ordering, collections::HashMap, fmt::Write as _};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Group, Word};

pub const UNGROUPED_LABEL: &str = "All Words";
pub const MISSING_GROUP_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Term,
    CreatedAt,
    PlayCount,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsQuery {
    pub search: String,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
}

impl Default for StatsQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort_field: SortField::CreatedAt,
            sort_direction: SortDirection::Desc,
        }
    }
}

impl StatsQuery {
    /// Clicking the active column flips direction; a new column starts
    /// descending.
    pub fn sort_by(&mut self, field: SortField) {
        if self.sort_field == field {
            self.sort_direction = match self.sort_direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
        } else {
            self.sort_field = field;
            self.sort_direction = SortDirection::Desc;
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WordStat {
    pub word_id: String,
    pub term: String,
    pub translation: String,
    pub group_name: String,
    pub created_at: DateTime<Utc>,
    pub play_count: u64,
}

pub fn group_label(group_id: Option<&str>, groups: &HashMap<&str, &str>) -> String {
    match group_id {
        None => UNGROUPED_LABEL.to_string(),
        Some(id) => groups
            .get(id)
            .map(|name| name.to_string())
            .unwrap_or_else(|| MISSING_GROUP_LABEL.to_string()),
    }
}

pub fn word_stats(words: &[Word], groups: &[Group], query: &StatsQuery) -> Vec<WordStat> {
    let names: HashMap<&str, &str> = groups
        .iter()
        .map(|g| (g.id.as_str(), g.name.as_str()))
        .collect();
    let needle = query.search.trim().to_lowercase();

    let mut matched: Vec<&Word> = words
        .iter()
        .filter(|w| {
            needle.is_empty()
                || w.term.to_lowercase().contains(&needle)
                || w.translation.to_lowercase().contains(&needle)
        })
        .collect();

    // Stable sort keeps list order among ties.
    matched.sort_by(|a, b| {
        let ordering = compare(a, b, query.sort_field);
        match query.sort_direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    matched
        .into_iter()
        .map(|w| WordStat {
            word_id: w.id.clone(),
            term: w.term.clone(),
            translation: w.translation.clone(),
            group_name: group_label(w.group_id.as_deref(), &names),
            created_at: w.created_at,
            play_count: w.play_count,
        })
        .collect()
}

fn compare(a: &Word, b: &Word, field: SortField) -> Ordering {
    match field {
        SortField::Term => a.term.to_lowercase().cmp(&b.term.to_lowercase()),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::PlayCount => a.play_count.cmp(&b.play_count),
    }
}

/// Plain-text table for terminal output.
pub fn render_table(rows: &[WordStat]) -> String {
    let term_width = rows
        .iter()
        .map(|r| r.term.chars().count())
        .chain(std::iter::once(4))
        .max()
        .unwrap_or(4);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<term_width$}  {:>5}  {:<16}  {:<14}  TRANSLATION",
        "TERM", "PLAYS", "ADDED", "GROUP"
    );
    for row in rows {
        let added = row
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M");
        let _ = writeln!(
            out,
            "{:<term_width$}  {:>5}  {:<16}  {:<14}  {}",
            row.term, row.play_count, added, row.group_name, row.translation
        );
    }
    out
}
