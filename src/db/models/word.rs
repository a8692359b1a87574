//! Word-related data models.
//!
//! - `Word`: a term/translation pair with its selection flag and play-count.
//! - `NewWord`: the shape produced by the batch parser before ids are assigned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: String,
    pub term: String,
    pub translation: String,
    pub selected: bool,
    /// Weak reference into the group set. `None` means ungrouped.
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub play_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewWord {
    pub term: String,
    pub translation: String,
}

impl NewWord {
    pub fn new(term: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            translation: translation.into(),
        }
    }
}

/// Which slice of the store a query looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GroupFilter {
    /// Every word regardless of group.
    #[default]
    All,
    Group(String),
}

impl GroupFilter {
    pub fn group_id(&self) -> Option<&str> {
        match self {
            GroupFilter::All => None,
            GroupFilter::Group(id) => Some(id.as_str()),
        }
    }
}

impl From<Option<String>> for GroupFilter {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(id) => GroupFilter::Group(id),
            None => GroupFilter::All,
        }
    }
}
