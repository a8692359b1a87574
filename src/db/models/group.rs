use serde::{Deserialize, Serialize};

/// A named bucket of words. Words point at groups, never the other way round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
}
