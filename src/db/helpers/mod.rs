use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::db::models::{Group, Word};

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub const WORD_COLUMNS: &str =
    "id, term, translation, selected, group_id, created_at, play_count";

pub fn row_to_word(row: &Row) -> Result<Word> {
    let created_at: String = row.get("created_at")?;
    let play_count: i64 = row.get("play_count")?;

    Ok(Word {
        id: row.get("id")?,
        term: row.get("term")?,
        translation: row.get("translation")?,
        selected: row.get::<_, i64>("selected")? != 0,
        group_id: row.get("group_id")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        play_count: to_u64(play_count, "play_count")?,
    })
}

pub fn row_to_group(row: &Row) -> Result<Group> {
    Ok(Group {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}
