use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{
    helpers::{row_to_word, WORD_COLUMNS},
    models::{GroupFilter, NewWord, Word},
    Database,
};

fn query_words(conn: &Connection, sql: &str, group_id: Option<String>) -> Result<Vec<Word>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params![group_id])?;
    let mut words = Vec::new();
    while let Some(row) = rows.next()? {
        words.push(row_to_word(row)?);
    }
    Ok(words)
}

impl Database {
    /// Insert a batch of parsed entries, all selected, in the given group.
    /// Returns the stored words in insertion order.
    pub async fn insert_words(
        &self,
        entries: Vec<NewWord>,
        group_id: Option<String>,
    ) -> Result<Vec<Word>> {
        self.execute(move |conn| {
            let now = Utc::now();
            let tx = conn.transaction()?;

            let mut next_seq: i64 =
                tx.query_row("SELECT COALESCE(MAX(seq), 0) FROM words", [], |row| {
                    row.get(0)
                })?;

            let mut inserted = Vec::with_capacity(entries.len());
            for entry in entries {
                next_seq += 1;
                let word = Word {
                    id: Uuid::new_v4().to_string(),
                    term: entry.term,
                    translation: entry.translation,
                    selected: true,
                    group_id: group_id.clone(),
                    created_at: now,
                    play_count: 0,
                };

                tx.execute(
                    "INSERT INTO words (id, term, translation, selected, group_id, created_at, play_count, seq)
                     VALUES (?1, ?2, ?3, 1, ?4, ?5, 0, ?6)",
                    params![
                        word.id,
                        word.term,
                        word.translation,
                        word.group_id,
                        word.created_at.to_rfc3339(),
                        next_seq,
                    ],
                )
                .with_context(|| format!("failed to insert word '{}'", word.term))?;

                inserted.push(word);
            }

            tx.commit().context("failed to commit word batch")?;
            Ok(inserted)
        })
        .await
    }

    pub async fn get_word(&self, word_id: &str) -> Result<Option<Word>> {
        let word_id = word_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {WORD_COLUMNS} FROM words WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![word_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_word(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// All words visible under the filter, oldest first.
    pub async fn list_words(&self, filter: GroupFilter) -> Result<Vec<Word>> {
        let group_id = filter.group_id().map(str::to_string);
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {WORD_COLUMNS} FROM words
                 WHERE (?1 IS NULL OR group_id = ?1)
                 ORDER BY seq ASC"
            );
            query_words(conn, &sql, group_id)
        })
        .await
    }

    /// Selected words under the filter, in list order. This is the snapshot a
    /// playback run freezes into its rotation.
    pub async fn get_selected(&self, filter: GroupFilter) -> Result<Vec<Word>> {
        let group_id = filter.group_id().map(str::to_string);
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {WORD_COLUMNS} FROM words
                 WHERE selected = 1 AND (?1 IS NULL OR group_id = ?1)
                 ORDER BY seq ASC"
            );
            query_words(conn, &sql, group_id)
        })
        .await
    }

    pub async fn set_selected(&self, word_id: &str, selected: bool) -> Result<()> {
        let word_id = word_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE words SET selected = ?1 WHERE id = ?2",
                params![selected as i64, word_id],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("Word {word_id} not found"));
            }
            Ok(())
        })
        .await
    }

    /// Select or deselect every word visible under the filter.
    pub async fn set_all_selected(&self, filter: GroupFilter, selected: bool) -> Result<usize> {
        let group_id = filter.group_id().map(str::to_string);
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE words SET selected = ?1 WHERE (?2 IS NULL OR group_id = ?2)",
                params![selected as i64, group_id],
            )?;
            Ok(rows_affected)
        })
        .await
    }

    pub async fn move_to_group(&self, word_id: &str, group_id: Option<String>) -> Result<()> {
        let word_id = word_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE words SET group_id = ?1 WHERE id = ?2",
                    params![group_id, word_id],
                )
                .context("failed to move word")?;
            if rows_affected == 0 {
                return Err(anyhow!("Word {word_id} not found"));
            }
            Ok(())
        })
        .await
    }

    /// Pull existing words into a group. Unknown ids are ignored.
    pub async fn import_words(&self, word_ids: Vec<String>, group_id: &str) -> Result<usize> {
        let group_id = group_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut moved = 0;
            for word_id in &word_ids {
                moved += tx
                    .execute(
                        "UPDATE words SET group_id = ?1 WHERE id = ?2",
                        params![group_id, word_id],
                    )
                    .context("failed to import word into group")?;
            }
            tx.commit()?;
            Ok(moved)
        })
        .await
    }

    /// Returns whether a word was actually removed.
    pub async fn delete_word(&self, word_id: &str) -> Result<bool> {
        let word_id = word_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute("DELETE FROM words WHERE id = ?1", params![word_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// Bump a word's play-count by one. A missing id is not an error: the word
    /// may have been deleted while a playback run still held it. Returns
    /// whether a row was updated.
    pub async fn increment_play_count(&self, word_id: &str) -> Result<bool> {
        let word_id = word_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE words SET play_count = play_count + 1 WHERE id = ?1",
                params![word_id],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn count_words(&self) -> Result<usize> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM words", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (Database, Vec<Word>) {
        let db = Database::open().unwrap();
        let words = db
            .insert_words(
                vec![
                    NewWord::new("Serendipity", "机缘凑巧"),
                    NewWord::new("Ephemeral", "转瞬即逝的"),
                    NewWord::new("Resilience", "韧性"),
                ],
                None,
            )
            .await
            .unwrap();
        (db, words)
    }

    #[tokio::test]
    async fn inserted_words_start_selected_with_zero_plays() {
        let (db, words) = seeded().await;
        assert_eq!(words.len(), 3);
        let listed = db.list_words(GroupFilter::All).await.unwrap();
        let terms: Vec<_> = listed.iter().map(|w| w.term.as_str()).collect();
        assert_eq!(terms, ["Serendipity", "Ephemeral", "Resilience"]);
        assert!(listed.iter().all(|w| w.selected && w.play_count == 0));
    }

    #[tokio::test]
    async fn selection_snapshot_skips_deselected_words() {
        let (db, words) = seeded().await;
        db.set_selected(&words[1].id, false).await.unwrap();

        let selected = db.get_selected(GroupFilter::All).await.unwrap();
        let ids: Vec<_> = selected.iter().map(|w| w.id.clone()).collect();
        assert_eq!(ids, vec![words[0].id.clone(), words[2].id.clone()]);
    }

    #[tokio::test]
    async fn increment_on_missing_word_reports_false() {
        let (db, words) = seeded().await;
        assert!(db.increment_play_count(&words[0].id).await.unwrap());
        assert!(db.delete_word(&words[0].id).await.unwrap());
        assert!(!db.increment_play_count(&words[0].id).await.unwrap());
        assert_eq!(db.count_words().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn set_all_selected_respects_group_filter() {
        let (db, words) = seeded().await;
        let group = db.create_group("Verbs".into()).await.unwrap();
        db.move_to_group(&words[2].id, Some(group.id.clone()))
            .await
            .unwrap();

        let changed = db
            .set_all_selected(GroupFilter::Group(group.id.clone()), false)
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let selected = db.get_selected(GroupFilter::All).await.unwrap();
        assert_eq!(selected.len(), 2);
        assert!(db
            .get_selected(GroupFilter::Group(group.id))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn import_moves_only_known_words() {
        let (db, words) = seeded().await;
        let group = db.create_group("Adjectives".into()).await.unwrap();
        let moved = db
            .import_words(
                vec![words[1].id.clone(), "missing".into()],
                &group.id,
            )
            .await
            .unwrap();
        assert_eq!(moved, 1);
        let in_group = db
            .list_words(GroupFilter::Group(group.id))
            .await
            .unwrap();
        assert_eq!(in_group.len(), 1);
        assert_eq!(in_group[0].term, "Ephemeral");
    }
}
