use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::db::{helpers::row_to_group, models::Group, Database};

impl Database {
    /// Create a group. The name is trimmed and must not be empty.
    pub async fn create_group(&self, name: String) -> Result<Group> {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("Group name must not be empty");
        }

        self.execute(move |conn| {
            let group = Group {
                id: Uuid::new_v4().to_string(),
                name,
            };
            conn.execute(
                "INSERT INTO groups (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![group.id, group.name, Utc::now().to_rfc3339()],
            )?;
            Ok(group)
        })
        .await
    }

    /// All groups in creation order.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name FROM groups ORDER BY created_at ASC, rowid ASC")?;
            let mut rows = stmt.query([])?;
            let mut groups = Vec::new();
            while let Some(row) = rows.next()? {
                groups.push(row_to_group(row)?);
            }
            Ok(groups)
        })
        .await
    }

    pub async fn find_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let name = name.trim().to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name FROM groups WHERE name = ?1 ORDER BY rowid ASC LIMIT 1",
            )?;
            let mut rows = stmt.query(params![name])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_group(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Delete a group and clear the group reference on every word that pointed
    /// at it. Words themselves are never removed.
    pub async fn delete_group(&self, group_id: &str) -> Result<()> {
        let group_id = group_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "UPDATE words SET group_id = NULL WHERE group_id = ?1",
                params![group_id],
            )?;

            let rows_affected = tx.execute("DELETE FROM groups WHERE id = ?1", params![group_id])?;
            if rows_affected == 0 {
                return Err(anyhow!("Group {group_id} not found"));
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }
}
