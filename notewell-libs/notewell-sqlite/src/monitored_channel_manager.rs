use crate::schemas::monitored_channel::MonitoredChannel;
use crate::{SqliteManager, SqliteManagerError};
use rusqlite::{params, OptionalExtension, Row};

fn channel_from_row(row: &Row) -> Result<MonitoredChannel, rusqlite::Error> {
    let tags_json: String = row.get(6)?;
    let dataset_tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    Ok(MonitoredChannel {
        id: row.get(0)?,
        community_server_id: row.get(1)?,
        channel_id: row.get(2)?,
        enabled: row.get::<_, i64>(3)? != 0,
        similarity_threshold: row.get(4)?,
        previously_seen_autopublish_threshold: row.get(5)?,
        dataset_tags,
        previously_seen_autorequest_threshold: row.get(7)?,
        updated_by: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const CHANNEL_COLUMNS: &str = "id, community_server_id, channel_id, enabled, similarity_threshold, \
                               previously_seen_autopublish_threshold, dataset_tags, \
                               previously_seen_autorequest_threshold, updated_by, created_at, updated_at";

/// Partial update for a monitored channel; `None` fields are left untouched.
/// The threshold overrides use a double Option so that an explicit null can
/// clear the override back to "inherit community default".
#[derive(Debug, Default, Clone)]
pub struct MonitoredChannelUpdate {
    pub enabled: Option<bool>,
    pub similarity_threshold: Option<f32>,
    pub dataset_tags: Option<Vec<String>>,
    pub previously_seen_autopublish_threshold: Option<Option<f32>>,
    pub previously_seen_autorequest_threshold: Option<Option<f32>>,
    pub updated_by: Option<String>,
}

impl SqliteManager {
    pub fn add_monitored_channel(&self, channel: &MonitoredChannel) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM monitored_channels WHERE channel_id = ?1",
                params![channel.channel_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(SqliteManagerError::ChannelAlreadyMonitored(channel.channel_id.clone()));
        }

        conn.execute(
            "INSERT INTO monitored_channels \
             (id, community_server_id, channel_id, enabled, similarity_threshold, dataset_tags, \
              previously_seen_autopublish_threshold, previously_seen_autorequest_threshold, updated_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                channel.id,
                channel.community_server_id,
                channel.channel_id,
                channel.enabled as i64,
                channel.similarity_threshold,
                serde_json::to_string(&channel.dataset_tags)?,
                channel.previously_seen_autopublish_threshold,
                channel.previously_seen_autorequest_threshold,
                channel.updated_by,
                channel.created_at,
                channel.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_monitored_channel(&self, id: &str) -> Result<Option<MonitoredChannel>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM monitored_channels WHERE id = ?1",
            CHANNEL_COLUMNS
        ))?;
        Ok(stmt.query_row(params![id], channel_from_row).optional()?)
    }

    pub fn get_monitored_channel_by_channel_id(
        &self,
        community_server_id: &str,
        channel_id: &str,
    ) -> Result<Option<MonitoredChannel>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM monitored_channels WHERE community_server_id = ?1 AND channel_id = ?2",
            CHANNEL_COLUMNS
        ))?;
        Ok(stmt
            .query_row(params![community_server_id, channel_id], channel_from_row)
            .optional()?)
    }

    /// Paged listing for one community, optionally filtered by enabled state.
    /// Returns the page plus the unpaged total for `meta.count`.
    pub fn list_monitored_channels(
        &self,
        community_server_id: &str,
        enabled: Option<bool>,
        page_number: usize,
        page_size: usize,
    ) -> Result<(Vec<MonitoredChannel>, usize), SqliteManagerError> {
        let conn = self.get_connection()?;

        let (count_sql, list_sql) = match enabled {
            Some(_) => (
                "SELECT COUNT(*) FROM monitored_channels WHERE community_server_id = ?1 AND enabled = ?2",
                format!(
                    "SELECT {} FROM monitored_channels WHERE community_server_id = ?1 AND enabled = ?2 \
                     ORDER BY created_at, id LIMIT ?3 OFFSET ?4",
                    CHANNEL_COLUMNS
                ),
            ),
            None => (
                "SELECT COUNT(*) FROM monitored_channels WHERE community_server_id = ?1",
                format!(
                    "SELECT {} FROM monitored_channels WHERE community_server_id = ?1 \
                     ORDER BY created_at, id LIMIT ?2 OFFSET ?3",
                    CHANNEL_COLUMNS
                ),
            ),
        };

        let offset = page_number.saturating_sub(1) * page_size;
        let (total, channels) = match enabled {
            Some(flag) => {
                let total: i64 =
                    conn.query_row(count_sql, params![community_server_id, flag as i64], |row| row.get(0))?;
                let mut stmt = conn.prepare(&list_sql)?;
                let rows = stmt.query_map(
                    params![community_server_id, flag as i64, page_size as i64, offset as i64],
                    channel_from_row,
                )?;
                (total, rows.collect::<Result<Vec<_>, _>>()?)
            }
            None => {
                let total: i64 = conn.query_row(count_sql, params![community_server_id], |row| row.get(0))?;
                let mut stmt = conn.prepare(&list_sql)?;
                let rows = stmt.query_map(
                    params![community_server_id, page_size as i64, offset as i64],
                    channel_from_row,
                )?;
                (total, rows.collect::<Result<Vec<_>, _>>()?)
            }
        };

        Ok((channels, total as usize))
    }

    pub fn update_monitored_channel(
        &self,
        id: &str,
        update: &MonitoredChannelUpdate,
    ) -> Result<MonitoredChannel, SqliteManagerError> {
        let existing = self
            .get_monitored_channel(id)?
            .ok_or_else(|| SqliteManagerError::MonitoredChannelNotFound(id.to_string()))?;

        let enabled = update.enabled.unwrap_or(existing.enabled);
        let similarity_threshold = update.similarity_threshold.unwrap_or(existing.similarity_threshold);
        let dataset_tags = update.dataset_tags.clone().unwrap_or(existing.dataset_tags);
        let autopublish = update
            .previously_seen_autopublish_threshold
            .unwrap_or(existing.previously_seen_autopublish_threshold);
        let autorequest = update
            .previously_seen_autorequest_threshold
            .unwrap_or(existing.previously_seen_autorequest_threshold);
        let updated_by = update.updated_by.clone().or(existing.updated_by);

        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE monitored_channels SET enabled = ?1, similarity_threshold = ?2, dataset_tags = ?3, \
             previously_seen_autopublish_threshold = ?4, previously_seen_autorequest_threshold = ?5, \
             updated_by = ?6, updated_at = ?7 WHERE id = ?8",
            params![
                enabled as i64,
                similarity_threshold,
                serde_json::to_string(&dataset_tags)?,
                autopublish,
                autorequest,
                updated_by,
                Self::now_rfc3339(),
                id,
            ],
        )?;

        self.get_monitored_channel(id)?
            .ok_or_else(|| SqliteManagerError::MonitoredChannelNotFound(id.to_string()))
    }

    pub fn remove_monitored_channel(&self, id: &str) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        let deleted = conn.execute("DELETE FROM monitored_channels WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(SqliteManagerError::MonitoredChannelNotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_db() -> (TempDir, SqliteManager) {
        let dir = TempDir::new().unwrap();
        let db = SqliteManager::new(dir.path().join("channels.db")).unwrap();
        (dir, db)
    }

    fn channel(community: &str, channel_id: &str) -> MonitoredChannel {
        let now = SqliteManager::now_rfc3339();
        MonitoredChannel {
            id: Uuid::new_v4().to_string(),
            community_server_id: community.to_string(),
            channel_id: channel_id.to_string(),
            enabled: true,
            similarity_threshold: 0.6,
            dataset_tags: vec!["snopes".to_string()],
            previously_seen_autopublish_threshold: None,
            previously_seen_autorequest_threshold: None,
            updated_by: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn test_duplicate_channel_is_conflict() {
        let (_dir, db) = test_db();
        db.add_monitored_channel(&channel("guild-1", "chan-1")).unwrap();
        let result = db.add_monitored_channel(&channel("guild-1", "chan-1"));
        assert!(matches!(result, Err(SqliteManagerError::ChannelAlreadyMonitored(_))));
    }

    #[test]
    fn test_update_preserves_unset_fields_and_clears_override() {
        let (_dir, db) = test_db();
        let mut ch = channel("guild-1", "chan-1");
        ch.previously_seen_autopublish_threshold = Some(0.95);
        db.add_monitored_channel(&ch).unwrap();

        let updated = db
            .update_monitored_channel(
                &ch.id,
                &MonitoredChannelUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!updated.enabled);
        assert_eq!(updated.previously_seen_autopublish_threshold, Some(0.95));
        assert_eq!(updated.similarity_threshold, 0.6);

        let cleared = db
            .update_monitored_channel(
                &ch.id,
                &MonitoredChannelUpdate {
                    previously_seen_autopublish_threshold: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.previously_seen_autopublish_threshold, None);
    }

    #[test]
    fn test_list_pagination_and_count() {
        let (_dir, db) = test_db();
        for i in 0..5 {
            db.add_monitored_channel(&channel("guild-1", &format!("chan-{}", i))).unwrap();
        }
        db.add_monitored_channel(&channel("guild-2", "other")).unwrap();

        let (page, total) = db.list_monitored_channels("guild-1", None, 1, 2).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 5);

        let (page3, _) = db.list_monitored_channels("guild-1", None, 3, 2).unwrap();
        assert_eq!(page3.len(), 1);
    }
}
