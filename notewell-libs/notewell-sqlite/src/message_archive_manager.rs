use crate::schemas::request::MessageArchive;
use crate::{SqliteManager, SqliteManagerError};
use rusqlite::{params, OptionalExtension, Row};

fn archive_from_row(row: &Row) -> Result<MessageArchive, rusqlite::Error> {
    Ok(MessageArchive {
        id: row.get(0)?,
        community_server_id: row.get(1)?,
        platform_message_id: row.get(2)?,
        channel_id: row.get(3)?,
        author_id: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl SqliteManager {
    pub fn add_message_archive(&self, archive: &MessageArchive) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO message_archives (id, community_server_id, platform_message_id, channel_id, author_id, content, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                archive.id,
                archive.community_server_id,
                archive.platform_message_id,
                archive.channel_id,
                archive.author_id,
                archive.content,
                archive.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_message_archive(&self, id: &str) -> Result<Option<MessageArchive>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, community_server_id, platform_message_id, channel_id, author_id, content, created_at \
             FROM message_archives WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![id], archive_from_row).optional()?)
    }

    pub fn get_message_archive_by_platform_id(
        &self,
        community_server_id: &str,
        platform_message_id: &str,
    ) -> Result<Option<MessageArchive>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, community_server_id, platform_message_id, channel_id, author_id, content, created_at \
             FROM message_archives WHERE community_server_id = ?1 AND platform_message_id = ?2",
        )?;
        Ok(stmt
            .query_row(params![community_server_id, platform_message_id], archive_from_row)
            .optional()?)
    }
}
