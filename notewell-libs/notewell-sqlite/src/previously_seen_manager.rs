use crate::schemas::previously_seen::{PreviouslySeenMatch, PreviouslySeenMessage};
use crate::{SqliteManager, SqliteManagerError};
use rusqlite::{params, OptionalExtension, Row};

fn record_from_row(row: &Row) -> Result<PreviouslySeenMessage, rusqlite::Error> {
    let blob: Vec<u8> = row.get(4)?;
    let embedding = SqliteManager::blob_to_embedding(&blob)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let metadata_json: String = row.get(7)?;
    let extra_metadata = serde_json::from_str(&metadata_json)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    Ok(PreviouslySeenMessage {
        id: row.get(0)?,
        community_server_id: row.get(1)?,
        original_message_id: row.get(2)?,
        published_note_id: row.get(3)?,
        embedding,
        provider: row.get(5)?,
        model: row.get(6)?,
        extra_metadata,
        created_at: row.get(8)?,
    })
}

impl SqliteManager {
    /// Appends a previously-seen record. Re-recording the same
    /// (community, original_message_id) pair is a no-op and returns the
    /// existing row.
    pub fn record_previously_seen(
        &self,
        record: &PreviouslySeenMessage,
    ) -> Result<PreviouslySeenMessage, SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO previously_seen_messages \
             (id, community_server_id, original_message_id, published_note_id, embedding, provider, model, extra_metadata, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT (community_server_id, original_message_id) DO NOTHING",
            params![
                record.id,
                record.community_server_id,
                record.original_message_id,
                record.published_note_id,
                Self::embedding_to_blob(&record.embedding),
                record.provider,
                record.model,
                serde_json::to_string(&record.extra_metadata)?,
                record.created_at,
            ],
        )?;

        self.get_previously_seen(&record.community_server_id, &record.original_message_id)?
            .ok_or_else(|| SqliteManagerError::SomeError("previously-seen insert produced no row".to_string()))
    }

    pub fn get_previously_seen(
        &self,
        community_server_id: &str,
        original_message_id: &str,
    ) -> Result<Option<PreviouslySeenMessage>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, community_server_id, original_message_id, published_note_id, embedding, provider, model, extra_metadata, created_at \
             FROM previously_seen_messages \
             WHERE community_server_id = ?1 AND original_message_id = ?2",
        )?;
        Ok(stmt
            .query_row(params![community_server_id, original_message_id], record_from_row)
            .optional()?)
    }

    pub fn get_all_previously_seen_ids(&self, community_server_id: &str) -> Result<Vec<String>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM previously_seen_messages WHERE community_server_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![community_server_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SqliteManagerError::DatabaseError)
    }

    pub fn get_previously_seen_by_id(&self, id: &str) -> Result<Option<PreviouslySeenMessage>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, community_server_id, original_message_id, published_note_id, embedding, provider, model, extra_metadata, created_at \
             FROM previously_seen_messages WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![id], record_from_row).optional()?)
    }

    pub fn get_previously_seen_communities(&self) -> Result<Vec<String>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT community_server_id FROM previously_seen_messages ORDER BY community_server_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SqliteManagerError::DatabaseError)
    }

    /// Replaces the stored embedding for a record. Used by the rechunk
    /// workflow when the embedding model changes.
    pub fn update_previously_seen_embedding(
        &self,
        id: &str,
        embedding: &[f32],
        provider: &str,
        model: &str,
    ) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE previously_seen_messages SET embedding = ?1, provider = ?2, model = ?3 WHERE id = ?4",
            params![Self::embedding_to_blob(embedding), provider, model, id],
        )?;
        Ok(())
    }

    /// Top-K matches for an embedding, strictly scoped to one community.
    /// Records from other communities never appear in the result.
    pub fn previously_seen_top_matches(
        &self,
        community_server_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<PreviouslySeenMatch>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, community_server_id, original_message_id, published_note_id, embedding, provider, model, extra_metadata, created_at \
             FROM previously_seen_messages WHERE community_server_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![community_server_id], record_from_row)?;

        let mut matches: Vec<PreviouslySeenMatch> = Vec::new();
        for row in rows {
            let record = row?;
            let score = Self::cosine_similarity(query_embedding, &record.embedding);
            matches.push(PreviouslySeenMatch { record, score });
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        matches.truncate(k);
        Ok(matches)
    }
}
