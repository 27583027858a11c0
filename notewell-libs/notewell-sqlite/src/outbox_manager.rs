use crate::schemas::note::ScoreEventOutboxRow;
use crate::{SqliteManager, SqliteManagerError};
use rusqlite::{params, Row};
use uuid::Uuid;

fn outbox_from_row(row: &Row) -> Result<ScoreEventOutboxRow, rusqlite::Error> {
    let payload_json: String = row.get(2)?;
    let payload = serde_json::from_str(&payload_json)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    Ok(ScoreEventOutboxRow {
        id: row.get(0)?,
        note_id: row.get(1)?,
        payload,
        created_at: row.get(3)?,
        published_at: row.get(4)?,
    })
}

impl SqliteManager {
    /// Writes a score-update event into the outbox. Called inside the same
    /// flow that commits the rating, so the event row exists iff the rating
    /// committed.
    pub fn enqueue_score_event(
        &self,
        note_id: &str,
        payload: serde_json::Value,
    ) -> Result<ScoreEventOutboxRow, SqliteManagerError> {
        let conn = self.get_connection()?;
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO score_event_outbox (id, note_id, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, note_id, serde_json::to_string(&payload)?, Self::now_rfc3339()],
        )?;
        let mut stmt = conn.prepare(
            "SELECT id, note_id, payload, created_at, published_at FROM score_event_outbox WHERE id = ?1",
        )?;
        stmt.query_row(params![id], outbox_from_row)
            .map_err(SqliteManagerError::DatabaseError)
    }

    pub fn get_unpublished_score_events(&self, limit: usize) -> Result<Vec<ScoreEventOutboxRow>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, note_id, payload, created_at, published_at FROM score_event_outbox \
             WHERE published_at IS NULL ORDER BY created_at, id LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], outbox_from_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SqliteManagerError::DatabaseError)
    }

    pub fn mark_score_event_published(&self, id: &str) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE score_event_outbox SET published_at = ?1 WHERE id = ?2",
            params![Self::now_rfc3339(), id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_outbox_drain_order_and_publish_marking() {
        let dir = TempDir::new().unwrap();
        let db = SqliteManager::new(dir.path().join("outbox.db")).unwrap();

        let first = db.enqueue_score_event("note-1", serde_json::json!({"score": 0.5})).unwrap();
        let _second = db.enqueue_score_event("note-2", serde_json::json!({"score": 0.9})).unwrap();

        let pending = db.get_unpublished_score_events(10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);

        db.mark_score_event_published(&first.id).unwrap();
        let pending = db.get_unpublished_score_events(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].note_id, "note-2");
    }
}
