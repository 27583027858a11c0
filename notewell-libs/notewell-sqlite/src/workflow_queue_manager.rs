use crate::{SqliteManager, SqliteManagerError};
use rusqlite::params;
use serde::de::DeserializeOwned;
use serde::Serialize;

impl SqliteManager {
    /// Persists a queued workflow so it survives a restart. The payload is
    /// the serialized job description.
    pub fn persist_queued_workflow<T: Serialize>(
        &self,
        queue_name: &str,
        workflow_id: &str,
        payload: &T,
    ) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO workflow_queues (queue_name, workflow_id, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                queue_name,
                workflow_id,
                serde_json::to_string(payload)?,
                Self::now_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn remove_queued_workflow(&self, workflow_id: &str) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM workflow_queues WHERE workflow_id = ?1", params![workflow_id])?;
        Ok(())
    }

    /// All persisted queue entries in enqueue order, deserialized.
    pub fn load_queued_workflows<T: DeserializeOwned>(&self) -> Result<Vec<(String, String, T)>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT queue_name, workflow_id, payload FROM workflow_queues ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (queue_name, workflow_id, payload) = row?;
            entries.push((queue_name, workflow_id, serde_json::from_str(&payload)?));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_queue_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let db = SqliteManager::new(dir.path().join("queues.db")).unwrap();

        db.persist_queued_workflow("rechunk", "wf-1", &serde_json::json!({"kind": "fact_check"}))
            .unwrap();
        db.persist_queued_workflow("rechunk", "wf-2", &serde_json::json!({"kind": "previously_seen"}))
            .unwrap();

        let entries: Vec<(String, String, serde_json::Value)> = db.load_queued_workflows().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, "wf-1");

        db.remove_queued_workflow("wf-1").unwrap();
        let entries: Vec<(String, String, serde_json::Value)> = db.load_queued_workflows().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, "wf-2");
    }
}
