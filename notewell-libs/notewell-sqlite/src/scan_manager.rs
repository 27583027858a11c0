use crate::schemas::scan::{BulkScanLog, FlaggedMessage, ScanStatus};
use crate::{SqliteManager, SqliteManagerError};
use chrono::{Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::str::FromStr;

/// How long flagged results stay retrievable after a scan.
const FLAGGED_RESULTS_TTL_HOURS: i64 = 24;

fn scan_from_row(row: &Row) -> Result<BulkScanLog, rusqlite::Error> {
    Ok(BulkScanLog {
        id: row.get(0)?,
        community_server_id: row.get(1)?,
        initiated_by: row.get(2)?,
        status: ScanStatus::from_str(&row.get::<_, String>(3)?)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        messages_scanned: row.get(4)?,
        messages_flagged: row.get(5)?,
        initiated_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

impl SqliteManager {
    pub fn create_scan_log(&self, scan: &BulkScanLog) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO bulk_scan_logs (id, community_server_id, initiated_by, status, \
             messages_scanned, messages_flagged, initiated_at, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                scan.id,
                scan.community_server_id,
                scan.initiated_by,
                scan.status.as_str(),
                scan.messages_scanned,
                scan.messages_flagged,
                scan.initiated_at,
                scan.completed_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_scan_log(&self, scan_id: &str) -> Result<Option<BulkScanLog>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, community_server_id, initiated_by, status, messages_scanned, messages_flagged, \
             initiated_at, completed_at FROM bulk_scan_logs WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![scan_id], scan_from_row).optional()?)
    }

    pub fn complete_scan_log(
        &self,
        scan_id: &str,
        messages_scanned: i64,
        messages_flagged: i64,
    ) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        let updated = conn.execute(
            "UPDATE bulk_scan_logs SET status = ?1, messages_scanned = ?2, messages_flagged = ?3, \
             completed_at = ?4 WHERE id = ?5",
            params![
                ScanStatus::Completed.as_str(),
                messages_scanned,
                messages_flagged,
                Self::now_rfc3339(),
                scan_id,
            ],
        )?;
        if updated == 0 {
            return Err(SqliteManagerError::ScanNotFound(scan_id.to_string()));
        }
        Ok(())
    }

    /// Appends one flagged message to the scan's result list. The list is
    /// append-only; rows expire after the TTL.
    pub fn push_flagged_message(&self, scan_id: &str, flagged: &FlaggedMessage) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        let expires_at = (Utc::now() + Duration::hours(FLAGGED_RESULTS_TTL_HOURS))
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        conn.execute(
            "INSERT INTO flagged_messages (scan_id, payload, expires_at) VALUES (?1, ?2, ?3)",
            params![scan_id, serde_json::to_string(flagged)?, expires_at],
        )?;
        Ok(())
    }

    /// Flagged messages for a scan in insertion order, skipping expired rows.
    pub fn get_flagged_messages(&self, scan_id: &str) -> Result<Vec<FlaggedMessage>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let now = Self::now_rfc3339();
        let mut stmt = conn.prepare(
            "SELECT payload FROM flagged_messages WHERE scan_id = ?1 AND expires_at > ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![scan_id, now], |row| row.get::<_, String>(0))?;

        let mut messages = Vec::new();
        for row in rows {
            let payload = row?;
            messages.push(serde_json::from_str(&payload)?);
        }
        Ok(messages)
    }

    /// Drops expired flagged rows. Called opportunistically by the node.
    pub fn purge_expired_flagged_messages(&self) -> Result<usize, SqliteManagerError> {
        let conn = self.get_connection()?;
        let deleted = conn.execute(
            "DELETE FROM flagged_messages WHERE expires_at <= ?1",
            params![Self::now_rfc3339()],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_db() -> (TempDir, SqliteManager) {
        let dir = TempDir::new().unwrap();
        let db = SqliteManager::new(dir.path().join("scans.db")).unwrap();
        (dir, db)
    }

    fn flagged(message_id: &str) -> FlaggedMessage {
        FlaggedMessage {
            message_id: message_id.to_string(),
            channel_id: "chan-1".to_string(),
            content: "Biden was a Confederate soldier".to_string(),
            author_id: "user-1".to_string(),
            timestamp: SqliteManager::now_rfc3339(),
            scan_type: "similarity".to_string(),
            match_score: 0.85,
            matched_claim: "Biden Confederate soldier claim".to_string(),
            matched_source: Some("https://snopes.com/x".to_string()),
            dataset_item_id: None,
        }
    }

    #[test]
    fn test_scan_log_lifecycle() {
        let (_dir, db) = test_db();
        let scan = BulkScanLog {
            id: Uuid::new_v4().to_string(),
            community_server_id: "guild-1".to_string(),
            initiated_by: "user-1".to_string(),
            status: ScanStatus::Pending,
            messages_scanned: 0,
            messages_flagged: 0,
            initiated_at: SqliteManager::now_rfc3339(),
            completed_at: None,
        };
        db.create_scan_log(&scan).unwrap();

        db.complete_scan_log(&scan.id, 100, 5).unwrap();
        let fetched = db.get_scan_log(&scan.id).unwrap().unwrap();
        assert_eq!(fetched.status, ScanStatus::Completed);
        assert_eq!(fetched.messages_scanned, 100);
        assert_eq!(fetched.messages_flagged, 5);
        assert!(fetched.completed_at.is_some());
    }

    #[test]
    fn test_flagged_list_preserves_insertion_order() {
        let (_dir, db) = test_db();
        let scan_id = Uuid::new_v4().to_string();
        db.push_flagged_message(&scan_id, &flagged("msg-1")).unwrap();
        db.push_flagged_message(&scan_id, &flagged("msg-2")).unwrap();

        let messages = db.get_flagged_messages(&scan_id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message_id, "msg-1");
        assert_eq!(messages[1].message_id, "msg-2");

        assert!(db.get_flagged_messages("other-scan").unwrap().is_empty());
    }
}
