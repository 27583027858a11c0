use crate::schemas::request::NoteRequest;
use crate::{SqliteManager, SqliteManagerError};
use chrono::{Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};

fn request_from_row(row: &Row) -> Result<NoteRequest, rusqlite::Error> {
    Ok(NoteRequest {
        id: row.get(0)?,
        request_id: row.get(1)?,
        community_server_id: row.get(2)?,
        requested_by: row.get(3)?,
        content: row.get(4)?,
        dataset_item_id: row.get(5)?,
        similarity_score: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const REQUEST_COLUMNS: &str = "id, request_id, community_server_id, requested_by, content, \
                               dataset_item_id, similarity_score, status, created_at, updated_at";

/// Which requests a bulk clear removes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearRequestsMode {
    All,
    OlderThanDays(i64),
}

impl SqliteManager {
    pub fn add_request(&self, request: &NoteRequest) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO requests (id, request_id, community_server_id, requested_by, content, \
             dataset_item_id, similarity_score, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                request.id,
                request.request_id,
                request.community_server_id,
                request.requested_by,
                request.content,
                request.dataset_item_id,
                request.similarity_score,
                request.status,
                request.created_at,
                request.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_request_by_request_id(&self, request_id: &str) -> Result<Option<NoteRequest>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM requests WHERE request_id = ?1",
            REQUEST_COLUMNS
        ))?;
        Ok(stmt.query_row(params![request_id], request_from_row).optional()?)
    }

    pub fn get_requests_for_community(&self, community_server_id: &str) -> Result<Vec<NoteRequest>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM requests WHERE community_server_id = ?1 ORDER BY created_at, id",
            REQUEST_COLUMNS
        ))?;
        let rows = stmt.query_map(params![community_server_id], request_from_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SqliteManagerError::DatabaseError)
    }

    /// Bulk-deletes requests for a community. Returns the number removed.
    pub fn clear_requests(
        &self,
        community_server_id: &str,
        mode: ClearRequestsMode,
    ) -> Result<usize, SqliteManagerError> {
        let conn = self.get_connection()?;
        let deleted = match mode {
            ClearRequestsMode::All => conn.execute(
                "DELETE FROM requests WHERE community_server_id = ?1",
                params![community_server_id],
            )?,
            ClearRequestsMode::OlderThanDays(days) => {
                let cutoff = (Utc::now() - Duration::days(days))
                    .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
                conn.execute(
                    "DELETE FROM requests WHERE community_server_id = ?1 AND created_at < ?2",
                    params![community_server_id, cutoff],
                )?
            }
        };
        Ok(deleted)
    }
}
