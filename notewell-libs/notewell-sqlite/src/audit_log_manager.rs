use crate::schemas::identity::AuditLogEntry;
use crate::{SqliteManager, SqliteManagerError};
use rusqlite::{params, Row};

fn entry_from_row(row: &Row) -> Result<AuditLogEntry, rusqlite::Error> {
    Ok(AuditLogEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action: row.get(2)?,
        resource: row.get(3)?,
        resource_id: row.get(4)?,
        details: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl SqliteManager {
    pub fn add_audit_log(&self, entry: &AuditLogEntry) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO audit_logs (id, user_id, action, resource, resource_id, details, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                entry.user_id,
                entry.action,
                entry.resource,
                entry.resource_id,
                entry.details,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_audit_logs_for_resource(
        &self,
        resource: &str,
        resource_id: &str,
    ) -> Result<Vec<AuditLogEntry>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, action, resource, resource_id, details, created_at \
             FROM audit_logs WHERE resource = ?1 AND resource_id = ?2 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![resource, resource_id], entry_from_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SqliteManagerError::DatabaseError)
    }
}
