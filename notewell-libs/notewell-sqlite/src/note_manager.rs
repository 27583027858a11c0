use crate::schemas::note::{HelpfulnessLevel, Note, NoteClassification, NoteStatus, Rating, RatingStats};
use crate::{SqliteManager, SqliteManagerError};
use rusqlite::{params, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

fn note_from_row(row: &Row) -> Result<Note, rusqlite::Error> {
    Ok(Note {
        id: row.get(0)?,
        community_server_id: row.get(1)?,
        author_id: row.get(2)?,
        summary: row.get(3)?,
        classification: NoteClassification::from_str(&row.get::<_, String>(4)?)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        status: NoteStatus::from_str(&row.get::<_, String>(5)?)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        helpfulness_score: row.get(6)?,
        request_id: row.get(7)?,
        ai_generated: row.get::<_, i64>(8)? != 0,
        ai_provider: row.get(9)?,
        force_published: row.get::<_, i64>(10)? != 0,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn rating_from_row(row: &Row) -> Result<Rating, rusqlite::Error> {
    Ok(Rating {
        id: row.get(0)?,
        note_id: row.get(1)?,
        rater_id: row.get(2)?,
        helpfulness_level: HelpfulnessLevel::from_str(&row.get::<_, String>(3)?)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

const NOTE_COLUMNS: &str = "id, community_server_id, author_id, summary, classification, status, \
                            helpfulness_score, request_id, ai_generated, ai_provider, force_published, \
                            created_at, updated_at";

impl SqliteManager {
    pub fn add_note(&self, note: &Note) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO notes (id, community_server_id, author_id, summary, classification, status, \
             helpfulness_score, request_id, ai_generated, ai_provider, force_published, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                note.id,
                note.community_server_id,
                note.author_id,
                note.summary,
                note.classification.as_str(),
                note.status.as_str(),
                note.helpfulness_score,
                note.request_id,
                note.ai_generated as i64,
                note.ai_provider,
                note.force_published as i64,
                note.created_at,
                note.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Fetches a note, ignoring soft-deleted rows.
    pub fn get_note(&self, note_id: &str) -> Result<Option<Note>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes WHERE id = ?1 AND deleted_at IS NULL",
            NOTE_COLUMNS
        ))?;
        Ok(stmt.query_row(params![note_id], note_from_row).optional()?)
    }

    pub fn get_note_by_request_id(&self, request_id: &str) -> Result<Option<Note>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes WHERE request_id = ?1 AND deleted_at IS NULL",
            NOTE_COLUMNS
        ))?;
        Ok(stmt.query_row(params![request_id], note_from_row).optional()?)
    }

    pub fn get_notes_for_community(&self, community_server_id: &str) -> Result<Vec<Note>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes WHERE community_server_id = ?1 AND deleted_at IS NULL ORDER BY created_at",
            NOTE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![community_server_id], note_from_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SqliteManagerError::DatabaseError)
    }

    pub fn note_count_for_community(&self, community_server_id: &str) -> Result<i64, SqliteManagerError> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE community_server_id = ?1 AND deleted_at IS NULL",
            params![community_server_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Persists a recomputed helpfulness score and derived status.
    pub fn update_note_score(
        &self,
        note_id: &str,
        helpfulness_score: i64,
        status: NoteStatus,
    ) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        let updated = conn.execute(
            "UPDATE notes SET helpfulness_score = ?1, status = ?2, updated_at = ?3 \
             WHERE id = ?4 AND deleted_at IS NULL",
            params![helpfulness_score, status.as_str(), Self::now_rfc3339(), note_id],
        )?;
        if updated == 0 {
            return Err(SqliteManagerError::NoteNotFound(note_id.to_string()));
        }
        Ok(())
    }

    /// Soft-deletes unpublished notes in a community. Notes that are currently
    /// rated helpful or force-published always survive.
    pub fn clear_unpublished_notes(&self, community_server_id: &str) -> Result<usize, SqliteManagerError> {
        let conn = self.get_connection()?;
        let deleted = conn.execute(
            "UPDATE notes SET deleted_at = ?1 \
             WHERE community_server_id = ?2 AND deleted_at IS NULL \
               AND status != ?3 AND force_published = 0",
            params![
                Self::now_rfc3339(),
                community_server_id,
                NoteStatus::CurrentlyRatedHelpful.as_str()
            ],
        )?;
        Ok(deleted)
    }

    /// Creates or updates the rating for (note, rater). The UNIQUE constraint
    /// keeps at most one row per pair; re-rating advances updated_at.
    pub fn upsert_rating(
        &self,
        note_id: &str,
        rater_id: &str,
        helpfulness_level: HelpfulnessLevel,
    ) -> Result<Rating, SqliteManagerError> {
        let conn = self.get_connection()?;
        let now = Self::now_rfc3339();
        conn.execute(
            "INSERT INTO ratings (id, note_id, rater_id, helpfulness_level, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5) \
             ON CONFLICT (note_id, rater_id) DO UPDATE SET \
                 helpfulness_level = excluded.helpfulness_level, \
                 updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                note_id,
                rater_id,
                helpfulness_level.as_str(),
                now
            ],
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, note_id, rater_id, helpfulness_level, created_at, updated_at \
             FROM ratings WHERE note_id = ?1 AND rater_id = ?2",
        )?;
        stmt.query_row(params![note_id, rater_id], rating_from_row)
            .map_err(SqliteManagerError::DatabaseError)
    }

    pub fn get_rating(&self, rating_id: &str) -> Result<Option<Rating>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, note_id, rater_id, helpfulness_level, created_at, updated_at \
             FROM ratings WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![rating_id], rating_from_row).optional()?)
    }

    pub fn update_rating_level(
        &self,
        rating_id: &str,
        helpfulness_level: HelpfulnessLevel,
    ) -> Result<Rating, SqliteManagerError> {
        let conn = self.get_connection()?;
        let updated = conn.execute(
            "UPDATE ratings SET helpfulness_level = ?1, updated_at = ?2 WHERE id = ?3",
            params![helpfulness_level.as_str(), Self::now_rfc3339(), rating_id],
        )?;
        if updated == 0 {
            return Err(SqliteManagerError::RatingNotFound(rating_id.to_string()));
        }
        self.get_rating(rating_id)?
            .ok_or_else(|| SqliteManagerError::RatingNotFound(rating_id.to_string()))
    }

    /// Ratings for a note, newest first.
    pub fn get_ratings_for_note(&self, note_id: &str) -> Result<Vec<Rating>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, note_id, rater_id, helpfulness_level, created_at, updated_at \
             FROM ratings WHERE note_id = ?1 ORDER BY created_at DESC, id",
        )?;
        let rows = stmt.query_map(params![note_id], rating_from_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SqliteManagerError::DatabaseError)
    }

    pub fn get_ratings_for_community(&self, community_server_id: &str) -> Result<Vec<Rating>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT r.id, r.note_id, r.rater_id, r.helpfulness_level, r.created_at, r.updated_at \
             FROM ratings r JOIN notes n ON n.id = r.note_id \
             WHERE n.community_server_id = ?1 AND n.deleted_at IS NULL \
             ORDER BY r.created_at, r.id",
        )?;
        let rows = stmt.query_map(params![community_server_id], rating_from_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SqliteManagerError::DatabaseError)
    }

    pub fn get_rating_stats(&self, note_id: &str) -> Result<RatingStats, SqliteManagerError> {
        let ratings = self.get_ratings_for_note(note_id)?;
        if ratings.is_empty() {
            return Ok(RatingStats {
                total: 0,
                helpful: 0,
                somewhat_helpful: 0,
                not_helpful: 0,
                average_score: 0.0,
            });
        }

        let helpful = ratings
            .iter()
            .filter(|r| r.helpfulness_level == HelpfulnessLevel::Helpful)
            .count();
        let somewhat = ratings
            .iter()
            .filter(|r| r.helpfulness_level == HelpfulnessLevel::SomewhatHelpful)
            .count();
        let not_helpful = ratings
            .iter()
            .filter(|r| r.helpfulness_level == HelpfulnessLevel::NotHelpful)
            .count();
        let total_score: f64 = ratings.iter().map(|r| r.helpfulness_level.value()).sum();

        Ok(RatingStats {
            total: ratings.len(),
            helpful,
            somewhat_helpful: somewhat,
            not_helpful,
            average_score: total_score / ratings.len() as f64,
        })
    }
}
