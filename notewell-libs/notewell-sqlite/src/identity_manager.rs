use crate::schemas::identity::{CommunityMember, MemberRole, UserProfile};
use crate::{SqliteManager, SqliteManagerError};
use rusqlite::{params, OptionalExtension, Row};
use std::str::FromStr;

fn profile_from_row(row: &Row) -> Result<UserProfile, rusqlite::Error> {
    Ok(UserProfile {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_service_account: row.get::<_, i64>(3)? != 0,
        is_platform_admin: row.get::<_, i64>(4)? != 0,
        is_active: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

fn member_from_row(row: &Row) -> Result<CommunityMember, rusqlite::Error> {
    Ok(CommunityMember {
        id: row.get(0)?,
        community_server_id: row.get(1)?,
        profile_id: row.get(2)?,
        role: MemberRole::from_str(&row.get::<_, String>(3)?)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        is_active: row.get::<_, i64>(4)? != 0,
        banned_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl SqliteManager {
    pub fn add_user_profile(&self, profile: &UserProfile) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO user_profiles (id, username, email, is_service_account, is_platform_admin, is_active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                profile.id,
                profile.username,
                profile.email,
                profile.is_service_account as i64,
                profile.is_platform_admin as i64,
                profile.is_active as i64,
                profile.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_user_profile(&self, profile_id: &str) -> Result<Option<UserProfile>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, username, email, is_service_account, is_platform_admin, is_active, created_at \
             FROM user_profiles WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![profile_id], profile_from_row).optional()?)
    }

    pub fn add_community_member(&self, member: &CommunityMember) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO community_members (id, community_server_id, profile_id, role, is_active, banned_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                member.id,
                member.community_server_id,
                member.profile_id,
                member.role.as_str(),
                member.is_active as i64,
                member.banned_at,
                member.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_community_member(
        &self,
        community_server_id: &str,
        profile_id: &str,
    ) -> Result<Option<CommunityMember>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, community_server_id, profile_id, role, is_active, banned_at, created_at \
             FROM community_members WHERE community_server_id = ?1 AND profile_id = ?2",
        )?;
        Ok(stmt
            .query_row(params![community_server_id, profile_id], member_from_row)
            .optional()?)
    }

    pub fn set_member_banned(
        &self,
        community_server_id: &str,
        profile_id: &str,
        banned_at: Option<String>,
    ) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        let updated = conn.execute(
            "UPDATE community_members SET banned_at = ?1 WHERE community_server_id = ?2 AND profile_id = ?3",
            params![banned_at, community_server_id, profile_id],
        )?;
        if updated == 0 {
            return Err(SqliteManagerError::ProfileNotFound(profile_id.to_string()));
        }
        Ok(())
    }

    /// A community is known to the node once anything references it: members,
    /// monitored channels, notes, or previously-seen records.
    pub fn community_exists(&self, community_server_id: &str) -> Result<bool, SqliteManagerError> {
        let conn = self.get_connection()?;
        let exists: i64 = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM community_members WHERE community_server_id = ?1)
                 OR EXISTS (SELECT 1 FROM monitored_channels WHERE community_server_id = ?1)
                 OR EXISTS (SELECT 1 FROM notes WHERE community_server_id = ?1)
                 OR EXISTS (SELECT 1 FROM previously_seen_messages WHERE community_server_id = ?1)",
            params![community_server_id],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    /// Stable participant ids used by the scoring fan-out: every rater plus
    /// every note author in the community, deduplicated and sorted.
    pub fn get_participant_ids(&self, community_server_id: &str) -> Result<Vec<String>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT participant FROM ( \
                 SELECT r.rater_id AS participant FROM ratings r \
                 JOIN notes n ON n.id = r.note_id WHERE n.community_server_id = ?1 AND n.deleted_at IS NULL \
                 UNION \
                 SELECT author_id AS participant FROM notes \
                 WHERE community_server_id = ?1 AND deleted_at IS NULL \
             ) ORDER BY participant",
        )?;
        let rows = stmt.query_map(params![community_server_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SqliteManagerError::DatabaseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_db() -> (TempDir, SqliteManager) {
        let dir = TempDir::new().unwrap();
        let db = SqliteManager::new(dir.path().join("identity.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_member_round_trip_and_ban() {
        let (_dir, db) = test_db();
        let member = CommunityMember {
            id: Uuid::new_v4().to_string(),
            community_server_id: "guild-1".to_string(),
            profile_id: "profile-1".to_string(),
            role: MemberRole::Moderator,
            is_active: true,
            banned_at: None,
            created_at: SqliteManager::now_rfc3339(),
        };
        db.add_community_member(&member).unwrap();

        let fetched = db.get_community_member("guild-1", "profile-1").unwrap().unwrap();
        assert_eq!(fetched.role, MemberRole::Moderator);
        assert!(fetched.banned_at.is_none());

        db.set_member_banned("guild-1", "profile-1", Some(SqliteManager::now_rfc3339()))
            .unwrap();
        let banned = db.get_community_member("guild-1", "profile-1").unwrap().unwrap();
        assert!(banned.banned_at.is_some());
    }
}
