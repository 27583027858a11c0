use crate::network::node_error::NodeError;
use notewell_http_api::schemas::AuthContext;
use notewell_sqlite::schemas::identity::{MemberRole, UserProfile};
use notewell_sqlite::SqliteManager;
use std::sync::Arc;

/// Four-tier authorization, evaluated in order:
/// 1. service account (flag, recognized email domain, or username pattern)
/// 2. platform admin flag on the profile
/// 3. platform "manage server" permission signaled by the gateway
/// 4. community membership role
///
/// Tiers 1 and 2 imply member access. Tiers 3 and 4 admin access does NOT:
/// member access always needs an active, non-banned membership.
pub struct Authorizer {
    db: Arc<SqliteManager>,
    service_email_domains: Vec<String>,
    service_username_prefixes: Vec<String>,
}

impl Authorizer {
    pub fn new(db: Arc<SqliteManager>, service_email_domains: Vec<String>, service_username_prefixes: Vec<String>) -> Self {
        Authorizer {
            db,
            service_email_domains,
            service_username_prefixes,
        }
    }

    /// Resolves the bearer token (a stable profile id) to a profile.
    pub fn resolve_profile(&self, auth: &AuthContext) -> Result<UserProfile, NodeError> {
        self.db
            .get_user_profile(&auth.bearer)?
            .filter(|p| p.is_active)
            .ok_or_else(|| NodeError::Unauthorized("Unknown or inactive profile".to_string()))
    }

    pub fn is_service_account(&self, profile: &UserProfile) -> bool {
        if profile.is_service_account {
            return true;
        }
        if let Some(email) = &profile.email {
            if let Some(domain) = email.rsplit('@').next() {
                if self.service_email_domains.iter().any(|d| d == domain) {
                    return true;
                }
            }
        }
        self.service_username_prefixes
            .iter()
            .any(|prefix| profile.username.starts_with(prefix.as_str()))
    }

    /// Admin-level access for mutations scoped to a community.
    pub fn verify_community_admin(
        &self,
        auth: &AuthContext,
        community_server_id: &str,
    ) -> Result<UserProfile, NodeError> {
        let profile = self.resolve_profile(auth)?;
        if self.is_service_account(&profile) || profile.is_platform_admin || auth.manage_server {
            return Ok(profile);
        }

        let member = self.db.get_community_member(community_server_id, &profile.id)?;
        match member {
            Some(member)
                if member.banned_at.is_none()
                    && member.is_active
                    && matches!(member.role, MemberRole::Admin | MemberRole::Moderator) =>
            {
                Ok(profile)
            }
            _ => Err(NodeError::Forbidden(format!(
                "Admin access to community {} denied",
                community_server_id
            ))),
        }
    }

    /// Member-level access for reads. Admin tiers 3 and 4 do not bypass this:
    /// only service accounts and platform admins are exempt from the
    /// membership requirement, and a ban always wins over `is_active`.
    pub fn verify_community_member(
        &self,
        auth: &AuthContext,
        community_server_id: &str,
    ) -> Result<UserProfile, NodeError> {
        let profile = self.resolve_profile(auth)?;
        if self.is_service_account(&profile) || profile.is_platform_admin {
            return Ok(profile);
        }

        let member = self.db.get_community_member(community_server_id, &profile.id)?;
        match member {
            Some(member) if member.banned_at.is_none() && member.is_active => Ok(profile),
            Some(member) if member.banned_at.is_some() => Err(NodeError::Forbidden(format!(
                "Banned from community {}",
                community_server_id
            ))),
            _ => Err(NodeError::Forbidden(format!(
                "Not a member of community {}",
                community_server_id
            ))),
        }
    }

    /// Platform-level access for node-wide maintenance (rechunk, imports).
    pub fn verify_platform_admin(&self, auth: &AuthContext) -> Result<UserProfile, NodeError> {
        let profile = self.resolve_profile(auth)?;
        if self.is_service_account(&profile) || profile.is_platform_admin || auth.manage_server {
            return Ok(profile);
        }
        Err(NodeError::Forbidden("Platform admin access required".to_string()))
    }
}
