use crate::network::node::Node;
use crate::network::node_error::NodeError;
use crate::scoring::scorer::derive_note_status;
use notewell_http_api::jsonapi;
use notewell_http_api::schemas::{AuthContext, RatingCreateAttributes, RatingUpdateAttributes};
use notewell_sqlite::schemas::note::{HelpfulnessLevel, Note, Rating};
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{info, warn};

fn rating_attributes(rating: &Rating) -> Value {
    json!({
        "note_id": rating.note_id,
        "rater_id": rating.rater_id,
        "helpfulness_level": rating.helpfulness_level.as_str(),
        "created_at": rating.created_at,
        "updated_at": rating.updated_at,
    })
}

impl Node {
    fn load_note(&self, note_id: &str) -> Result<Note, NodeError> {
        self.db
            .get_note(note_id)?
            .ok_or_else(|| NodeError::NotFound(format!("Note {}", note_id)))
    }

    /// Create-or-upsert a rating, then recompute the note's score and status.
    /// The database commit happens first; the score-update event goes through
    /// the outbox and can never roll the rating back.
    pub(crate) async fn create_rating(
        &self,
        auth: &AuthContext,
        attributes: RatingCreateAttributes,
    ) -> Result<Value, NodeError> {
        let level = HelpfulnessLevel::from_str(&attributes.helpfulness_level)
            .map_err(|_| NodeError::Validation(format!("Invalid helpfulness level: {}", attributes.helpfulness_level)))?;
        let note = self.load_note(&attributes.note_id)?;
        self.authorizer.verify_community_member(auth, &note.community_server_id)?;

        let rating = self.db.upsert_rating(&note.id, &attributes.rater_id, level)?;

        // The mutation invalidates any cached MF batch for this community.
        self.scorer_factory.bump_ratings_version(&note.community_server_id);

        let score = self.rescore_note(&note).await?;
        info!(
            note_id = %note.id,
            rater_id = %attributes.rater_id,
            new_score = score.0,
            new_status = %score.1,
            rating_count = score.2,
            "created/updated rating"
        );

        Ok(jsonapi::resource_document(
            "ratings",
            &rating.id,
            rating_attributes(&rating),
            None,
        ))
    }

    /// Recomputes score and status for a note from its current ratings.
    /// Returns (score, status, rating_count).
    async fn rescore_note(&self, note: &Note) -> Result<(f64, String, usize), NodeError> {
        let ratings = self.db.get_ratings_for_note(&note.id)?;
        let values: Vec<f64> = ratings.iter().map(|r| r.helpfulness_level.value()).collect();

        let note_count = self.db.note_count_for_community(&note.community_server_id)?;
        let scorer = self
            .scorer_factory
            .get_scorer(&note.community_server_id, note_count, None);
        let result = scorer.score_note(&note.id, &values);

        let status = derive_note_status(result.score, values.len(), self.settings.min_ratings_needed);
        let helpfulness_score = (result.score * 100.0).floor() as i64;
        self.db.update_note_score(&note.id, helpfulness_score, status)?;

        // Two-phase publication: the score is committed, the event is a row in
        // the outbox drained by the publisher.
        let payload = json!({
            "note_id": note.id,
            "score": result.score,
            "confidence": result.confidence.as_str(),
            "algorithm": result.algorithm(),
            "rating_count": values.len(),
            "status": status.as_str(),
        });
        if let Err(err) = self.db.enqueue_score_event(&note.id, payload) {
            warn!(note_id = %note.id, %err, "failed to enqueue score event (database already updated)");
        }

        Ok((result.score, status.as_str().to_string(), values.len()))
    }

    pub(crate) async fn update_rating(
        &self,
        auth: &AuthContext,
        rating_id: &str,
        attributes: RatingUpdateAttributes,
    ) -> Result<Value, NodeError> {
        let level = HelpfulnessLevel::from_str(&attributes.helpfulness_level)
            .map_err(|_| NodeError::Validation(format!("Invalid helpfulness level: {}", attributes.helpfulness_level)))?;
        let rating = self
            .db
            .get_rating(rating_id)?
            .ok_or_else(|| NodeError::NotFound(format!("Rating {}", rating_id)))?;
        let note = self.load_note(&rating.note_id)?;

        // Ownership: the author may update their rating; community admins and
        // service accounts may moderate.
        let profile = self.authorizer.resolve_profile(auth)?;
        let is_owner = profile.id == rating.rater_id;
        if !is_owner && !self.authorizer.is_service_account(&profile) {
            self.authorizer.verify_community_admin(auth, &note.community_server_id)?;
        }

        let updated = self.db.update_rating_level(rating_id, level)?;
        self.scorer_factory.bump_ratings_version(&note.community_server_id);
        self.rescore_note(&note).await?;

        Ok(jsonapi::resource_document(
            "ratings",
            &updated.id,
            rating_attributes(&updated),
            None,
        ))
    }

    pub(crate) async fn list_note_ratings(&self, auth: &AuthContext, note_id: &str) -> Result<Value, NodeError> {
        let note = self.load_note(note_id)?;
        self.authorizer.verify_community_member(auth, &note.community_server_id)?;

        let ratings = self.db.get_ratings_for_note(note_id)?;
        let resources: Vec<Value> = ratings
            .iter()
            .map(|r| json!({"type": "ratings", "id": r.id, "attributes": rating_attributes(r)}))
            .collect();

        Ok(json!({
            "data": resources,
            "jsonapi": {"version": jsonapi::JSONAPI_VERSION},
        }))
    }

    pub(crate) async fn get_note_rating_stats(&self, auth: &AuthContext, note_id: &str) -> Result<Value, NodeError> {
        let note = self.load_note(note_id)?;
        self.authorizer.verify_community_member(auth, &note.community_server_id)?;

        let stats = self.db.get_rating_stats(note_id)?;
        Ok(jsonapi::resource_document(
            "rating-stats",
            note_id,
            json!({
                "total": stats.total,
                "helpful": stats.helpful,
                "somewhat_helpful": stats.somewhat_helpful,
                "not_helpful": stats.not_helpful,
                "average_score": stats.average_score,
            }),
            None,
        ))
    }
}
