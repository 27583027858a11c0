use crate::network::node_error::NodeError;
use crate::services::llm_client::{LlmClient, LlmMessage};
use crate::workflows::token_gate::{TokenGate, WorkflowWeight};
use notewell_sqlite::schemas::note::{Note, NoteClassification, NoteStatus};
use notewell_sqlite::SqliteManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Author id recorded on AI-generated notes.
pub const AI_NOTE_AUTHOR_ID: &str = "ai-note-writer";

const AI_NOTE_SYSTEM_PROMPT: &str = "You write short community notes: neutral, sourced context for a chat \
message that matched a fact-check. Two to four sentences, no hedging filler, cite the fact-check when one is \
provided.";
const AI_NOTE_MAX_TOKENS: u32 = 500;
const AI_NOTE_TEMPERATURE: f32 = 0.7;

/// Generates AI notes for note requests. The note text itself comes from the
/// external LLM; this component owns idempotency (one note per request) and
/// admission through the token gate.
pub struct NoteWriter {
    db: Arc<SqliteManager>,
    llm: Arc<LlmClient>,
    gate: Arc<TokenGate>,
    enabled: bool,
}

impl NoteWriter {
    pub fn new(db: Arc<SqliteManager>, llm: Arc<LlmClient>, gate: Arc<TokenGate>, enabled: bool) -> Self {
        NoteWriter { db, llm, gate, enabled }
    }

    pub async fn generate_for_request(&self, request_id: &str) -> Result<Value, NodeError> {
        if !self.enabled {
            return Ok(json!({"status": "disabled"}));
        }

        // Heavy LLM work is admitted through the shared pool.
        let _permit = self.gate.acquire("default", WorkflowWeight::ContentMonitoring).await;

        let request = self
            .db
            .get_request_by_request_id(request_id)?
            .ok_or_else(|| NodeError::NotFound(format!("Request {}", request_id)))?;

        if let Some(existing) = self.db.get_note_by_request_id(request_id)? {
            info!(request_id, note_id = %existing.id, "note already exists for request");
            return Ok(json!({"status": "already_exists", "note_id": existing.id}));
        }

        let prompt = match &request.dataset_item_id {
            Some(item_id) => match self.db.get_fact_check_item(item_id)? {
                Some(item) => format!(
                    "Message:\n{}\n\nMatched fact-check: {} ({})\n{}\n\nWrite a community note for the message.",
                    request.content,
                    item.title,
                    item.source_url.as_deref().unwrap_or("no source"),
                    item.content,
                ),
                None => format!("Message:\n{}\n\nWrite a community note explaining the needed context.", request.content),
            },
            None => format!("Message:\n{}\n\nWrite a community note explaining the needed context.", request.content),
        };

        let messages = [LlmMessage::system(AI_NOTE_SYSTEM_PROMPT), LlmMessage::user(&prompt)];
        let summary = self.llm.complete(&messages, AI_NOTE_MAX_TOKENS, AI_NOTE_TEMPERATURE).await?;

        let now = SqliteManager::now_rfc3339();
        let note = Note {
            id: Uuid::new_v4().to_string(),
            community_server_id: request.community_server_id.clone(),
            author_id: AI_NOTE_AUTHOR_ID.to_string(),
            summary,
            classification: NoteClassification::NotMisleading,
            status: NoteStatus::NeedsMoreRatings,
            helpfulness_score: 0,
            request_id: Some(request.request_id.clone()),
            ai_generated: true,
            ai_provider: Some(self.llm.model().to_string()),
            force_published: false,
            created_at: now.clone(),
            updated_at: now,
        };
        self.db.add_note(&note)?;

        info!(request_id, note_id = %note.id, "generated AI note");
        Ok(json!({"status": "completed", "note_id": note.id}))
    }
}
