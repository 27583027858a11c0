use crate::network::node_error::NodeError;
use crate::services::llm_client::{LlmClient, LlmMessage};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const RELEVANCE_SYSTEM_PROMPT: &str = "You decide whether a chat message contains a verifiable factual claim \
related to a piece of matched reference content. A bare mention of a topic, name, or question is NOT a claim. \
Answer with JSON only: {\"is_relevant\": bool, \"reasoning\": string}. Set is_relevant to true ONLY when the \
message itself asserts something checkable that relates to the matched content.";

const RELEVANCE_MAX_TOKENS: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceDecision {
    pub is_relevant: bool,
    #[serde(default)]
    pub reasoning: String,
}

/// The unified late-stage filter. One LLM call per candidate; the caller
/// drops candidates whose check fails or errors.
pub struct RelevanceFilter {
    llm: Arc<LlmClient>,
    enabled: bool,
}

impl RelevanceFilter {
    pub fn new(llm: Arc<LlmClient>, enabled: bool) -> Self {
        RelevanceFilter { llm, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn check(&self, message_content: &str, matched_content: &str) -> Result<RelevanceDecision, NodeError> {
        if !self.enabled {
            return Ok(RelevanceDecision {
                is_relevant: true,
                reasoning: "relevance check disabled".to_string(),
            });
        }

        let user_prompt = format!(
            "Message:\n{}\n\nMatched content:\n{}\n\nDoes the message contain a verifiable claim related to the matched content?",
            message_content, matched_content
        );
        let messages = [
            LlmMessage::system(RELEVANCE_SYSTEM_PROMPT),
            LlmMessage::user(&user_prompt),
        ];

        let content = self.llm.complete(&messages, RELEVANCE_MAX_TOKENS, 0.0).await?;
        let decision = parse_decision(&content)
            .ok_or_else(|| NodeError::ProviderUnavailable(format!("Unparseable relevance response: {}", content)))?;
        debug!(is_relevant = decision.is_relevant, reasoning = %decision.reasoning, "relevance decision");
        Ok(decision)
    }
}

/// Extracts the JSON object from the model output, tolerating code fences and
/// surrounding prose.
fn parse_decision(content: &str) -> Option<RelevanceDecision> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let decision = parse_decision("{\"is_relevant\": true, \"reasoning\": \"has a claim\"}").unwrap();
        assert!(decision.is_relevant);
        assert_eq!(decision.reasoning, "has a claim");
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "```json\n{\"is_relevant\": false, \"reasoning\": \"name mention only\"}\n```";
        let decision = parse_decision(content).unwrap();
        assert!(!decision.is_relevant);
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_decision("the model refused to answer").is_none());
        assert!(parse_decision("}{").is_none());
    }
}
