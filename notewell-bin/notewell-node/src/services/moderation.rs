use crate::network::node_error::NodeError;
use reqwest::ClientBuilder;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

/// Result of classifying one message against the moderation endpoint.
#[derive(Debug, Clone)]
pub struct ModerationResult {
    pub flagged: bool,
    pub categories: HashMap<String, bool>,
    pub scores: HashMap<String, f64>,
    pub flagged_categories: Vec<String>,
    pub max_score: f64,
}

/// Client for an OpenAI-style `/v1/moderations` endpoint.
pub struct ModerationClient {
    api_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ModerationClient {
    pub fn new(api_url: &str, api_key: Option<String>, timeout_secs: u64) -> Self {
        ModerationClient {
            api_url: api_url.to_string(),
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn moderations_url(&self) -> String {
        if self.api_url.ends_with('/') {
            format!("{}v1/moderations", self.api_url)
        } else {
            format!("{}/v1/moderations", self.api_url)
        }
    }

    pub async fn moderate_text(&self, text: &str) -> Result<ModerationResult, NodeError> {
        let client = ClientBuilder::new()
            .timeout(self.timeout)
            .build()
            .map_err(|e| NodeError::ProviderUnavailable(e.to_string()))?;

        let mut request = client
            .post(self.moderations_url())
            .header("Content-Type", "application/json")
            .json(&json!({"input": text}));
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::ProviderUnavailable(format!("Moderation request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(NodeError::ProviderUnavailable(format!(
                "Moderation request failed with status: {}",
                response.status()
            )));
        }

        let body: ModerationResponse = response
            .json()
            .await
            .map_err(|e| NodeError::ProviderUnavailable(format!("Malformed moderation response: {}", e)))?;
        let result = body
            .results
            .into_iter()
            .next()
            .ok_or_else(|| NodeError::ProviderUnavailable("Moderation returned no results".to_string()))?;

        let flagged_categories: Vec<String> = result
            .categories
            .iter()
            .filter(|(_, flagged)| **flagged)
            .map(|(category, _)| category.clone())
            .collect();
        let max_score = result
            .category_scores
            .values()
            .fold(0.0f64, |acc, score| acc.max(*score));

        Ok(ModerationResult {
            flagged: result.flagged,
            categories: result.categories,
            scores: result.category_scores,
            flagged_categories,
            max_score,
        })
    }
}

#[derive(Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResponseResult>,
}

#[derive(Deserialize)]
struct ModerationResponseResult {
    flagged: bool,
    categories: HashMap<String, bool>,
    category_scores: HashMap<String, f64>,
}
