use crate::network::node_error::NodeError;
use reqwest::ClientBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: &str) -> Self {
        LlmMessage {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        LlmMessage {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Minimal chat-completions client used for the relevance filter and AI note
/// generation. Transport failures retry with backoff; HTTP errors surface as
/// `ProviderUnavailable`.
pub struct LlmClient {
    api_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(api_url: &str, api_key: Option<String>, model: &str, timeout_secs: u64) -> Self {
        LlmClient {
            api_url: api_url.to_string(),
            api_key,
            model: model.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        if self.api_url.ends_with('/') {
            format!("{}v1/chat/completions", self.api_url)
        } else {
            format!("{}/v1/chat/completions", self.api_url)
        }
    }

    /// Sends a chat completion request and returns the first choice content.
    pub async fn complete(
        &self,
        messages: &[LlmMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, NodeError> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let client = ClientBuilder::new()
            .timeout(self.timeout)
            .build()
            .map_err(|e| NodeError::ProviderUnavailable(e.to_string()))?;

        let mut retry_count = 0;
        loop {
            let mut request = client
                .post(self.completions_url())
                .header("Content-Type", "application/json")
                .json(&payload);
            if let Some(api_key) = &self.api_key {
                request = request.header("Authorization", format!("Bearer {}", api_key));
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    let body: ChatCompletionResponse = response
                        .json()
                        .await
                        .map_err(|e| NodeError::ProviderUnavailable(format!("Malformed LLM response: {}", e)))?;
                    return body
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| NodeError::ProviderUnavailable("LLM returned no choices".to_string()));
                }
                Ok(response) => {
                    return Err(NodeError::ProviderUnavailable(format!(
                        "LLM request failed with status: {}",
                        response.status()
                    )));
                }
                Err(err) if err.is_timeout() || err.is_connect() => {
                    if retry_count < MAX_RETRIES {
                        retry_count += 1;
                        tokio::time::sleep(Duration::from_secs(2u64.pow(retry_count))).await;
                        continue;
                    }
                    return Err(NodeError::ProviderUnavailable(format!(
                        "LLM request failed after {} retries: {}",
                        MAX_RETRIES, err
                    )));
                }
                Err(err) => {
                    return Err(NodeError::ProviderUnavailable(format!("LLM request failed: {}", err)));
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "choices": [
                        {"message": {"role": "assistant", "content": "{\"is_relevant\": true}"}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = LlmClient::new(&server.url(), Some("key".to_string()), "gpt-5-mini", 5);
        let content = client
            .complete(&[LlmMessage::user("does this contain a claim?")], 100, 0.0)
            .await
            .unwrap();
        assert_eq!(content, "{\"is_relevant\": true}");
    }

    #[tokio::test]
    async fn test_complete_maps_http_error_to_provider_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .create_async()
            .await;

        let client = LlmClient::new(&server.url(), None, "gpt-5-mini", 5);
        let result = client.complete(&[LlmMessage::user("hello")], 10, 0.0).await;
        assert!(matches!(result, Err(NodeError::ProviderUnavailable(_))));
    }
}
