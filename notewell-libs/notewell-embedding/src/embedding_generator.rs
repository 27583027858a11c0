use crate::embedding_errors::EmbeddingError;
use crate::model_type::EmbeddingModelType;
use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::ClientBuilder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

lazy_static! {
    pub static ref DEFAULT_EMBEDDINGS_SERVER_URL: &'static str = "https://api.openai.com/";
    pub static ref DEFAULT_EMBEDDINGS_LOCAL_URL: &'static str = "http://localhost:11434/";
}

const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_RETRIES: u32 = 3;

/// A trait for types that can generate embeddings from text.
#[async_trait]
pub trait EmbeddingGenerator: Sync + Send {
    fn model_type(&self) -> EmbeddingModelType;
    fn box_clone(&self) -> Box<dyn EmbeddingGenerator>;

    /// Generates an embedding from the given input string.
    async fn generate_embedding(&self, input_string: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generates embeddings from the given list of input strings, batching
    /// whenever the provider supports it.
    async fn generate_embeddings(&self, input_strings: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEmbeddingGenerator {
    pub model_type: EmbeddingModelType,
    pub api_url: String,
    pub api_key: Option<String>,
}

#[async_trait]
impl EmbeddingGenerator for RemoteEmbeddingGenerator {
    fn model_type(&self) -> EmbeddingModelType {
        self.model_type.clone()
    }

    /// Clones self and wraps it in a Box
    fn box_clone(&self) -> Box<dyn EmbeddingGenerator> {
        Box::new(self.clone())
    }

    /// Generate an Embedding for an input string by using the external API.
    async fn generate_embedding(&self, input_string: &str) -> Result<Vec<f32>, EmbeddingError> {
        let input_strings = [input_string.to_string()];
        let results = self.generate_embeddings(&input_strings).await?;
        match results.into_iter().next() {
            Some(embedding) => Ok(embedding),
            None => Err(EmbeddingError::FailedEmbeddingGeneration(
                "No results returned from the embedding generation".to_string(),
            )),
        }
    }

    /// Generate Embeddings for a list of input strings by using the external
    /// API. Inputs longer than the model limit are truncated before sending.
    async fn generate_embeddings(&self, input_strings: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let input_strings: Vec<String> = input_strings
            .iter()
            .map(|s| s.chars().take(self.model_type.max_input_token_count()).collect())
            .collect();

        match &self.model_type {
            EmbeddingModelType::OpenAITextEmbedding(_) => self.generate_embeddings_open_ai(&input_strings).await,
            EmbeddingModelType::OllamaTextEmbeddingsInference(model) => {
                let model = model.to_string();
                let mut embeddings = Vec::new();
                for input_string in input_strings.iter() {
                    let embedding = self.generate_embedding_ollama(input_string, &model).await?;
                    embeddings.push(embedding);
                }
                Ok(embeddings)
            }
        }
    }
}

impl RemoteEmbeddingGenerator {
    /// Create a RemoteEmbeddingGenerator
    pub fn new(model_type: EmbeddingModelType, api_url: &str, api_key: Option<String>) -> RemoteEmbeddingGenerator {
        RemoteEmbeddingGenerator {
            model_type,
            api_url: api_url.to_string(),
            api_key,
        }
    }

    /// String of the main endpoint url for generating embeddings via an
    /// OpenAI-compatible server
    fn open_ai_endpoint_url(&self) -> String {
        if self.api_url.ends_with('/') {
            format!("{}v1/embeddings", self.api_url)
        } else {
            format!("{}/v1/embeddings", self.api_url)
        }
    }

    /// String of the main endpoint url for generating embeddings via an
    /// Ollama server
    fn ollama_endpoint_url(&self) -> String {
        if self.api_url.ends_with('/') {
            format!("{}api/embeddings", self.api_url)
        } else {
            format!("{}/api/embeddings", self.api_url)
        }
    }

    /// Generates embeddings using an OpenAI-compatible embeddings endpoint.
    /// Transport failures are retried up to MAX_RETRIES with linear backoff;
    /// anything else surfaces immediately.
    async fn generate_embeddings_open_ai(&self, input_strings: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request_body = EmbeddingArrayRequestBody {
            input: input_strings.to_vec(),
            model: self.model_type.to_string(),
        };

        let timeout = Duration::from_secs(REQUEST_TIMEOUT_SECS);
        let client = ClientBuilder::new().timeout(timeout).build()?;

        let mut retry_count = 0;
        loop {
            let mut request = client
                .post(self.open_ai_endpoint_url())
                .header("Content-Type", "application/json")
                .json(&request_body);

            if let Some(api_key) = &self.api_key {
                request = request.header("Authorization", format!("Bearer {}", api_key));
            }

            let response = request.send().await;

            match response {
                Ok(response) if response.status().is_success() => {
                    let embedding_response: EmbeddingResponse = response.json().await.map_err(|err| {
                        EmbeddingError::RequestFailed(format!("Failed to deserialize response JSON: {}", err))
                    })?;
                    let mut data = embedding_response.data;
                    data.sort_by_key(|d| d.index);
                    return Ok(data.into_iter().map(|d| d.embedding).collect());
                }
                Ok(response) => {
                    return Err(EmbeddingError::RequestFailed(format!(
                        "HTTP request failed with status: {}",
                        response.status()
                    )));
                }
                Err(err) if err.is_timeout() || err.is_connect() => {
                    if retry_count < MAX_RETRIES {
                        retry_count += 1;
                        tokio::time::sleep(Duration::from_secs(retry_count as u64)).await;
                        continue;
                    }
                    return Err(EmbeddingError::ProviderUnavailable(format!(
                        "HTTP request failed after {} retries: {}",
                        MAX_RETRIES, err
                    )));
                }
                Err(err) => {
                    return Err(EmbeddingError::RequestFailed(format!("HTTP request failed: {}", err)));
                }
            }
        }
    }

    /// Generates an embedding using an Ollama server.
    async fn generate_embedding_ollama(&self, input_string: &str, model: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request_body = OllamaEmbeddingsRequestBody {
            model: model.to_string(),
            prompt: input_string.to_string(),
        };

        let timeout = Duration::from_secs(REQUEST_TIMEOUT_SECS);
        let client = ClientBuilder::new().timeout(timeout).build()?;

        let mut retry_count = 0;
        loop {
            let mut request = client
                .post(self.ollama_endpoint_url())
                .header("Content-Type", "application/json")
                .json(&request_body);

            if let Some(api_key) = &self.api_key {
                request = request.header("Authorization", format!("Bearer {}", api_key));
            }

            let response = request.send().await;

            match response {
                Ok(response) if response.status().is_success() => {
                    let embedding_response: OllamaEmbeddingsResponse = response.json().await.map_err(|err| {
                        EmbeddingError::RequestFailed(format!("Failed to deserialize response JSON: {}", err))
                    })?;
                    return Ok(embedding_response.embedding);
                }
                Ok(response) => {
                    return Err(EmbeddingError::RequestFailed(format!(
                        "HTTP request failed with status: {}",
                        response.status()
                    )));
                }
                Err(err) if err.is_timeout() || err.is_connect() => {
                    if retry_count < MAX_RETRIES {
                        retry_count += 1;
                        tokio::time::sleep(Duration::from_secs(retry_count as u64)).await;
                        continue;
                    }
                    return Err(EmbeddingError::ProviderUnavailable(format!(
                        "HTTP request failed after {} retries: {}",
                        MAX_RETRIES, err
                    )));
                }
                Err(err) => {
                    return Err(EmbeddingError::RequestFailed(format!("HTTP request failed: {}", err)));
                }
            }
        }
    }
}

#[derive(Serialize)]
struct EmbeddingArrayRequestBody {
    input: Vec<String>,
    model: String,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct EmbeddingResponseData {
    embedding: Vec<f32>,
    index: usize,
    object: String,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct EmbeddingResponse {
    object: String,
    model: String,
    data: Vec<EmbeddingResponseData>,
    usage: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingsRequestBody {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct OllamaEmbeddingsResponse {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_type::OpenAITextEmbedding;

    #[tokio::test]
    async fn test_open_ai_embedding_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "object": "list",
                    "model": "text-embedding-3-small",
                    "data": [
                        {"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}
                    ],
                    "usage": {"prompt_tokens": 3, "total_tokens": 3}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let generator = RemoteEmbeddingGenerator::new(
            EmbeddingModelType::OpenAITextEmbedding(OpenAITextEmbedding::TextEmbedding3Small),
            &server.url(),
            Some("test-key".to_string()),
        );

        let embedding = generator.generate_embedding("hello world").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_open_ai_embedding_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(500)
            .create_async()
            .await;

        let generator = RemoteEmbeddingGenerator::new(
            EmbeddingModelType::OpenAITextEmbedding(OpenAITextEmbedding::TextEmbedding3Small),
            &server.url(),
            None,
        );

        let result = generator.generate_embedding("hello world").await;
        assert!(matches!(result, Err(EmbeddingError::RequestFailed(_))));
    }
}
