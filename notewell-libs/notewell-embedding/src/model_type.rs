use crate::embedding_errors::EmbeddingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The embedding models the node knows how to talk to. The provider string is
/// persisted next to every stored vector so that stale vectors can be detected
/// when a community switches models.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingModelType {
    OpenAITextEmbedding(OpenAITextEmbedding),
    OllamaTextEmbeddingsInference(OllamaTextEmbeddingsInference),
}

impl EmbeddingModelType {
    pub fn provider_name(&self) -> &'static str {
        match self {
            EmbeddingModelType::OpenAITextEmbedding(_) => "openai",
            EmbeddingModelType::OllamaTextEmbeddingsInference(_) => "ollama",
        }
    }

    /// Maximum number of input characters accepted before truncation.
    pub fn max_input_token_count(&self) -> usize {
        match self {
            EmbeddingModelType::OpenAITextEmbedding(_) => 8190,
            EmbeddingModelType::OllamaTextEmbeddingsInference(model) => model.max_input_token_count(),
        }
    }

    pub fn vector_dimensions(&self) -> Result<usize, EmbeddingError> {
        match self {
            EmbeddingModelType::OpenAITextEmbedding(model) => model.vector_dimensions(),
            EmbeddingModelType::OllamaTextEmbeddingsInference(model) => model.vector_dimensions(),
        }
    }
}

impl fmt::Display for EmbeddingModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingModelType::OpenAITextEmbedding(model) => write!(f, "{}", model),
            EmbeddingModelType::OllamaTextEmbeddingsInference(model) => write!(f, "{}", model),
        }
    }
}

impl FromStr for EmbeddingModelType {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(model) = OpenAITextEmbedding::from_str(s) {
            return Ok(EmbeddingModelType::OpenAITextEmbedding(model));
        }
        if let Ok(model) = OllamaTextEmbeddingsInference::from_str(s) {
            return Ok(EmbeddingModelType::OllamaTextEmbeddingsInference(model));
        }
        Err(EmbeddingError::InvalidModelArchitecture)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpenAITextEmbedding {
    TextEmbedding3Small,
    TextEmbedding3Large,
    Ada002,
}

impl OpenAITextEmbedding {
    pub fn vector_dimensions(&self) -> Result<usize, EmbeddingError> {
        match self {
            OpenAITextEmbedding::TextEmbedding3Small => Ok(1536),
            OpenAITextEmbedding::TextEmbedding3Large => Ok(3072),
            OpenAITextEmbedding::Ada002 => Ok(1536),
        }
    }
}

impl fmt::Display for OpenAITextEmbedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenAITextEmbedding::TextEmbedding3Small => write!(f, "text-embedding-3-small"),
            OpenAITextEmbedding::TextEmbedding3Large => write!(f, "text-embedding-3-large"),
            OpenAITextEmbedding::Ada002 => write!(f, "text-embedding-ada-002"),
        }
    }
}

impl FromStr for OpenAITextEmbedding {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text-embedding-3-small" => Ok(OpenAITextEmbedding::TextEmbedding3Small),
            "text-embedding-3-large" => Ok(OpenAITextEmbedding::TextEmbedding3Large),
            "text-embedding-ada-002" => Ok(OpenAITextEmbedding::Ada002),
            _ => Err(EmbeddingError::InvalidModelArchitecture),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OllamaTextEmbeddingsInference {
    SnowflakeArcticEmbedM,
    AllMiniLML6v2,
}

impl OllamaTextEmbeddingsInference {
    pub fn max_input_token_count(&self) -> usize {
        match self {
            OllamaTextEmbeddingsInference::SnowflakeArcticEmbedM => 510,
            OllamaTextEmbeddingsInference::AllMiniLML6v2 => 510,
        }
    }

    pub fn vector_dimensions(&self) -> Result<usize, EmbeddingError> {
        match self {
            OllamaTextEmbeddingsInference::SnowflakeArcticEmbedM => Ok(768),
            OllamaTextEmbeddingsInference::AllMiniLML6v2 => Ok(384),
        }
    }
}

impl fmt::Display for OllamaTextEmbeddingsInference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OllamaTextEmbeddingsInference::SnowflakeArcticEmbedM => {
                write!(f, "snowflake-arctic-embed:xs")
            }
            OllamaTextEmbeddingsInference::AllMiniLML6v2 => write!(f, "all-minilm:l6-v2"),
        }
    }
}

impl FromStr for OllamaTextEmbeddingsInference {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snowflake-arctic-embed:xs" => Ok(OllamaTextEmbeddingsInference::SnowflakeArcticEmbedM),
            "all-minilm:l6-v2" => Ok(OllamaTextEmbeddingsInference::AllMiniLML6v2),
            _ => Err(EmbeddingError::InvalidModelArchitecture),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_round_trip() {
        let model = EmbeddingModelType::OpenAITextEmbedding(OpenAITextEmbedding::TextEmbedding3Small);
        let parsed = EmbeddingModelType::from_str(&model.to_string()).unwrap();
        assert_eq!(model, parsed);
        assert_eq!(parsed.vector_dimensions().unwrap(), 1536);
        assert_eq!(parsed.provider_name(), "openai");
    }

    #[test]
    fn test_unknown_model_fails() {
        assert!(EmbeddingModelType::from_str("definitely-not-a-model").is_err());
    }
}
