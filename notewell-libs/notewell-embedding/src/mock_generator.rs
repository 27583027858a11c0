use crate::embedding_errors::EmbeddingError;
use crate::embedding_generator::EmbeddingGenerator;
use crate::model_type::EmbeddingModelType;
use async_trait::async_trait;

/// Deterministic generator for tests. Vectors are derived from the input text
/// so that identical texts are identical vectors and unrelated texts diverge,
/// which lets tests steer cosine similarity without a live provider.
#[derive(Clone)]
pub struct MockGenerator {
    model_type: EmbeddingModelType,
    num_embeddings: usize,
}

impl MockGenerator {
    pub fn new(model_type: EmbeddingModelType, num_embeddings: usize) -> Self {
        MockGenerator {
            model_type,
            num_embeddings,
        }
    }

    fn pseudo_embedding(&self, input_string: &str) -> Vec<f32> {
        let mut state: u64 = 0xcbf29ce484222325;
        for byte in input_string.as_bytes() {
            state ^= *byte as u64;
            state = state.wrapping_mul(0x100000001b3);
        }
        let mut values = Vec::with_capacity(self.num_embeddings);
        for i in 0..self.num_embeddings {
            let mut x = state.wrapping_add(i as u64).wrapping_mul(0x9e3779b97f4a7c15);
            x ^= x >> 33;
            values.push(((x % 2000) as f32 / 1000.0) - 1.0);
        }
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in values.iter_mut() {
                *v /= norm;
            }
        }
        values
    }
}

#[async_trait]
impl EmbeddingGenerator for MockGenerator {
    fn model_type(&self) -> EmbeddingModelType {
        self.model_type.clone()
    }

    fn box_clone(&self) -> Box<dyn EmbeddingGenerator> {
        Box::new((*self).clone())
    }

    async fn generate_embedding(&self, input_string: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.pseudo_embedding(input_string))
    }

    async fn generate_embeddings(&self, input_strings: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(input_strings.iter().map(|s| self.pseudo_embedding(s)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_type::OpenAITextEmbedding;

    #[tokio::test]
    async fn test_mock_generator_is_deterministic() {
        let generator = MockGenerator::new(
            EmbeddingModelType::OpenAITextEmbedding(OpenAITextEmbedding::TextEmbedding3Small),
            64,
        );
        let a = generator.generate_embedding("the same text").await.unwrap();
        let b = generator.generate_embedding("the same text").await.unwrap();
        let c = generator.generate_embedding("different text").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
