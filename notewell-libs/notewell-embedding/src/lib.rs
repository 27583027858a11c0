pub mod embedding_errors;
pub mod embedding_generator;
pub mod mock_generator;
pub mod model_type;
