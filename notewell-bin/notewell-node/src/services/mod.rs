pub mod embedding_service;
pub mod llm_client;
pub mod moderation;
