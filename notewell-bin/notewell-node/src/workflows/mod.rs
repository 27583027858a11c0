pub mod batch_job_adapter;
pub mod circuit_breaker;
pub mod engine;
pub mod import_workflow;
pub mod note_writer;
pub mod outbox_publisher;
pub mod rechunk_workflow;
pub mod scoring_workflow;
pub mod token_gate;
