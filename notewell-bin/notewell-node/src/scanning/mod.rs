pub mod relevance_filter;
pub mod scan_pipeline;
pub mod scan_types;
