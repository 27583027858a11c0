pub mod api_v2_handlers_bulk_scans;
pub mod api_v2_handlers_chunks;
pub mod api_v2_handlers_maintenance;
pub mod api_v2_handlers_monitored_channels;
pub mod api_v2_handlers_previously_seen;
pub mod api_v2_handlers_ratings;
pub mod api_v2_router;
