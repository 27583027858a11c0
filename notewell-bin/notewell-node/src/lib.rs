pub mod auth;
pub mod network;
pub mod previously_seen;
pub mod scanning;
pub mod scoring;
pub mod services;
pub mod utils;
pub mod workflows;
