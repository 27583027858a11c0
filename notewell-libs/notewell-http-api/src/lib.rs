pub mod api_v2;
pub mod error;
pub mod jsonapi;
pub mod node_commands;
pub mod schemas;
