pub mod node;
pub mod node_commands_maintenance;
pub mod node_commands_notes;
pub mod node_commands_scans;
pub mod node_error;
