/// Shared helpers for driving external CLIs
pub mod command;
pub mod polling;
