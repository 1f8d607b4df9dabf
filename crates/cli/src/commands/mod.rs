//! Subcommand implementations

pub mod explain;
pub mod rules;
