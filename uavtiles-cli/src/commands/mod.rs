//! Subcommand implementations.

pub mod config;
pub mod datasets;
pub mod info;
pub mod serve;
