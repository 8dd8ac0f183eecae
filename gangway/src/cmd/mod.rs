//! Subcommand implementations.

pub mod check;
pub mod deploy;
pub mod status;
