//! CLI subcommands

pub mod deploy;
pub mod package;
pub mod targets;
pub mod version;
