//! Version command - show version information

use anyhow::Result;
use clap::Args;
use colored::*;

#[derive(Args)]
pub struct VersionCommand;

impl VersionCommand {
    pub fn execute(&self) -> Result<()> {
        println!("{} {}", "Lambda Ship".bold(), env!("CARGO_PKG_VERSION").green());
        println!();
        println!("  {} {}", "Default alias:".cyan(), lambda_ship_core::DEFAULT_ALIAS);
        println!("  {} {}", "Project file:".cyan(), lambda_ship_core::DEFAULT_CONFIG_FILE);
        println!("  {} {}", "Target platform:".cyan(), std::env::consts::OS);

        Ok(())
    }
}
