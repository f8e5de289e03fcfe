//! Package command - build artifacts for every target

use anyhow::Result;
use clap::Args;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use lambda_ship_core::{run_package, CommandRunner, DeployContext, PackageBuilder};

#[derive(Args)]
pub struct PackageCommand;

impl PackageCommand {
    pub async fn execute(&self, ctx: &DeployContext, runner: &dyn CommandRunner, json: bool) -> Result<()> {
        let builder = PackageBuilder::new(ctx, runner);

        if !json {
            println!(
                "{} Packaging {} target(s) at {}...\n",
                "⏳".cyan(),
                ctx.config.targets().len(),
                ctx.commit()
            );
        }

        let report = run_package(ctx, &builder).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        } else {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Target", "Status", "Artifact"]);

            for (name, result) in &report.entries {
                match result {
                    Ok(artifact) => table.add_row(vec![
                        Cell::new(name),
                        Cell::new("✓ built").fg(Color::Green),
                        Cell::new(artifact.path.display()),
                    ]),
                    Err(e) => table.add_row(vec![
                        Cell::new(name),
                        Cell::new("✗ failed").fg(Color::Red),
                        Cell::new(e),
                    ]),
                };
            }

            println!("{table}");
        }

        if report.has_failures() {
            let failed = report.entries.iter().filter(|(_, r)| r.is_err()).count();
            anyhow::bail!("{} of {} packages failed to build", failed, report.entries.len());
        }

        Ok(())
    }
}
