//! Targets command - list configured deployment targets

use anyhow::Result;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use lambda_ship_core::{CommandRunner, DeployContext, PackageBuilder};

#[derive(Args)]
pub struct TargetsCommand;

impl TargetsCommand {
    pub fn execute(&self, ctx: &DeployContext, runner: &dyn CommandRunner, json: bool) -> Result<()> {
        let builder = PackageBuilder::new(ctx, runner);
        let targets = ctx.config.targets();

        if json {
            let json_targets: Vec<_> = targets
                .iter()
                .map(|t| {
                    let path = builder.artifact_path(t);
                    serde_json::json!({
                        "name": t.name,
                        "package_json": t.manifest_override,
                        "artifact": path.display().to_string(),
                        "cached": path.exists(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json_targets)?);
        } else {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Target", "Dependency manifest", "Package"]);

            for target in targets {
                let manifest = target
                    .manifest_override
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "package.json".to_string());
                let path = builder.artifact_path(target);
                let package = if path.exists() {
                    Cell::new(path.display()).fg(Color::Green)
                } else {
                    Cell::new("not built").fg(Color::Yellow)
                };
                table.add_row(vec![Cell::new(&target.name), Cell::new(manifest), package]);
            }

            println!("{table}");
            println!();
            println!("{} target(s) at commit {}", targets.len(), ctx.commit());
        }

        Ok(())
    }
}
