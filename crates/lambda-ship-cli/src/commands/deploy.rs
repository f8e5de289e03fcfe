//! Deploy command - package, push, publish and activate every target

use anyhow::Result;
use clap::Args;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use lambda_ship_core::{
    announce_if_needed, run_deploy, AnnounceOutcome, AwsPlatform, CommandRunner, DeployContext,
    DeployOptions, DeployOutcome, FunctionClient, NotifyDecision, PackageBuilder, RunReport,
    SlackNotifier, DEFAULT_ALIAS,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Args)]
pub struct DeployCommand {
    /// Deploy even if the alias already serves this commit
    #[arg(short, long)]
    force: bool,

    /// Alias to repoint at the new version
    #[arg(short, long, default_value = DEFAULT_ALIAS)]
    alias: String,
}

impl DeployCommand {
    pub async fn execute(&self, ctx: &DeployContext, runner: &dyn CommandRunner, json: bool) -> Result<()> {
        if !json {
            if let Some(profile) = &ctx.settings.aws_profile {
                println!("{} Deploying with AWS profile {}", "⏳".cyan(), profile.as_str().bold());
            }
        }

        let platform = Arc::new(AwsPlatform::new(ctx.config.region()).await);
        let client = FunctionClient::new(platform.clone());
        let builder = PackageBuilder::new(ctx, runner);
        let options = DeployOptions {
            force: self.force,
            alias: self.alias.clone(),
        };

        let report = run_deploy(ctx, &builder, &client, &options).await;

        if !json {
            print_report(&report);
        }

        let notifier = SlackNotifier::new(ctx, runner)?;
        let decision = announce_if_needed(&report, &ctx.settings, platform.as_ref(), &notifier).await;

        if json {
            let mut output = report.to_json();
            output["announcement"] = decision_json(&decision);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_decision(&decision);
        }

        if report.has_failures() {
            anyhow::bail!(
                "{} of {} targets failed to deploy",
                report.failure_count(),
                report.targets.len()
            );
        }

        Ok(())
    }
}

fn print_report(report: &RunReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Target", "Status", "Version", "Details"]);

    for target in &report.targets {
        let row = match &target.outcome {
            DeployOutcome::Deployed { version_id } => vec![
                Cell::new(&target.target),
                Cell::new("✓ deployed").fg(Color::Green),
                Cell::new(version_id),
                Cell::new(format!("{} → {}", report.alias, version_id)),
            ],
            DeployOutcome::Cancelled => vec![
                Cell::new(&target.target),
                Cell::new("= up to date").fg(Color::Yellow),
                Cell::new(""),
                Cell::new(format!("{} already serves {}", report.alias, report.commit)),
            ],
            DeployOutcome::Failed(e) => vec![
                Cell::new(&target.target),
                Cell::new("✗ failed").fg(Color::Red),
                Cell::new(""),
                Cell::new(e),
            ],
        };
        table.add_row(row);
    }

    println!("{table}");

    let deployed = report.deployed_targets().len();
    let total = report.targets.len();
    println!();
    if report.has_failures() {
        println!("{} {}/{} targets failed", "✗".red().bold(), report.failure_count(), total);
    } else if deployed == 0 {
        println!("{} Everything already deployed (use --force to redeploy)", "✓".green().bold());
    } else {
        println!("{} {}/{} targets deployed", "✓".green().bold(), deployed, total);
    }
}

fn print_decision(decision: &NotifyDecision) {
    match decision {
        NotifyDecision::NothingDeployed => {}
        NotifyDecision::DevAccount(account) => {
            println!("{} Deployed from development account {}, no announcement", "ℹ".cyan(), account);
        }
        NotifyDecision::Announced(AnnounceOutcome::Sent(text)) => {
            println!("{} Sent DRI announcement: {}", "✓".green(), text);
        }
        NotifyDecision::Announced(AnnounceOutcome::PrintedForRelay(text)) => {
            println!("{} No webhook configured, post this announcement manually:", "⚠".yellow());
            println!();
            println!("{}", text);
        }
        NotifyDecision::Failed(reason) => {
            println!("{} Could not notify DRI channel: {}", "⚠".yellow(), reason);
            println!("  Don't forget to post an announcement there.");
        }
    }
}

fn decision_json(decision: &NotifyDecision) -> serde_json::Value {
    match decision {
        NotifyDecision::NothingDeployed => json!({ "status": "skipped", "reason": "nothing deployed" }),
        NotifyDecision::DevAccount(account) => {
            json!({ "status": "skipped", "reason": "development account", "account": account })
        }
        NotifyDecision::Announced(AnnounceOutcome::Sent(text)) => json!({ "status": "sent", "text": text }),
        NotifyDecision::Announced(AnnounceOutcome::PrintedForRelay(text)) => {
            json!({ "status": "relay", "text": text })
        }
        NotifyDecision::Failed(reason) => json!({ "status": "failed", "reason": reason }),
    }
}
