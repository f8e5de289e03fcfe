//! Run-level orchestration: package and deploy every target concurrently,
//! aggregate the outcomes, then decide whether to announce.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::Settings;
use crate::context::DeployContext;
use crate::deploy::{DeployOptions, DeployOutcome, Deployer};
use crate::error::Result;
use crate::notify::{AnnounceOutcome, Notifier};
use crate::package::{Artifact, PackageBuilder};
use crate::remote::{CallerIdentity, FunctionClient};

/// Result of the `package` phase for every target
#[derive(Debug)]
pub struct PackageReport {
    pub commit: String,
    pub entries: Vec<(String, Result<Artifact>)>,
    pub finished_at: DateTime<Utc>,
}

impl PackageReport {
    pub fn has_failures(&self) -> bool {
        self.entries.iter().any(|(_, result)| result.is_err())
    }

    pub fn to_json(&self) -> Value {
        let targets: Vec<Value> = self
            .entries
            .iter()
            .map(|(name, result)| match result {
                Ok(artifact) => json!({
                    "target": name,
                    "status": "built",
                    "artifact": artifact.path.display().to_string(),
                }),
                Err(e) => json!({
                    "target": name,
                    "status": "failed",
                    "error": e.to_string(),
                }),
            })
            .collect();

        json!({
            "commit": self.commit,
            "targets": targets,
            "finished_at": self.finished_at.to_rfc3339(),
        })
    }
}

/// Outcome of one target in a deploy run
#[derive(Debug)]
pub struct TargetReport {
    pub target: String,
    pub artifact: Option<Artifact>,
    pub outcome: DeployOutcome,
}

#[derive(Debug)]
pub struct RunReport {
    pub commit: String,
    pub alias: String,
    pub targets: Vec<TargetReport>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Targets that actually got a new version, in configuration order
    pub fn deployed_targets(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter(|t| t.outcome.did_deploy())
            .map(|t| t.target.clone())
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.targets.iter().any(|t| t.outcome.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.targets.iter().filter(|t| t.outcome.is_failure()).count()
    }

    pub fn to_json(&self) -> Value {
        let targets: Vec<Value> = self
            .targets
            .iter()
            .map(|t| {
                let (status, version, error) = match &t.outcome {
                    DeployOutcome::Deployed { version_id } => ("deployed", Some(version_id.clone()), None),
                    DeployOutcome::Cancelled => ("up_to_date", None, None),
                    DeployOutcome::Failed(e) => ("failed", None, Some(e.to_string())),
                };
                json!({
                    "target": t.target,
                    "status": status,
                    "version": version,
                    "error": error,
                    "artifact": t.artifact.as_ref().map(|a| a.path.display().to_string()),
                })
            })
            .collect();

        json!({
            "commit": self.commit,
            "alias": self.alias,
            "targets": targets,
            "finished_at": self.finished_at.to_rfc3339(),
        })
    }
}

pub async fn run_package(ctx: &DeployContext, builder: &PackageBuilder<'_>) -> PackageReport {
    let entries = builder
        .build_all()
        .await
        .into_iter()
        .map(|(target, result)| (target.name, result))
        .collect();

    PackageReport {
        commit: ctx.commit().to_string(),
        entries,
        finished_at: Utc::now(),
    }
}

/// Package then deploy each target; targets progress independently.
pub async fn run_deploy(
    ctx: &DeployContext,
    builder: &PackageBuilder<'_>,
    client: &FunctionClient,
    options: &DeployOptions,
) -> RunReport {
    let deployer = Deployer::new(client);

    let runs = ctx.config.targets().iter().map(|target| {
        let deployer = &deployer;
        async move {
            let artifact = match builder.build(target).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    warn!(target = %target.name, error = %e, "Packaging failed");
                    return TargetReport {
                        target: target.name.clone(),
                        artifact: None,
                        outcome: DeployOutcome::Failed(e.during("package")),
                    };
                }
            };

            let outcome = deployer.deploy(target, &artifact, options).await;
            TargetReport {
                target: target.name.clone(),
                artifact: Some(artifact),
                outcome,
            }
        }
    });

    let targets = join_all(runs).await;

    RunReport {
        commit: ctx.commit().to_string(),
        alias: options.alias.clone(),
        targets,
        finished_at: Utc::now(),
    }
}

/// What the notification gate decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyDecision {
    NothingDeployed,
    DevAccount(String),
    Announced(AnnounceOutcome),
    /// Announcement failed; the operator has to post it by hand.
    Failed(String),
}

/// Announce once for the whole run, unless nothing shipped or the caller is the dev account.
pub async fn announce_if_needed(
    report: &RunReport,
    settings: &Settings,
    identity: &dyn CallerIdentity,
    notifier: &dyn Notifier,
) -> NotifyDecision {
    let deployed = report.deployed_targets();
    if deployed.is_empty() {
        info!("No target was deployed, skipping announcement");
        return NotifyDecision::NothingDeployed;
    }

    if let Some(dev_account) = settings.dev_account.as_deref() {
        match identity.account_id().await {
            Ok(account) if account == dev_account => {
                info!(account = %account, "Deployed from the development account, skipping announcement");
                return NotifyDecision::DevAccount(account);
            }
            Ok(_) => {}
            Err(e) => return notify_failed(e.to_string()),
        }
    }

    match notifier.announce(&deployed, &report.commit).await {
        Ok(outcome) => NotifyDecision::Announced(outcome),
        Err(e) => notify_failed(e.to_string()),
    }
}

fn notify_failed(reason: String) -> NotifyDecision {
    warn!("Could not notify DRI channel: {}", reason);
    warn!("Don't forget to post an announcement there.");
    NotifyDecision::Failed(reason)
}
