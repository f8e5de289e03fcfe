//! Per-target deployment state machine
//!
//! Lookup → decision gate → push → publish → activate. A target whose alias
//! already points at a version built from the artifact's commit is
//! cancelled before any mutating call, unless forced.

use tracing::{info, warn};

use crate::config::DeploymentTarget;
use crate::error::{Result, ShipError};
use crate::package::Artifact;
use crate::remote::{FunctionClient, RemoteVersion};

pub const DEFAULT_ALIAS: &str = "active";

#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Deploy even when the alias already serves this commit
    pub force: bool,
    pub alias: String,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            force: false,
            alias: DEFAULT_ALIAS.to_string(),
        }
    }
}

/// Terminal state of one target's deployment
#[derive(Debug)]
pub enum DeployOutcome {
    Deployed { version_id: String },
    Cancelled,
    Failed(ShipError),
}

impl DeployOutcome {
    pub fn did_deploy(&self) -> bool {
        matches!(self, DeployOutcome::Deployed { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DeployOutcome::Failed(_))
    }
}

pub struct Deployer<'a> {
    client: &'a FunctionClient,
}

impl<'a> Deployer<'a> {
    pub fn new(client: &'a FunctionClient) -> Self {
        Self { client }
    }

    pub async fn deploy(
        &self,
        target: &DeploymentTarget,
        artifact: &Artifact,
        options: &DeployOptions,
    ) -> DeployOutcome {
        match self.try_deploy(target, artifact, options).await {
            Ok(Some(version_id)) => {
                info!(
                    target = %target.name,
                    alias = %options.alias,
                    version = %version_id,
                    commit = %artifact.commit,
                    "Deployed"
                );
                DeployOutcome::Deployed { version_id }
            }
            Ok(None) => {
                info!(
                    target = %target.name,
                    alias = %options.alias,
                    commit = %artifact.commit,
                    "Already deployed, nothing to do (use --force to redeploy)"
                );
                DeployOutcome::Cancelled
            }
            Err(e) => {
                warn!(target = %target.name, error = %e, "Deployment failed");
                DeployOutcome::Failed(e)
            }
        }
    }

    /// `Ok(None)` when the gate cancels the deployment.
    async fn try_deploy(
        &self,
        target: &DeploymentTarget,
        artifact: &Artifact,
        options: &DeployOptions,
    ) -> Result<Option<String>> {
        let function = target.name.as_str();

        let current = self.current_version(function, &options.alias).await?;
        if let Some(version) = &current {
            if version.description == artifact.commit && !options.force {
                return Ok(None);
            }
        }

        let zip = tokio::fs::read(&artifact.path)
            .await
            .map_err(|e| ShipError::from(e).during("read artifact"))?;

        self.client.update_code(function, zip).await?;
        let version = self.client.publish_version(function, &artifact.commit).await?;
        self.client
            .update_alias(function, &options.alias, &version.version_id)
            .await?;

        Ok(Some(version.version_id))
    }

    /// Version the alias points at; the alias itself must exist.
    async fn current_version(&self, function: &str, alias: &str) -> Result<Option<RemoteVersion>> {
        let aliases = self.client.list_aliases(function).await?;
        let alias = aliases
            .into_iter()
            .find(|a| a.name == alias)
            .ok_or_else(|| {
                ShipError::Remote(format!("alias `{}` not found on function {}", alias, function))
            })?;

        let versions = self.client.list_versions(function).await?;
        Ok(versions.into_iter().find(|v| v.version_id == alias.version_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::remote::UpdateStatus;
    use crate::testing::FakeFunctionApi;
    use std::path::Path;
    use std::sync::Arc;

    const COMMIT: &str = "9fceb02d0ae598e95dc970b74767f19372d61af8";

    fn artifact(dir: &Path) -> Artifact {
        let path = dir.join(format!("billing_{COMMIT}.zip"));
        std::fs::write(&path, b"PK-zip").unwrap();
        Artifact {
            target_name: "billing".to_string(),
            commit: COMMIT.to_string(),
            path,
        }
    }

    fn deployed_api() -> FakeFunctionApi {
        FakeFunctionApi::new()
            .with_alias_pages(vec![vec![("active", "4")]])
            .with_version_pages(vec![vec![("3", "old"), ("4", COMMIT)]])
    }

    #[tokio::test]
    async fn test_cancels_when_alias_serves_commit() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(deployed_api());
        let client = FunctionClient::new(api.clone());
        let target = DeploymentTarget::new("billing");

        let outcome = Deployer::new(&client)
            .deploy(&target, &artifact(dir.path()), &DeployOptions::default())
            .await;

        assert!(matches!(outcome, DeployOutcome::Cancelled));
        assert!(!outcome.did_deploy());
        assert!(api.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_force_redeploys_same_commit() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(deployed_api());
        let client = FunctionClient::new(api.clone());
        let target = DeploymentTarget::new("billing");
        let options = DeployOptions {
            force: true,
            ..DeployOptions::default()
        };

        let outcome = Deployer::new(&client)
            .deploy(&target, &artifact(dir.path()), &options)
            .await;

        assert!(outcome.did_deploy());
        assert_eq!(
            api.mutations(),
            vec![
                "update_code billing 6 bytes".to_string(),
                format!("publish_version billing {COMMIT}"),
                "update_alias billing active 5".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_only_after_update_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(
            FakeFunctionApi::new()
                .with_alias_pages(vec![vec![("active", "2")]])
                .with_version_pages(vec![vec![("2", "bbb")]])
                .with_statuses(vec![UpdateStatus::InProgress, UpdateStatus::InProgress]),
        );
        let client = FunctionClient::new(api.clone());
        let target = DeploymentTarget::new("billing");

        let outcome = Deployer::new(&client)
            .deploy(&target, &artifact(dir.path()), &DeployOptions::default())
            .await;

        assert!(outcome.did_deploy());
        assert_eq!(api.status_polls(), 3);
        assert_eq!(
            api.journal(),
            vec![
                "update_code billing 6 bytes".to_string(),
                "status billing InProgress".to_string(),
                "status billing InProgress".to_string(),
                "status billing Successful".to_string(),
                format!("publish_version billing {COMMIT}"),
                "update_alias billing active 3".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_deploys_new_commit() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(
            FakeFunctionApi::new()
                .with_alias_pages(vec![vec![("active", "2")]])
                .with_version_pages(vec![vec![("1", "aaa")], vec![("2", "bbb")]]),
        );
        let client = FunctionClient::new(api.clone());
        let target = DeploymentTarget::new("billing");

        let outcome = Deployer::new(&client)
            .deploy(&target, &artifact(dir.path()), &DeployOptions::default())
            .await;

        match outcome {
            DeployOutcome::Deployed { version_id } => assert_eq!(version_id, "3"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(api.mutations().len(), 3);
    }

    #[tokio::test]
    async fn test_custom_alias_is_repointed() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(
            FakeFunctionApi::new()
                .with_alias_pages(vec![vec![("active", "4"), ("canary", "3")]])
                .with_version_pages(vec![vec![("3", "old"), ("4", COMMIT)]]),
        );
        let client = FunctionClient::new(api.clone());
        let target = DeploymentTarget::new("billing");
        let options = DeployOptions {
            force: false,
            alias: "canary".to_string(),
        };

        let outcome = Deployer::new(&client)
            .deploy(&target, &artifact(dir.path()), &options)
            .await;

        assert!(outcome.did_deploy());
        assert_eq!(api.mutations()[2], "update_alias billing canary 5");
    }

    #[tokio::test]
    async fn test_missing_alias_fails_before_mutating() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(
            FakeFunctionApi::new()
                .with_alias_pages(vec![vec![("live", "1")]])
                .with_version_pages(vec![vec![("1", "aaa")]]),
        );
        let client = FunctionClient::new(api.clone());
        let target = DeploymentTarget::new("billing");

        let outcome = Deployer::new(&client)
            .deploy(&target, &artifact(dir.path()), &DeployOptions::default())
            .await;

        match outcome {
            DeployOutcome::Failed(e) => assert_eq!(e.kind(), ErrorKind::Remote),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(api.mutations().is_empty());
    }
}
