//! Content-addressed artifact packaging
//!
//! An artifact is keyed by target name and commit and lives at
//! `<project>/pkg/<name>_<commit>.zip`. A file at that path is a finished
//! artifact: it is only ever placed there by a rename.

use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::DeploymentTarget;
use crate::context::DeployContext;
use crate::error::{Result, ShipError};
use crate::runner::{CommandRunner, ShellCommand};

pub const ARTIFACT_DIR: &str = "pkg";
pub const ARTIFACT_EXT: &str = "zip";

const ARCHIVE_NAME: &str = "package.zip";

/// The packaged archive for one target at one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub target_name: String,
    pub commit: String,
    pub path: PathBuf,
}

pub struct PackageBuilder<'a> {
    ctx: &'a DeployContext,
    runner: &'a dyn CommandRunner,
}

impl<'a> PackageBuilder<'a> {
    pub fn new(ctx: &'a DeployContext, runner: &'a dyn CommandRunner) -> Self {
        Self { ctx, runner }
    }

    pub fn artifact_path(&self, target: &DeploymentTarget) -> PathBuf {
        self.ctx.project_dir().join(ARTIFACT_DIR).join(format!(
            "{}_{}.{}",
            target.name,
            self.ctx.commit(),
            ARTIFACT_EXT
        ))
    }

    /// Return the cached artifact for the current commit, building it first if absent.
    pub async fn build(&self, target: &DeploymentTarget) -> Result<Artifact> {
        let path = self.artifact_path(target);
        let artifact = Artifact {
            target_name: target.name.clone(),
            commit: self.ctx.commit().to_string(),
            path,
        };

        if tokio::fs::try_exists(&artifact.path).await? {
            info!(target = %target.name, path = %artifact.path.display(), "Package already built");
            return Ok(artifact);
        }

        info!(target = %target.name, commit = %artifact.commit, "Building package");

        // Removed when dropped, whichever way this returns
        let workdir = tempfile::Builder::new().prefix("lambda-ship-").tempdir()?;
        debug!(workdir = %workdir.path().display(), "Created work directory");

        self.assemble(target, workdir.path()).await?;
        place(&workdir.path().join(ARCHIVE_NAME), &artifact.path)
            .await
            .map_err(|e| e.during("store artifact"))?;

        info!(target = %target.name, path = %artifact.path.display(), "Package created");
        Ok(artifact)
    }

    /// Build every configured target concurrently, keeping per-target results.
    pub async fn build_all(&self) -> Vec<(DeploymentTarget, Result<Artifact>)> {
        let builds = self.ctx.config.targets().iter().map(|target| async move {
            (target.clone(), self.build(target).await)
        });
        join_all(builds).await
    }

    async fn assemble(&self, target: &DeploymentTarget, work: &Path) -> Result<()> {
        let root = self.ctx.project_dir();
        let git_dir = root.join(".git");

        self.step(
            "copy repository",
            ShellCommand::new("rsync", ["-a".to_string(), git_dir.display().to_string(), ".".to_string()]),
            work,
        )
        .await?;

        self.step(
            "check out commit",
            ShellCommand::new("git", ["reset", "--hard", self.ctx.commit()]),
            work,
        )
        .await?;

        if let Some(manifest) = &target.manifest_override {
            let source = root.join(manifest);
            debug!(manifest = %source.display(), "Substituting dependency manifest");
            tokio::fs::copy(&source, work.join("package.json"))
                .await
                .map_err(|e| {
                    ShipError::from(e).during(&format!(
                        "substitute dependency manifest {}",
                        source.display()
                    ))
                })?;
        }

        self.step(
            "install dependencies",
            ShellCommand::new("npm", ["install", "--production"]),
            work,
        )
        .await?;

        let mut zip_args = vec!["-r".to_string(), ARCHIVE_NAME.to_string()];
        zip_args.extend(self.ctx.config.archive_paths().iter().cloned());
        self.step("create archive", ShellCommand::new("zip", zip_args), work)
            .await
    }

    async fn step(&self, name: &str, command: ShellCommand, work: &Path) -> Result<()> {
        let output = self
            .runner
            .run(&command.in_dir(work))
            .await
            .map_err(|e| e.during(name))?;

        debug!(
            step = name,
            elapsed_ms = output.execution_time.as_millis() as u64,
            "Package step finished"
        );
        if !output.stderr.trim().is_empty() {
            debug!(step = name, stderr = %output.stderr.trim(), "Package step diagnostics");
        }
        Ok(())
    }
}

/// Copy next to the destination under a hidden name, then rename into place.
async fn place(archive: &Path, dest: &Path) -> Result<()> {
    let dir = dest
        .parent()
        .ok_or_else(|| ShipError::Configuration(format!("invalid artifact path {}", dest.display())))?;
    tokio::fs::create_dir_all(dir).await?;

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let partial = dir.join(format!(".{}.partial", file_name));

    if let Err(e) = tokio::fs::copy(archive, &partial).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&partial, dest).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    Ok(())
}
