//! Git repository information resolved through the command runner

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::runner::{CommandRunner, ShellCommand};

/// Commit and root of the repository being packaged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub commit: String,
    pub root: PathBuf,
}

impl RepositoryInfo {
    /// Resolve HEAD and the top-level directory, both queried concurrently.
    pub async fn resolve(runner: &dyn CommandRunner) -> Result<Self> {
        let head = ShellCommand::new("git", ["rev-parse", "HEAD"]);
        let toplevel = ShellCommand::new("git", ["rev-parse", "--show-toplevel"]);

        let (commit, root) = tokio::try_join!(runner.run(&head), runner.run(&toplevel))?;

        Ok(Self {
            commit: commit.value(),
            root: PathBuf::from(root.value()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Last path component of the root, the default short service name
    pub fn basename(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub async fn origin_url(&self, runner: &dyn CommandRunner) -> Result<String> {
        let cmd = ShellCommand::new("git", ["remote", "get-url", "origin"]).in_dir(&self.root);
        Ok(runner.run(&cmd).await?.value())
    }

    pub async fn commit_subject(&self, runner: &dyn CommandRunner) -> Result<String> {
        let cmd = ShellCommand::new(
            "git",
            [
                "show".to_string(),
                "--pretty=format:%s".to_string(),
                "--no-patch".to_string(),
                self.commit.clone(),
            ],
        )
        .in_dir(&self.root);
        Ok(runner.run(&cmd).await?.value())
    }
}
