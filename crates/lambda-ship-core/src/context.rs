//! Immutable per-run context shared by every component

use std::path::{Path, PathBuf};

use crate::config::{AppConfig, Settings, DEFAULT_CONFIG_FILE};
use crate::error::Result;
use crate::repo::RepositoryInfo;
use crate::runner::CommandRunner;

/// Everything resolved once at process start
#[derive(Debug, Clone)]
pub struct DeployContext {
    pub repo: RepositoryInfo,
    pub config: AppConfig,
    pub settings: Settings,
}

impl DeployContext {
    pub fn new(repo: RepositoryInfo, config: AppConfig, settings: Settings) -> Self {
        Self {
            repo,
            config,
            settings,
        }
    }

    /// Resolve the repository, then read the project file and environment.
    ///
    /// A relative `config_path` is taken from the repository root.
    pub async fn load(runner: &dyn CommandRunner, config_path: Option<&Path>) -> Result<Self> {
        let repo = RepositoryInfo::resolve(runner).await?;

        let path: PathBuf = match config_path {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => repo.root.join(path),
            None => repo.root.join(DEFAULT_CONFIG_FILE),
        };
        let config = AppConfig::load(&path)?;
        let settings = Settings::from_env()?;

        Ok(Self::new(repo, config, settings))
    }

    pub fn project_dir(&self) -> &Path {
        self.repo.root()
    }

    pub fn commit(&self) -> &str {
        &self.repo.commit
    }

    /// Short human name used in announcements
    pub fn service_name(&self) -> String {
        self.config
            .service_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.repo.basename())
    }
}
