//! lambda-ship-core - Packaging and deployment core for Lambda Ship
//!
//! This crate provides:
//! - Configuration management (project file, environment, local overrides)
//! - Error handling
//! - Command execution and git repository information
//! - Commit-keyed artifact packaging
//! - Remote function client (pagination, wait-for-ready)
//! - Per-target deployment with an already-deployed gate
//! - Best-effort deployment announcements

pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod notify;
pub mod package;
pub mod pipeline;
pub mod remote;
pub mod repo;
pub mod runner;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use config::{AppConfig, DeploymentTarget, LocalOverrides, Settings, DEFAULT_CONFIG_FILE};
pub use context::DeployContext;
pub use deploy::{DeployOptions, DeployOutcome, Deployer, DEFAULT_ALIAS};
pub use error::{handle_error, ErrorKind, Result, ShipError};
pub use notify::{commit_link, AnnounceOutcome, Notifier, SlackNotifier};
pub use package::{Artifact, PackageBuilder};
pub use pipeline::{announce_if_needed, run_deploy, run_package, NotifyDecision, PackageReport, RunReport};
#[cfg(feature = "aws")]
pub use remote::AwsPlatform;
pub use remote::{CallerIdentity, FunctionApi, FunctionClient, RemoteAlias, RemoteVersion};
pub use repo::RepositoryInfo;
pub use runner::{CommandRunner, ShellCommand, ShellRunner};
