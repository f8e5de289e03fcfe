//! Configuration management for Lambda Ship
//!
//! Handles loading and parsing of:
//! - The project file (`deploy.json`) declaring deployment targets
//! - Environment settings (editor, webhook, operator, dev account)
//! - The local user-level override file

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShipError};

/// Project file looked up at the repository root
pub const DEFAULT_CONFIG_FILE: &str = "deploy.json";

/// Paths zipped into the artifact when `archivePaths` is not set
pub const DEFAULT_ARCHIVE_PATHS: &[&str] = &["index.js", "node_modules"];

pub const EDITOR_VAR: &str = "EDITOR";
pub const WEBHOOK_VAR: &str = "DRI_SLACK_WEBHOOK_URI";
pub const OPERATOR_VAR: &str = "SLACK_USER";
pub const DEV_ACCOUNT_VAR: &str = "LAMBDA_SHIP_DEV_ACCOUNT";

/// A named remote function with its own deployment lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentTarget {
    pub name: String,
    /// Dependency manifest substituted for `package.json` before install,
    /// relative to the repository root.
    pub manifest_override: Option<PathBuf>,
}

impl DeploymentTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manifest_override: None,
        }
    }
}

/// Entry of the `deployments` array
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentEntry {
    function_name: String,
    package_json: Option<PathBuf>,
}

/// Project file structure
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    function_name: Option<String>,
    deployments: Option<Vec<DeploymentEntry>>,
    #[serde(rename = "slack_service_name")]
    slack_service_name: Option<String>,
    region: Option<String>,
    archive_paths: Option<Vec<String>>,
}

/// Project configuration, validated and read-only after load
#[derive(Debug, Clone)]
pub struct AppConfig {
    targets: Vec<DeploymentTarget>,
    service_name: Option<String>,
    region: Option<String>,
    archive_paths: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the project file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ShipError::Configuration(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ShipError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json(&content)
            .map_err(|e| ShipError::Configuration(format!("{}: {}", path.display(), config_message(e))))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)
            .map_err(|e| ShipError::Configuration(format!("malformed config: {}", e)))?;
        Self::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let targets = match (file.function_name, file.deployments) {
            (Some(_), Some(_)) => {
                return Err(ShipError::Configuration(
                    "`functionName` and `deployments` are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(ShipError::Configuration(
                    "missing `functionName` or `deployments`".to_string(),
                ))
            }
            (Some(name), None) => vec![DeploymentTarget::new(name)],
            (None, Some(entries)) => entries
                .into_iter()
                .map(|entry| DeploymentTarget {
                    name: entry.function_name,
                    manifest_override: entry.package_json,
                })
                .collect(),
        };

        if targets.is_empty() {
            return Err(ShipError::Configuration(
                "`deployments` declares no targets".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for target in &targets {
            if target.name.trim().is_empty() {
                return Err(ShipError::Configuration(
                    "`functionName` must not be empty".to_string(),
                ));
            }
            if !seen.insert(target.name.as_str()) {
                return Err(ShipError::Configuration(format!(
                    "duplicate deployment target `{}`",
                    target.name
                )));
            }
        }

        let archive_paths = match file.archive_paths {
            Some(paths) if paths.is_empty() => {
                return Err(ShipError::Configuration(
                    "`archivePaths` must list at least one path".to_string(),
                ))
            }
            Some(paths) => paths,
            None => DEFAULT_ARCHIVE_PATHS.iter().map(|p| p.to_string()).collect(),
        };

        Ok(Self {
            targets,
            service_name: file.slack_service_name,
            region: file.region,
            archive_paths,
        })
    }

    pub fn targets(&self) -> &[DeploymentTarget] {
        &self.targets
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn archive_paths(&self) -> &[String] {
        &self.archive_paths
    }
}

/// Strip the redundant prefix when re-wrapping a configuration message
fn config_message(error: ShipError) -> String {
    match error {
        ShipError::Configuration(msg) => msg,
        other => other.to_string(),
    }
}

/// Local user-level overrides (`~/.config/lambda-ship/local.json`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalOverrides {
    pub dev_account_id: Option<String>,
}

impl LocalOverrides {
    /// Load the override file from the user's config directory, if any
    pub fn load() -> Result<Self> {
        match Self::get_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            ShipError::Configuration(format!("malformed {}: {}", path.display(), e))
        })
    }

    fn get_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/lambda-ship/local.json"))
    }
}

/// Settings taken from the process environment
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub editor: Option<String>,
    pub webhook_uri: Option<String>,
    pub operator: String,
    pub dev_account: Option<String>,
    pub aws_profile: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let local = LocalOverrides::load()?;
        Ok(Self::from_lookup(|key| std::env::var(key).ok(), local))
    }

    /// Build settings from an arbitrary variable lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F, local: LocalOverrides) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let operator = get(OPERATOR_VAR)
            .or_else(|| get("USER"))
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            editor: get(EDITOR_VAR),
            webhook_uri: get(WEBHOOK_VAR),
            operator,
            dev_account: get(DEV_ACCOUNT_VAR).or(local.dev_account_id),
            aws_profile: get("AWS_PROFILE"),
        }
    }
}
