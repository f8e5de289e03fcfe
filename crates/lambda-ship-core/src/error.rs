//! Error types and error handling for Lambda Ship

use thiserror::Error;

/// Result type alias using ShipError
pub type Result<T> = std::result::Result<T, ShipError>;

/// Custom error types for packaging and deployment operations
#[derive(Error, Debug)]
pub enum ShipError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Command `{command}` failed: {output}")]
    Command { command: String, output: String },

    #[error("Remote API error: {0}")]
    Remote(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HTTP(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(#[from] anyhow::Error),
}

/// Coarse classification used by callers to branch on failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Command,
    Remote,
    Notification,
    Io,
    Other,
}

impl ShipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShipError::Configuration(_) | ShipError::Json(_) => ErrorKind::Configuration,
            ShipError::Command { .. } => ErrorKind::Command,
            ShipError::Remote(_) => ErrorKind::Remote,
            ShipError::Notification(_) | ShipError::HTTP(_) => ErrorKind::Notification,
            ShipError::IO(_) => ErrorKind::Io,
            ShipError::General(_) => ErrorKind::Other,
        }
    }

    /// Prefix the message with the step that failed, keeping the kind.
    pub fn during(self, step: &str) -> Self {
        match self {
            ShipError::Configuration(msg) => ShipError::Configuration(format!("{step}: {msg}")),
            ShipError::Command { command, output } => ShipError::Command {
                command: format!("{step}: {command}"),
                output,
            },
            ShipError::Remote(msg) => ShipError::Remote(format!("{step}: {msg}")),
            ShipError::Notification(msg) => ShipError::Notification(format!("{step}: {msg}")),
            ShipError::IO(e) => ShipError::IO(std::io::Error::new(e.kind(), format!("{step}: {e}"))),
            other => ShipError::General(anyhow::Error::new(other).context(step.to_string())),
        }
    }
}

/// Handle and display errors with helpful messages
pub fn handle_error(error: &ShipError) {
    eprintln!("✗ Error: {}", error);

    // If DEBUG environment variable is set, show detailed info
    if std::env::var("DEBUG").is_ok() {
        if let Some(source) = std::error::Error::source(error) {
            eprintln!("\nDetails:");
            eprintln!("{:?}", source);
        }
    }

    // Provide helpful tips
    match error.kind() {
        ErrorKind::Configuration => {
            eprintln!("\nHints:");
            eprintln!("  • Check deploy.json at the repository root");
            eprintln!("  • Declare exactly one of `functionName` or `deployments`");
        }
        ErrorKind::Command => {
            eprintln!("\nHints:");
            eprintln!("  • Make sure git, rsync, npm and zip are on PATH");
            eprintln!("  • Run the failing command by hand to see the full output");
        }
        ErrorKind::Remote => {
            eprintln!("\nHints:");
            eprintln!("  • Verify AWS credentials: aws sts get-caller-identity");
            eprintln!("  • Check AWS_PROFILE and the configured region");
        }
        _ => {}
    }
}
