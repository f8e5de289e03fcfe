//! Deployment announcements
//!
//! Best-effort: every failure here is reported to the caller as an error
//! value which the pipeline turns into a warning. Nothing in this module
//! can fail a deployment.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{EDITOR_VAR, WEBHOOK_VAR};
use crate::context::DeployContext;
use crate::error::{Result, ShipError};
use crate::runner::CommandRunner;

/// Pause before handing the terminal to the editor so pending log lines flush
pub const EDITOR_DELAY: Duration = Duration::from_millis(500);

static GITHUB_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:git@github\.com:|ssh://git@github\.com/|https?://(?:[^@/]+@)?github\.com/)(?P<path>[^/\s]+/[^/\s]+?)(?:\.git)?/?$",
    )
    .expect("GitHub remote pattern is valid")
});

/// How an announcement left the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceOutcome {
    Sent(String),
    /// No webhook configured; the text was logged for the operator to post.
    PrintedForRelay(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn announce(&self, deployed: &[String], commit: &str) -> Result<AnnounceOutcome>;
}

/// Web form of a GitHub origin (`https://github.com/org/repo`), if it is one
pub fn github_web_url(origin: &str) -> Option<String> {
    GITHUB_REMOTE
        .captures(origin.trim())
        .and_then(|caps| caps.name("path"))
        .map(|path| format!("https://github.com/{}", path.as_str()))
}

/// Commit permalink for GitHub origins; any other origin is returned unchanged.
pub fn commit_link(origin: &str, commit: &str) -> String {
    match github_web_url(origin) {
        Some(web) => format!("{}/commit/{}", web, commit),
        None => origin.to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn compose_announcement(
    service: &str,
    targets: &[String],
    operator: &str,
    link: &str,
    subject: &str,
    commentary: &str,
) -> String {
    let mut text = format!(
        ":aws: :lambda: ({}: {}) @{} deployed “<{}|{}>”.",
        service,
        targets.join(", "),
        operator,
        link,
        escape(subject)
    );
    if !commentary.is_empty() {
        text.push('\n');
        text.push_str(commentary);
    }
    text
}

/// Drop instruction lines and surrounding blank space from the edited notes
pub fn strip_comments(text: &str) -> String {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Slack incoming-webhook announcer with editor-collected commentary
pub struct SlackNotifier<'a> {
    ctx: &'a DeployContext,
    runner: &'a dyn CommandRunner,
    http: reqwest::Client,
    editor_delay: Duration,
}

impl<'a> SlackNotifier<'a> {
    pub fn new(ctx: &'a DeployContext, runner: &'a dyn CommandRunner) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            ctx,
            runner,
            http,
            editor_delay: EDITOR_DELAY,
        })
    }

    async fn collect_commentary(&self, editor: &str, deployed: &[String], commit: &str) -> Result<String> {
        let notes = tempfile::Builder::new()
            .prefix("lambda-ship-notes-")
            .suffix(".md")
            .tempfile()?;

        let template = format!(
            "\n# Release notes for {} ({}) at {}.\n\
             # Lines starting with '#' are ignored; leave empty to add nothing.\n",
            self.ctx.service_name(),
            deployed.join(", "),
            commit
        );
        tokio::fs::write(notes.path(), template).await?;

        info!(editor = %editor, "Opening editor for release notes");
        tokio::time::sleep(self.editor_delay).await;

        self.runner
            .run_interactive(editor, &[notes.path().display().to_string()])
            .await?;

        let edited = tokio::fs::read_to_string(notes.path()).await?;
        Ok(strip_comments(&edited))
    }

    async fn post(&self, uri: &str, text: &str) -> Result<()> {
        let response = self
            .http
            .post(uri)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ShipError::Notification(format!(
                "webhook returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<'a> Notifier for SlackNotifier<'a> {
    async fn announce(&self, deployed: &[String], commit: &str) -> Result<AnnounceOutcome> {
        let editor = self.ctx.settings.editor.as_deref().ok_or_else(|| {
            ShipError::Notification(format!(
                "{} is not set, cannot collect release notes",
                EDITOR_VAR
            ))
        })?;

        let repo = &self.ctx.repo;
        let origin = repo.origin_url(self.runner).await?;
        let subject = repo.commit_subject(self.runner).await?;
        let commentary = self.collect_commentary(editor, deployed, commit).await?;

        let text = compose_announcement(
            &self.ctx.service_name(),
            deployed,
            &self.ctx.settings.operator,
            &commit_link(&origin, commit),
            &subject,
            &commentary,
        );

        match self.ctx.settings.webhook_uri.as_deref() {
            Some(uri) => {
                self.post(uri, &text).await?;
                info!(announcement = %text, "Sent DRI announcement");
                Ok(AnnounceOutcome::Sent(text))
            }
            None => {
                warn!("{} is not set, post this announcement manually", WEBHOOK_VAR);
                info!(announcement = %text, "DRI announcement");
                Ok(AnnounceOutcome::PrintedForRelay(text))
            }
        }
    }
}
