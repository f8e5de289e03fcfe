//! In-memory fakes shared by the unit tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use crate::config::{AppConfig, Settings};
use crate::context::DeployContext;
use crate::error::{Result, ShipError};
use crate::notify::{AnnounceOutcome, Notifier};
use crate::remote::{CallerIdentity, FunctionApi, ListPage, RemoteVersion, UpdateStatus, MARKER_KEY};
use crate::repo::RepositoryInfo;
use crate::runner::{CommandOutput, CommandRunner, ShellCommand};

pub const TEST_COMMIT: &str = "9fceb02d0ae598e95dc970b74767f19372d61af8";

pub fn context(root: &Path, config: &str) -> DeployContext {
    context_with_settings(root, config, Settings::default())
}

pub fn context_with_settings(root: &Path, config: &str, settings: Settings) -> DeployContext {
    DeployContext::new(
        RepositoryInfo {
            commit: TEST_COMMIT.to_string(),
            root: root.to_path_buf(),
        },
        AppConfig::from_json(config).unwrap(),
        settings,
    )
}

type Hook = Box<dyn Fn(&ShellCommand) + Send + Sync>;

/// Records commands; `zip` drops a fake archive in its working directory.
#[derive(Default)]
pub struct FakeRunner {
    responses: HashMap<String, String>,
    failing: Option<String>,
    editor_text: Option<String>,
    hooks: Vec<(String, Hook)>,
    calls: Mutex<Vec<ShellCommand>>,
    interactive: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub const ARCHIVE_BYTES: &'static [u8] = b"PK-fake";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, command: &str, stdout: &str) -> Self {
        self.responses.insert(command.to_string(), stdout.to_string());
        self
    }

    pub fn fail_on(mut self, program: &str) -> Self {
        self.failing = Some(program.to_string());
        self
    }

    pub fn editor_writes(mut self, text: &str) -> Self {
        self.editor_text = Some(text.to_string());
        self
    }

    pub fn on<F>(mut self, program: &str, hook: F) -> Self
    where
        F: Fn(&ShellCommand) + Send + Sync + 'static,
    {
        self.hooks.push((program.to_string(), Box::new(hook)));
        self
    }

    pub fn calls(&self) -> Vec<ShellCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program == program)
            .count()
    }

    pub fn interactive_calls(&self) -> Vec<String> {
        self.interactive.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());

        if self.failing.as_deref() == Some(command.program.as_str()) {
            return Err(ShipError::Command {
                command: command.to_string(),
                output: "simulated failure".to_string(),
            });
        }

        for (program, hook) in &self.hooks {
            if *program == command.program {
                hook(command);
            }
        }

        if command.program == "zip" {
            if let Some(dir) = &command.cwd {
                std::fs::write(dir.join("package.zip"), Self::ARCHIVE_BYTES)?;
            }
        }

        Ok(CommandOutput {
            stdout: self
                .responses
                .get(&command.to_string())
                .cloned()
                .unwrap_or_default(),
            ..CommandOutput::default()
        })
    }

    async fn run_interactive(&self, program: &str, args: &[String]) -> Result<()> {
        self.interactive.lock().unwrap().push(program.to_string());
        if let (Some(text), Some(file)) = (&self.editor_text, args.last()) {
            std::fs::write(file, text)?;
        }
        Ok(())
    }
}

/// Paged alias/version listings with recorded mutating calls
#[derive(Default)]
pub struct FakeFunctionApi {
    alias_pages: Vec<ListPage>,
    alias_pages_by_function: HashMap<String, Vec<ListPage>>,
    version_pages: Vec<ListPage>,
    latest_version: Mutex<u64>,
    statuses: Mutex<VecDeque<UpdateStatus>>,
    statuses_by_function: Mutex<HashMap<String, VecDeque<UpdateStatus>>>,
    status_polls: Mutex<usize>,
    mutations: Mutex<Vec<String>>,
    journal: Mutex<Vec<String>>,
}

fn pages(key: &str, chunks: Vec<Vec<Value>>) -> Vec<ListPage> {
    let count = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, items)| {
            let mut page = ListPage::new();
            page.insert(key.to_string(), Value::Array(items));
            if i + 1 < count {
                page.insert(MARKER_KEY.to_string(), Value::String(format!("page-{}", i + 1)));
            }
            page
        })
        .collect()
}

fn page_at(pages: &[ListPage], marker: Option<String>) -> Result<ListPage> {
    let idx = match marker {
        None => 0,
        Some(m) => m
            .strip_prefix("page-")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| ShipError::Remote(format!("bad marker {m}")))?,
    };
    Ok(pages.get(idx).cloned().unwrap_or_default())
}

impl FakeFunctionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each inner vec is one page of `(alias, version)` pairs.
    pub fn with_alias_pages(mut self, chunks: Vec<Vec<(&str, &str)>>) -> Self {
        let chunks: Vec<Vec<Value>> = chunks
            .into_iter()
            .map(|page| {
                page.into_iter()
                    .map(|(name, version)| json!({"Name": name, "FunctionVersion": version}))
                    .collect()
            })
            .collect();
        self.alias_pages = pages("Aliases", chunks);
        self
    }

    /// Alias listing served only for `function`
    pub fn with_alias_pages_for(mut self, function: &str, chunks: Vec<Vec<(&str, &str)>>) -> Self {
        let chunks: Vec<Vec<Value>> = chunks
            .into_iter()
            .map(|page| {
                page.into_iter()
                    .map(|(name, version)| json!({"Name": name, "FunctionVersion": version}))
                    .collect()
            })
            .collect();
        self.alias_pages_by_function
            .insert(function.to_string(), pages("Aliases", chunks));
        self
    }

    /// Each inner vec is one page of `(version, description)` pairs.
    pub fn with_version_pages(mut self, chunks: Vec<Vec<(&str, &str)>>) -> Self {
        let mut latest: u64 = 0;
        let chunks: Vec<Vec<Value>> = chunks
            .into_iter()
            .map(|page| {
                page.into_iter()
                    .map(|(version, description)| {
                        latest = latest.max(version.parse::<u64>().unwrap_or(0));
                        json!({"Version": version, "Description": description})
                    })
                    .collect()
            })
            .collect();
        self.version_pages = pages("Versions", chunks);
        self.latest_version = Mutex::new(latest);
        self
    }

    pub fn with_statuses(self, statuses: Vec<UpdateStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    /// Status sequence reported only for `function`
    pub fn with_statuses_for(self, function: &str, statuses: Vec<UpdateStatus>) -> Self {
        self.statuses_by_function
            .lock()
            .unwrap()
            .insert(function.to_string(), statuses.into());
        self
    }

    /// Mutating calls and status polls in the order they happened
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry.clone());
        self.mutations.lock().unwrap().push(entry);
    }

    pub fn mutations(&self) -> Vec<String> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn status_polls(&self) -> usize {
        *self.status_polls.lock().unwrap()
    }
}

#[async_trait]
impl FunctionApi for FakeFunctionApi {
    async fn list_aliases_page(&self, function: &str, marker: Option<String>) -> Result<ListPage> {
        let pages = self
            .alias_pages_by_function
            .get(function)
            .unwrap_or(&self.alias_pages);
        page_at(pages, marker)
    }

    async fn list_versions_page(&self, _function: &str, marker: Option<String>) -> Result<ListPage> {
        page_at(&self.version_pages, marker)
    }

    async fn update_code(&self, function: &str, zip: Vec<u8>) -> Result<()> {
        self.record(format!("update_code {} {} bytes", function, zip.len()));
        Ok(())
    }

    async fn update_status(&self, function: &str) -> Result<UpdateStatus> {
        *self.status_polls.lock().unwrap() += 1;
        let own = self
            .statuses_by_function
            .lock()
            .unwrap()
            .get_mut(function)
            .map(|queue| queue.pop_front().unwrap_or(UpdateStatus::Successful));
        let status = match own {
            Some(status) => status,
            None => self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(UpdateStatus::Successful),
        };
        self.journal
            .lock()
            .unwrap()
            .push(format!("status {} {:?}", function, status));
        Ok(status)
    }

    async fn publish_version(&self, function: &str, description: &str) -> Result<RemoteVersion> {
        let version_id = {
            let mut latest = self.latest_version.lock().unwrap();
            *latest += 1;
            latest.to_string()
        };
        self.record(format!("publish_version {} {}", function, description));
        Ok(RemoteVersion {
            version_id,
            description: description.to_string(),
        })
    }

    async fn update_alias(&self, function: &str, alias: &str, version_id: &str) -> Result<()> {
        self.record(format!("update_alias {} {} {}", function, alias, version_id));
        Ok(())
    }
}

pub struct FakeIdentity(Option<String>);

impl FakeIdentity {
    pub fn account(id: &str) -> Self {
        Self(Some(id.to_string()))
    }

    pub fn unavailable() -> Self {
        Self(None)
    }
}

#[async_trait]
impl CallerIdentity for FakeIdentity {
    async fn account_id(&self) -> Result<String> {
        self.0
            .clone()
            .ok_or_else(|| ShipError::Remote("no credentials".to_string()))
    }
}

/// Records the deployed target list of each `announce` call
#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn announce(&self, deployed: &[String], _commit: &str) -> Result<AnnounceOutcome> {
        self.calls.lock().unwrap().push(deployed.to_vec());
        if self.fail {
            return Err(ShipError::Notification("webhook unreachable".to_string()));
        }
        Ok(AnnounceOutcome::Sent(deployed.join(", ")))
    }
}
