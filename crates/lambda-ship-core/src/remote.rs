//! Remote function platform client
//!
//! [`FunctionApi`] is the raw surface of the platform's versioning API; each
//! listing call returns one page as a JSON object holding a single data key
//! plus an optional `NextMarker`. [`FunctionClient`] layers pagination and
//! the wait-for-ready poll on top of it.
//!
//! The real AWS implementation lives behind the "aws" feature.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, ShipError};

/// Continuation key of a paginated listing
pub const MARKER_KEY: &str = "NextMarker";

/// One page of a listing call
pub type ListPage = serde_json::Map<String, Value>;

/// A named, repointable reference to a published version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlias {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "FunctionVersion")]
    pub version_id: String,
}

/// A published version; the description carries the source commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVersion {
    #[serde(rename = "Version")]
    pub version_id: String,
    #[serde(rename = "Description", default)]
    pub description: String,
}

/// Processing state of the last code update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    InProgress,
    Successful,
    Failed(String),
}

#[async_trait]
pub trait FunctionApi: Send + Sync {
    async fn list_aliases_page(&self, function: &str, marker: Option<String>) -> Result<ListPage>;

    async fn list_versions_page(&self, function: &str, marker: Option<String>) -> Result<ListPage>;

    async fn update_code(&self, function: &str, zip: Vec<u8>) -> Result<()>;

    async fn update_status(&self, function: &str) -> Result<UpdateStatus>;

    async fn publish_version(&self, function: &str, description: &str) -> Result<RemoteVersion>;

    async fn update_alias(&self, function: &str, alias: &str, version_id: &str) -> Result<()>;
}

/// Identity of the credentials in use
#[async_trait]
pub trait CallerIdentity: Send + Sync {
    async fn account_id(&self) -> Result<String>;
}

/// Follow `NextMarker` until exhausted and concatenate every page in order.
///
/// Each page must hold exactly one key besides the marker; anything else is
/// an unexpected response shape and fails rather than guessing.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListPage>>,
{
    let mut items = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let mut page = fetch(marker.take()).await?;

        let next = match page.remove(MARKER_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                return Err(ShipError::Remote(format!(
                    "unexpected {} value: {}",
                    MARKER_KEY, other
                )))
            }
        };

        for value in page_items(page)? {
            let item = serde_json::from_value(value)
                .map_err(|e| ShipError::Remote(format!("unexpected list item: {}", e)))?;
            items.push(item);
        }

        match next {
            Some(m) => marker = Some(m),
            None => break,
        }
    }

    Ok(items)
}

fn page_items(page: ListPage) -> Result<Vec<Value>> {
    if page.len() != 1 {
        let keys: Vec<&str> = page.keys().map(String::as_str).collect();
        return Err(ShipError::Remote(format!(
            "ambiguous page shape: expected exactly one data key, found [{}]",
            keys.join(", ")
        )));
    }

    match page.into_iter().next() {
        Some((_, Value::Array(items))) => Ok(items),
        Some((_, Value::Null)) => Ok(Vec::new()),
        Some((key, other)) => Err(ShipError::Remote(format!(
            "page key `{}` is not a list: {}",
            key, other
        ))),
        None => Ok(Vec::new()),
    }
}

/// Typed client over a [`FunctionApi`]
#[derive(Clone)]
pub struct FunctionClient {
    api: Arc<dyn FunctionApi>,
    poll_interval: Duration,
    ready_timeout: Duration,
}

impl FunctionClient {
    pub fn new(api: Arc<dyn FunctionApi>) -> Self {
        Self {
            api,
            poll_interval: Duration::from_secs(1),
            ready_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, ready_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.ready_timeout = ready_timeout;
        self
    }

    pub async fn list_aliases(&self, function: &str) -> Result<Vec<RemoteAlias>> {
        collect_pages(|marker| self.api.list_aliases_page(function, marker))
            .await
            .map_err(|e| e.during("list aliases"))
    }

    pub async fn list_versions(&self, function: &str) -> Result<Vec<RemoteVersion>> {
        collect_pages(|marker| self.api.list_versions_page(function, marker))
            .await
            .map_err(|e| e.during("list versions"))
    }

    /// Upload new code and block until the platform has finished processing it.
    pub async fn update_code(&self, function: &str, zip: Vec<u8>) -> Result<()> {
        info!(function = %function, bytes = zip.len(), "Uploading function code");
        self.api
            .update_code(function, zip)
            .await
            .map_err(|e| e.during("update code"))?;
        self.wait_until_ready(function).await
    }

    pub async fn wait_until_ready(&self, function: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.ready_timeout;

        loop {
            let status = self
                .api
                .update_status(function)
                .await
                .map_err(|e| e.during("wait for update"))?;

            match status {
                UpdateStatus::Successful => return Ok(()),
                UpdateStatus::Failed(reason) => {
                    return Err(ShipError::Remote(format!(
                        "code update of {} failed: {}",
                        function, reason
                    )))
                }
                UpdateStatus::InProgress => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(ShipError::Remote(format!(
                            "code update of {} still in progress after {}s",
                            function,
                            self.ready_timeout.as_secs()
                        )));
                    }
                    debug!(function = %function, "Code update in progress");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    pub async fn publish_version(&self, function: &str, description: &str) -> Result<RemoteVersion> {
        self.api
            .publish_version(function, description)
            .await
            .map_err(|e| e.during("publish version"))
    }

    pub async fn update_alias(&self, function: &str, alias: &str, version_id: &str) -> Result<()> {
        self.api
            .update_alias(function, alias, version_id)
            .await
            .map_err(|e| e.during("update alias"))
    }
}

#[cfg(feature = "aws")]
pub use aws::AwsPlatform;

#[cfg(feature = "aws")]
mod aws {
    use super::*;
    use aws_config::BehaviorVersion;
    use aws_sdk_lambda::error::DisplayErrorContext;
    use aws_sdk_lambda::primitives::Blob;
    use aws_sdk_lambda::types::LastUpdateStatus;
    use serde_json::json;

    fn remote_error<E>(error: E) -> ShipError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ShipError::Remote(DisplayErrorContext(&error).to_string())
    }

    fn page(key: &str, items: Vec<Value>, marker: Option<&str>) -> ListPage {
        let mut page = ListPage::new();
        page.insert(key.to_string(), Value::Array(items));
        if let Some(marker) = marker {
            page.insert(MARKER_KEY.to_string(), Value::String(marker.to_string()));
        }
        page
    }

    /// Lambda + STS backed platform
    #[derive(Clone)]
    pub struct AwsPlatform {
        lambda: aws_sdk_lambda::Client,
        sts: aws_sdk_sts::Client,
    }

    impl AwsPlatform {
        /// Build clients from the default provider chain, optionally pinning the region.
        pub async fn new(region: Option<&str>) -> Self {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(aws_config::Region::new(region.to_string()));
            }
            let config = loader.load().await;

            info!(
                region = config.region().map(|r| r.as_ref()).unwrap_or("default"),
                "Loaded AWS configuration"
            );

            Self {
                lambda: aws_sdk_lambda::Client::new(&config),
                sts: aws_sdk_sts::Client::new(&config),
            }
        }
    }

    #[async_trait]
    impl FunctionApi for AwsPlatform {
        async fn list_aliases_page(&self, function: &str, marker: Option<String>) -> Result<ListPage> {
            let resp = self
                .lambda
                .list_aliases()
                .function_name(function)
                .set_marker(marker)
                .send()
                .await
                .map_err(remote_error)?;

            let aliases = resp
                .aliases()
                .iter()
                .map(|a| {
                    json!({
                        "Name": a.name().unwrap_or_default(),
                        "FunctionVersion": a.function_version().unwrap_or_default(),
                    })
                })
                .collect();

            Ok(page("Aliases", aliases, resp.next_marker()))
        }

        async fn list_versions_page(&self, function: &str, marker: Option<String>) -> Result<ListPage> {
            let resp = self
                .lambda
                .list_versions_by_function()
                .function_name(function)
                .set_marker(marker)
                .send()
                .await
                .map_err(remote_error)?;

            let versions = resp
                .versions()
                .iter()
                .map(|v| {
                    json!({
                        "Version": v.version().unwrap_or_default(),
                        "Description": v.description().unwrap_or_default(),
                    })
                })
                .collect();

            Ok(page("Versions", versions, resp.next_marker()))
        }

        async fn update_code(&self, function: &str, zip: Vec<u8>) -> Result<()> {
            self.lambda
                .update_function_code()
                .function_name(function)
                .zip_file(Blob::new(zip))
                .send()
                .await
                .map_err(remote_error)?;
            Ok(())
        }

        async fn update_status(&self, function: &str) -> Result<UpdateStatus> {
            let resp = self
                .lambda
                .get_function_configuration()
                .function_name(function)
                .send()
                .await
                .map_err(remote_error)?;

            Ok(match resp.last_update_status() {
                None | Some(LastUpdateStatus::Successful) => UpdateStatus::Successful,
                Some(LastUpdateStatus::Failed) => UpdateStatus::Failed(
                    resp.last_update_status_reason()
                        .unwrap_or("no reason given")
                        .to_string(),
                ),
                Some(_) => UpdateStatus::InProgress,
            })
        }

        async fn publish_version(&self, function: &str, description: &str) -> Result<RemoteVersion> {
            let resp = self
                .lambda
                .publish_version()
                .function_name(function)
                .description(description)
                .send()
                .await
                .map_err(remote_error)?;

            let version_id = resp
                .version()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ShipError::Remote("publish returned no version".to_string()))?;

            Ok(RemoteVersion {
                version_id: version_id.to_string(),
                description: resp.description().unwrap_or(description).to_string(),
            })
        }

        async fn update_alias(&self, function: &str, alias: &str, version_id: &str) -> Result<()> {
            self.lambda
                .update_alias()
                .function_name(function)
                .name(alias)
                .function_version(version_id)
                .send()
                .await
                .map_err(remote_error)?;
            Ok(())
        }
    }

    #[async_trait]
    impl CallerIdentity for AwsPlatform {
        async fn account_id(&self) -> Result<String> {
            let resp = self
                .sts
                .get_caller_identity()
                .send()
                .await
                .map_err(remote_error)?;
            resp.account()
                .map(str::to_string)
                .ok_or_else(|| ShipError::Remote("caller identity has no account".to_string()))
        }
    }
}
