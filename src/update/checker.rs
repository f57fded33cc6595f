//! Update discovery against the info endpoint.

use super::config::UpdateSettings;
use super::model::{AvailableUpdate, Origin, UpdateInfo};
use super::provider::UpdateInfoProvider;
use crate::constants::HTTP_REQUEST_TIMEOUT;
use crate::core::RtpmError;
use crate::utils::platform_id;
use anyhow::{Context, Result};
use reqwest::Url;
use tracing::{debug, info};

/// Stateless query component asking the info endpoint for the update that
/// matches the running binary.
///
/// Every call issues exactly one HTTP GET. Nothing is cached here; see
/// [`UpdateCache`](super::cache::UpdateCache) for that.
///
/// # Examples
///
/// ```rust,no_run
/// use rtpm_cli::update::{Checker, Origin, UpdateConfig, UpdateSettings, EnvOverrides};
///
/// # async fn example() -> anyhow::Result<()> {
/// let settings = UpdateSettings::resolve(&UpdateConfig::default(), &EnvOverrides::from_env());
/// let checker = Checker::new(&settings, Origin::current())?;
/// if let Some(update) = checker.check_for(None, None).await? {
///     println!("update available: {}", update.version());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Checker {
    client: reqwest::Client,
    info_url: String,
    file_url: String,
    origin: Origin,
    platform: String,
    source: String,
    channel: Option<String>,
    rollout_tag: Option<String>,
    force: bool,
}

impl Checker {
    /// Creates a checker for `origin` using the resolved settings.
    pub fn new(settings: &UpdateSettings, origin: Origin) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_REQUEST_TIMEOUT)
            .user_agent(format!("rtpm/{}", origin.version))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            info_url: settings.info_url.clone(),
            file_url: settings.file_url.clone(),
            origin,
            platform: platform_id(),
            source: "cli".to_string(),
            channel: settings.channel.clone(),
            rollout_tag: settings.rollout_tag.clone(),
            force: settings.force_update,
        })
    }

    /// Reports where the request comes from (`cli`, `service`, ...).
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Requests artifacts for another platform.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The update to install, or `None` when the server offers the running version.
    ///
    /// `desired_channel` falls back to the configured channel and then to the
    /// origin's. `desired_version` pins a specific version; without it the
    /// server picks the latest. With force-update enabled an equivalent update is
    /// still returned so it can be reinstalled.
    pub async fn check_for(
        &self,
        desired_channel: Option<&str>,
        desired_version: Option<&str>,
    ) -> Result<Option<AvailableUpdate>> {
        let update = self.fetch_update(desired_channel, desired_version).await?;

        if update.is_equivalent_to(&self.origin) && !self.force {
            debug!(origin = %self.origin, "Already running the offered version");
            return Ok(None);
        }

        info!(update = %update, origin = %self.origin, "Update available");
        Ok(Some(update))
    }

    /// Whatever the server offers, even if it is the running version.
    pub async fn fetch_update(
        &self,
        desired_channel: Option<&str>,
        desired_version: Option<&str>,
    ) -> Result<AvailableUpdate> {
        let url = self.info_request_url(desired_channel, desired_version)?;
        debug!(url = %url, "Requesting update info");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            RtpmError::NetworkError {
                operation: "update info request".to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RtpmError::UpdateInfoStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.text().await.map_err(|e| RtpmError::NetworkError {
            operation: "update info response".to_string(),
            reason: e.to_string(),
        })?;

        let info: UpdateInfo =
            serde_json::from_str(&body).map_err(|e| RtpmError::InvalidUpdateInfo {
                reason: format!("malformed JSON: {e}"),
            })?;

        AvailableUpdate::from_info(info, &self.file_url)
    }

    fn info_request_url(
        &self,
        desired_channel: Option<&str>,
        desired_version: Option<&str>,
    ) -> Result<Url> {
        let channel = desired_channel
            .or(self.channel.as_deref())
            .unwrap_or(&self.origin.channel);

        let base = format!("{}/info", self.info_url.trim_end_matches('/'));
        let mut url = Url::parse(&base)
            .with_context(|| format!("Invalid update info URL: {base}"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("channel", channel);
            query.append_pair("platform", &self.platform);
            query.append_pair("source", &self.source);
            if let Some(version) = desired_version.filter(|v| !v.is_empty()) {
                query.append_pair("target-version", version);
            }
            if let Some(tag) = self.rollout_tag.as_deref().filter(|t| !t.is_empty()) {
                query.append_pair("tag", tag);
            }
        }
        Ok(url)
    }
}

impl UpdateInfoProvider for Checker {
    async fn current_update(&self) -> Result<Option<AvailableUpdate>> {
        self.check_for(None, None).await
    }
}
