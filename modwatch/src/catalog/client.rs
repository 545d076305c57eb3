//! CurseForge REST client.
//!
//! Rate limit handling:
//! - Every call waits until `request_delay` has passed since the previous
//!   call completed (see [`RequestPacer`])
//! - 429 responses are retried after the server's Retry-After delay, or a
//!   fixed default when the header is missing
//! - Other non-2xx responses are returned to the caller, never retried

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::models::{ApiResponse, FileRecord, ModId, ModInfo};
use super::pacer::RequestPacer;
use super::{ModCatalog, format_changelog};
use crate::utils::http_client;
use crate::{Error, Result};

/// Default CurseForge API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.curseforge.com/v1";

/// Game id of ARK: Survival Ascended.
pub const DEFAULT_GAME_ID: u64 = 828326;

/// CurseForge client configuration.
#[derive(Debug, Clone)]
pub struct CurseForgeConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,
    /// Key sent as `x-api-key`.
    pub api_key: String,
    /// Game the tracked mods belong to.
    pub game_id: u64,
    /// Minimum gap between the end of one request and the start of the next.
    pub request_delay: Duration,
    /// Wait used when a 429 carries no usable Retry-After header.
    pub default_retry_after: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for CurseForgeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            game_id: DEFAULT_GAME_ID,
            request_delay: Duration::from_secs(1),
            default_retry_after: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }
}

/// CurseForge catalog client.
pub struct CurseForgeClient {
    client: reqwest::Client,
    config: CurseForgeConfig,
    pacer: RequestPacer,
}

impl CurseForgeClient {
    /// Create a new client.
    pub fn new(config: CurseForgeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| Error::config("CURSEFORGE_API_KEY contains invalid header characters"))?;
        headers.insert("x-api-key", api_key);

        let client = http_client::build_client(config.timeout, headers)?;
        let pacer = RequestPacer::new(config.request_delay);

        Ok(Self {
            client,
            config,
            pacer,
        })
    }

    pub fn config(&self) -> &CurseForgeConfig {
        &self.config
    }

    /// Issue a paced GET and decode the `data` envelope.
    async fn get_data<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);

        loop {
            let permit = self.pacer.acquire().await;
            debug!(endpoint, "Requesting catalog endpoint");

            // The permit covers the whole exchange, body included, so the
            // next request is spaced from the moment this one finished.
            let result = self.fetch(&url).await;
            drop(permit);

            let (status, headers, body) =
                result.map_err(|e| Error::transient(format!("GET {} failed: {}", endpoint, e)))?;
            debug!(endpoint, status = status.as_u16(), "Catalog response received");

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = parse_retry_after(&headers).unwrap_or(self.config.default_retry_after);
                warn!(endpoint, ?wait, "Catalog rate limit exceeded, retrying");
                tokio::time::sleep(wait).await;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(Error::not_found("Resource", endpoint));
            }

            if status.is_server_error() {
                return Err(Error::transient(format!("GET {} returned {}", endpoint, status)));
            }

            if !status.is_success() {
                return Err(Error::Api {
                    status: status.as_u16(),
                    message: String::from_utf8_lossy(&body).into_owned(),
                });
            }

            let envelope: ApiResponse<T> = serde_json::from_slice(&body)?;
            return Ok(envelope.data);
        }
    }

    async fn fetch(&self, url: &str) -> reqwest::Result<(StatusCode, HeaderMap, bytes::Bytes)> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok((status, headers, body))
    }
}

/// Longest wait honored from a Retry-After header.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(15 * 60);

/// Parse a Retry-After header given in (possibly fractional) seconds.
///
/// Negative, non-numeric and unrepresentable values yield `None`; large
/// values are capped at fifteen minutes.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()?;

    Duration::try_from_secs_f64(secs)
        .ok()
        .map(|wait| wait.min(MAX_RETRY_AFTER))
}

#[async_trait]
impl ModCatalog for CurseForgeClient {
    async fn get_mod_info(&self, mod_id: ModId) -> Result<ModInfo> {
        self.get_data::<ModInfo>(&format!("/mods/{}", mod_id))
            .await
            .map_err(|e| match e {
                Error::NotFound { .. } => Error::not_found("Mod", mod_id.to_string()),
                other => other,
            })
    }

    async fn get_mod_files(&self, mod_id: ModId) -> Result<Vec<FileRecord>> {
        let endpoint = format!(
            "/mods/{}/files?gameId={}&orderBy=dateCreated&sortOrder=desc",
            mod_id, self.config.game_id
        );
        let mut files = self
            .get_data::<Vec<FileRecord>>(&endpoint)
            .await
            .map_err(|e| match e {
                Error::NotFound { .. } => Error::not_found("Mod", mod_id.to_string()),
                other => other,
            })?;

        // The sort hint is not guaranteed to be honored. Stable, so files
        // without a date keep the server's order behind dated ones.
        files.sort_by(|a, b| b.file_date.cmp(&a.file_date));
        debug!(mod_id, count = files.len(), "Fetched mod files");
        Ok(files)
    }

    async fn get_file_changelog(&self, mod_id: ModId, file_id: u64) -> Result<String> {
        let endpoint = format!("/mods/{}/files/{}/changelog", mod_id, file_id);
        match self.get_data::<Option<String>>(&endpoint).await {
            Ok(html) => Ok(format_changelog(html.as_deref().unwrap_or_default())),
            Err(Error::NotFound { .. }) => {
                debug!(mod_id, file_id, "File has no changelog");
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }
}
