//! Discord bot notification channel.
//!
//! Talks to the Discord REST API directly with a bot token:
//! - posts the announcement embed to the routed channel
//! - optionally adds reactions and crossposts (publishes) the message
//! - retries 429 responses respecting the Retry-After header

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::NotificationDispatcher;
use crate::catalog::client::parse_retry_after;
use crate::notification::events::{MessageTemplates, ReleaseNotification};
use crate::utils::http_client;
use crate::{Error, Result};

/// Maximum number of retries for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Embed color for release announcements (green).
const RELEASE_COLOR: u32 = 0x2ecc71;

/// Discord rejects empty field values; a zero-width space renders as nothing.
const EMPTY_FIELD_VALUE: &str = "\u{200b}";

/// Discord dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// REST API base URL, without trailing slash.
    pub api_base: String,
    /// Bot token, sent as `Authorization: Bot <token>`.
    pub bot_token: String,
    pub templates: MessageTemplates,
    /// Base of the public mod pages, used for "view full changelog" links.
    pub website_url: String,
    /// Attach the mod logo as the embed thumbnail.
    pub show_logo: bool,
    /// React to each announcement with [`DiscordConfig::reactions`].
    pub add_reactions: bool,
    pub reactions: Vec<String>,
    /// Crosspost announcements posted in announcement channels.
    pub publish: bool,
    /// Delay between readiness probes while Discord is unreachable.
    pub ready_retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: "https://discord.com/api/v10".to_string(),
            bot_token: String::new(),
            templates: MessageTemplates::default(),
            website_url: "https://www.curseforge.com/ark-survival-ascended/mods".to_string(),
            show_logo: true,
            add_reactions: true,
            reactions: vec!["👍".to_string(), "❤️".to_string()],
            publish: false,
            ready_retry_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
    username: String,
}

/// Discord notification channel.
pub struct DiscordDispatcher {
    config: DiscordConfig,
    client: reqwest::Client,
}

impl DiscordDispatcher {
    /// Create a new Discord dispatcher.
    pub fn new(config: DiscordConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bot {}", config.bot_token))
            .map_err(|_| Error::config("BOT_TOKEN contains invalid header characters"))?;
        headers.insert(AUTHORIZATION, auth);

        let client = http_client::build_client(config.timeout, headers)?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Build the message payload for a notification.
    fn build_payload(&self, notification: &ReleaseNotification) -> serde_json::Value {
        let templates = &self.config.templates;
        let header = templates.render_header(&notification.mod_name, &notification.version);

        let mut embed = json!({
            "title": notification.mod_name,
            "description": header,
            "color": RELEASE_COLOR,
            "timestamp": notification.timestamp.to_rfc3339(),
        });

        if self.config.show_logo
            && let Some(logo_url) = &notification.logo_url
        {
            embed["thumbnail"] = json!({ "url": logo_url });
        }

        let mut fields = Vec::new();
        if let Some(changelog) = notification.changelog_field(&self.config.website_url) {
            fields.push(json!({
                "name": "Changelog",
                "value": changelog,
                "inline": false,
            }));
        }
        if let Some(footer) = templates.render_footer(&notification.mod_name, &notification.version)
        {
            fields.push(json!({
                "name": footer,
                "value": EMPTY_FIELD_VALUE,
                "inline": false,
            }));
        }
        if !fields.is_empty() {
            embed["fields"] = json!(fields);
        }

        let mut payload = json!({ "embeds": [embed] });
        if !templates.tag.is_empty() {
            payload["content"] = json!(templates.tag);
        }
        payload
    }

    /// Send request with rate limit handling.
    /// Retries on 429 responses respecting the Retry-After header.
    async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<bytes::Bytes> {
        let url = self.url(path);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let mut request = self.client.request(method.clone(), &url);
            request = match payload {
                Some(body) => request.json(body),
                // Discord requires a length on bodiless PUT/POST.
                None => request.header(reqwest::header::CONTENT_LENGTH, 0),
            };

            let response = request
                .send()
                .await
                .map_err(|e| Error::dispatch(format!("Discord request failed: {}", e)))?;
            let status = response.status();

            if status.is_success() {
                return response
                    .bytes()
                    .await
                    .map_err(|e| Error::dispatch(format!("Discord response unreadable: {}", e)));
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = parse_retry_after(response.headers());

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        "Discord rate limit: max retries ({}) exceeded, last retry_after was {:?}",
                        MAX_RATE_LIMIT_RETRIES, retry_after
                    );
                    return Err(Error::dispatch(format!(
                        "Discord rate limit exceeded after {} retries",
                        MAX_RATE_LIMIT_RETRIES
                    )));
                }

                let wait_duration = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(
                    "Discord rate limited (429), waiting {:?} before retry (attempt {}/{})",
                    wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait_duration).await;
                continue;
            }

            // Other error - don't retry
            let body = response.text().await.unwrap_or_default();
            return Err(Error::dispatch(format!(
                "{} {} failed: {} - {}",
                method, path, status, body
            )));
        }
    }

    async fn add_reactions(&self, channel_id: u64, message_id: &str) {
        for reaction in &self.config.reactions {
            let path = format!(
                "/channels/{}/messages/{}/reactions/{}/@me",
                channel_id,
                message_id,
                urlencoding::encode(reaction)
            );
            match self.send_with_retry(Method::PUT, &path, None).await {
                Ok(_) => debug!(channel_id, reaction = %reaction, "Added reaction"),
                Err(e) => warn!(channel_id, reaction = %reaction, error = %e, "Failed to add reaction"),
            }
        }
    }

    async fn publish(&self, channel_id: u64, message_id: &str) {
        let path = format!("/channels/{}/messages/{}/crosspost", channel_id, message_id);
        match self.send_with_retry(Method::POST, &path, None).await {
            Ok(_) => debug!(channel_id, "Message published"),
            // Typical causes: missing permission, or not an announcement channel.
            Err(e) => warn!(channel_id, error = %e, "Failed to publish message"),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for DiscordDispatcher {
    fn channel_type(&self) -> &'static str {
        "discord"
    }

    async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let probe = self.client.get(self.url("/users/@me")).send().await;

            match probe {
                Ok(response) if response.status().is_success() => {
                    match response.json::<CurrentUser>().await {
                        Ok(user) => {
                            info!(user_id = %user.id, username = %user.username, "Logged in to Discord");
                            return Ok(());
                        }
                        Err(e) => warn!(error = %e, "Unreadable Discord user response, retrying"),
                    }
                }
                Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                    return Err(Error::config(
                        "Discord rejected the bot token, check BOT_TOKEN",
                    ));
                }
                Ok(response) => {
                    warn!(status = %response.status(), "Discord not ready, retrying");
                }
                Err(e) => {
                    warn!(error = %e, "Discord unreachable, retrying");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.config.ready_retry_delay) => {}
            }
        }
    }

    async fn deliver(&self, notification: &ReleaseNotification) -> Result<()> {
        let channel_id = notification.channel_id;
        let payload = self.build_payload(notification);

        let body = self
            .send_with_retry(
                Method::POST,
                &format!("/channels/{}/messages", channel_id),
                Some(&payload),
            )
            .await?;
        let message: CreatedMessage = serde_json::from_slice(&body)?;
        debug!(channel_id, message_id = %message.id, "Message sent");

        if self.config.add_reactions {
            self.add_reactions(channel_id, &message.id).await;
        }
        if self.config.publish {
            self.publish(channel_id, &message.id).await;
        }

        info!(
            mod_id = notification.mod_id,
            mod_name = %notification.mod_name,
            version = %notification.version,
            channel_id,
            "Sent release notification"
        );
        Ok(())
    }
}
