//! Environment-driven application configuration.
//!
//! Every setting comes from an environment variable (a `.env` file is loaded
//! first by `main`). Parsing never fails on its own: malformed values are
//! collected and reported together with missing required settings by
//! [`AppConfig::validate`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::api::ApiServerConfig;
use crate::catalog::{CurseForgeConfig, ModId};
use crate::catalog::client::{DEFAULT_BASE_URL, DEFAULT_GAME_ID};
use crate::logging::LoggingSettings;
use crate::notification::{ChannelRouter, DiscordConfig, MessageTemplates};
use crate::scheduler::ScannerConfig;
use crate::{Error, Result};

const DEFAULT_WEBSITE_URL: &str = "https://www.curseforge.com/ark-survival-ascended/mods";
const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v10";
const DEFAULT_DATABASE_PATH: &str = "releases/releases.db";
const DEFAULT_API_BIND_ADDRESS: &str = "127.0.0.1";
const DEFAULT_API_PORT: u16 = 12580;

#[derive(Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub curseforge_api_key: String,
    pub mod_ids: Vec<ModId>,
    pub release_channel_ids: Vec<u64>,
    pub debug_channel_id: Option<u64>,

    pub message_tag: String,
    pub message_header: Option<String>,
    pub message_footer: Option<String>,
    pub announce_messages: bool,
    pub show_logo: bool,
    pub add_reactions: bool,
    pub debug: bool,

    pub check_interval: Duration,
    pub request_delay: Duration,
    pub mod_pacing_delay: Duration,
    pub rate_limit_default_retry: Duration,

    pub curseforge_api_url: String,
    pub curseforge_game_id: u64,
    pub curseforge_website_url: String,
    pub discord_api_url: String,

    pub database_path: PathBuf,
    pub api_enabled: bool,
    pub api_bind_address: String,
    pub api_port: u16,
    pub admin_token: Option<String>,
    pub log_dir: Option<PathBuf>,

    /// Malformed values seen while reading the environment.
    parse_errors: Vec<String>,
}

// Secrets stay out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("mod_ids", &self.mod_ids)
            .field("release_channel_ids", &self.release_channel_ids)
            .field("debug_channel_id", &self.debug_channel_id)
            .field("debug", &self.debug)
            .field("announce_messages", &self.announce_messages)
            .field("check_interval", &self.check_interval)
            .field("request_delay", &self.request_delay)
            .field("curseforge_api_url", &self.curseforge_api_url)
            .field("database_path", &self.database_path)
            .field("api_enabled", &self.api_enabled)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to
    /// its value. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(lookup);

        let release_channel_ids = match env.string("RELEASES_CHANNEL_IDS") {
            Some(_) => env.list("RELEASES_CHANNEL_IDS"),
            None => env.list("RELEASES_CHANNEL_ID"),
        };

        let config = Self {
            bot_token: env.string("BOT_TOKEN").unwrap_or_default(),
            curseforge_api_key: env.string("CURSEFORGE_API_KEY").unwrap_or_default(),
            mod_ids: env.list("MOD_IDS"),
            release_channel_ids,
            debug_channel_id: env.number("DEBUG_CHANNEL_ID"),

            message_tag: env.string("MESSAGE_TAG").unwrap_or_default(),
            message_header: env.string("MESSAGE_HEADER"),
            message_footer: env.string("MESSAGE_FOOTER"),
            announce_messages: env.flag("ANNOUNCE_MESSAGES", false),
            show_logo: env.flag("SHOW_LOGO", true),
            add_reactions: env.flag("ADD_REACTIONS", true),
            debug: env.flag("DEBUG", false),

            check_interval: Duration::from_secs(env.number("CHECK_INTERVAL_SECS").unwrap_or(300)),
            request_delay: Duration::from_millis(env.number("REQUEST_DELAY_MS").unwrap_or(1000)),
            mod_pacing_delay: Duration::from_millis(
                env.number("MOD_PACING_DELAY_MS").unwrap_or(2000),
            ),
            rate_limit_default_retry: Duration::from_secs(
                env.number("RATE_LIMIT_DEFAULT_RETRY_SECS").unwrap_or(5),
            ),

            curseforge_api_url: env
                .string("CURSEFORGE_API_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            curseforge_game_id: env.number("CURSEFORGE_GAME_ID").unwrap_or(DEFAULT_GAME_ID),
            curseforge_website_url: env
                .string("CURSEFORGE_WEBSITE_URL")
                .unwrap_or_else(|| DEFAULT_WEBSITE_URL.to_string()),
            discord_api_url: env
                .string("DISCORD_API_URL")
                .unwrap_or_else(|| DEFAULT_DISCORD_API_URL.to_string()),

            database_path: env
                .string("DATABASE_PATH")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string())
                .into(),
            api_enabled: env.flag("API_ENABLED", false),
            api_bind_address: env
                .string("API_BIND_ADDRESS")
                .unwrap_or_else(|| DEFAULT_API_BIND_ADDRESS.to_string()),
            api_port: env.number("API_PORT").unwrap_or(DEFAULT_API_PORT),
            admin_token: env.string("ADMIN_TOKEN"),
            log_dir: env.string("LOG_DIR").map(PathBuf::from),

            parse_errors: Vec::new(),
        };

        Self {
            parse_errors: env.errors,
            ..config
        }
    }

    /// Read and validate the process environment.
    pub fn load() -> Result<Self> {
        Self::from_env().validated()
    }

    /// `self` when usable, otherwise every problem, one per line.
    pub fn validated(self) -> Result<Self> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(self);
        }
        Err(Error::config(format!(
            "invalid settings\n  - {}",
            errors.join("\n  - ")
        )))
    }

    /// Every problem with this configuration; empty when it is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.parse_errors.clone();

        if self.bot_token.is_empty() {
            errors.push("BOT_TOKEN is required".to_string());
        }
        if self.curseforge_api_key.is_empty() {
            errors.push("CURSEFORGE_API_KEY is required".to_string());
        }
        if self.mod_ids.is_empty() {
            errors.push("MOD_IDS must list at least one mod ID".to_string());
        }
        if self.debug {
            if self.debug_channel_id.is_none() {
                errors.push("DEBUG_CHANNEL_ID is required when DEBUG is enabled".to_string());
            }
        } else if self.release_channel_ids.is_empty() {
            errors.push("RELEASES_CHANNEL_IDS must list at least one channel ID".to_string());
        }
        if self.check_interval.is_zero() {
            errors.push("CHECK_INTERVAL_SECS must be greater than zero".to_string());
        }
        if self.api_enabled && self.admin_token.is_none() {
            errors.push("ADMIN_TOKEN is required when API_ENABLED is set".to_string());
        }

        errors
    }

    pub fn curseforge_config(&self) -> CurseForgeConfig {
        CurseForgeConfig {
            base_url: self.curseforge_api_url.trim_end_matches('/').to_string(),
            api_key: self.curseforge_api_key.clone(),
            game_id: self.curseforge_game_id,
            request_delay: self.request_delay,
            default_retry_after: self.rate_limit_default_retry,
            ..CurseForgeConfig::default()
        }
    }

    pub fn discord_config(&self) -> DiscordConfig {
        DiscordConfig {
            api_base: self.discord_api_url.trim_end_matches('/').to_string(),
            bot_token: self.bot_token.clone(),
            templates: MessageTemplates {
                tag: self.message_tag.clone(),
                header: self.message_header.clone(),
                footer: self.message_footer.clone(),
            },
            website_url: self.curseforge_website_url.clone(),
            show_logo: self.show_logo,
            add_reactions: self.add_reactions,
            // Debug posts never leave the debug channel.
            publish: self.announce_messages && !self.debug,
            ..DiscordConfig::default()
        }
    }

    pub fn channel_router(&self) -> ChannelRouter {
        let debug_channel = if self.debug {
            self.debug_channel_id
        } else {
            None
        };
        ChannelRouter::new(
            self.mod_ids.clone(),
            self.release_channel_ids.clone(),
            debug_channel,
        )
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            mod_ids: self.mod_ids.clone(),
            check_interval: self.check_interval,
            pacing_delay: self.mod_pacing_delay,
        }
    }

    pub fn api_server_config(&self) -> ApiServerConfig {
        ApiServerConfig {
            bind_address: self.api_bind_address.clone(),
            port: self.api_port,
            admin_token: self.admin_token.clone().unwrap_or_default(),
            ..ApiServerConfig::default()
        }
    }

    pub fn logging_settings(&self) -> LoggingSettings {
        LoggingSettings {
            debug: self.debug,
            log_dir: self.log_dir.clone(),
        }
    }
}

/// Typed access to variables, recording malformed values instead of failing.
struct EnvReader<F> {
    lookup: F,
    errors: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            errors: Vec::new(),
        }
    }

    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.string(key).map_or(default, |v| {
            matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
        })
    }

    fn number<T: FromStr>(&mut self, key: &str) -> Option<T> {
        let raw = self.string(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.errors
                    .push(format!("{} must be a non-negative integer, got '{}'", key, raw));
                None
            }
        }
    }

    fn list<T: FromStr>(&mut self, key: &str) -> Vec<T> {
        let Some(raw) = self.string(key) else {
            return Vec::new();
        };

        let mut values = Vec::new();
        for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item.parse() {
                Ok(value) => values.push(value),
                Err(_) => self
                    .errors
                    .push(format!("{} contains an invalid ID: '{}'", key, item)),
            }
        }
        values
    }
}
