//! CurseForge wire models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a tracked mod, as configured.
pub type ModId = u64;

/// Every CurseForge response wraps its payload in a `data` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Mod metadata used to render announcements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModInfo {
    pub id: ModId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub logo: Option<ModLogo>,
}

impl ModInfo {
    pub fn logo_url(&self) -> Option<&str> {
        self.logo
            .as_ref()
            .map(|logo| logo.url.as_str())
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModLogo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// A published file of a mod. Fetched fresh every cycle, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: u64,
    pub display_name: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_date: Option<DateTime<Utc>>,
}

/// The newest file of a mod, enriched with its version token and changelog.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestFile {
    pub file: FileRecord,
    pub version: String,
    /// Markdown changelog; empty when the file has none.
    pub changelog: String,
}
