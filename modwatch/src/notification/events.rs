//! Release notifications and message templating.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{LatestFile, ModId, ModInfo};

/// Discord's limit on the length of an embed field value.
pub const CHANGELOG_FIELD_LIMIT: usize = 1024;

/// Appended to a truncated changelog, followed by `(<file url>)`.
const TRUNCATION_SUFFIX: &str = "...\n\n[View full changelog on CurseForge]";

/// Default header used when no template is configured.
pub const DEFAULT_HEADER_TEMPLATE: &str = "@everyone {mod_name} version {version} is now available!";

/// An announcement for one newly detected release. Built, delivered, dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseNotification {
    pub mod_id: ModId,
    pub mod_name: String,
    pub slug: String,
    pub file_id: u64,
    pub version: String,
    /// Markdown changelog, possibly empty.
    pub changelog: String,
    pub logo_url: Option<String>,
    /// Target chat channel.
    pub channel_id: u64,
    pub timestamp: DateTime<Utc>,
}

impl ReleaseNotification {
    pub fn new(info: &ModInfo, latest: &LatestFile, channel_id: u64) -> Self {
        Self {
            mod_id: info.id,
            mod_name: info.name.clone(),
            slug: info.slug.clone(),
            file_id: latest.file.id,
            version: latest.version.clone(),
            changelog: latest.changelog.clone(),
            logo_url: info.logo_url().map(str::to_string),
            channel_id,
            timestamp: Utc::now(),
        }
    }

    /// Public page of the released file.
    pub fn file_url(&self, website_url: &str) -> String {
        format!(
            "{}/{}/files/{}",
            website_url.trim_end_matches('/'),
            self.slug,
            self.file_id
        )
    }

    /// Changelog text fitted to an embed field, or `None` when there is none.
    pub fn changelog_field(&self, website_url: &str) -> Option<String> {
        if self.changelog.trim().is_empty() {
            return None;
        }
        Some(truncate_changelog(
            &self.changelog,
            &self.file_url(website_url),
        ))
    }
}

/// Cut `changelog` so that it plus a "view full changelog" link fits in
/// [`CHANGELOG_FIELD_LIMIT`] characters. Short changelogs are returned as is.
pub fn truncate_changelog(changelog: &str, file_url: &str) -> String {
    let reserved = TRUNCATION_SUFFIX.chars().count() + file_url.chars().count() + 2;
    let remaining = CHANGELOG_FIELD_LIMIT.saturating_sub(reserved);

    if changelog.chars().count() <= remaining {
        return changelog.to_string();
    }

    let head: String = changelog.chars().take(remaining).collect();
    format!("{}{}({})", head, TRUNCATION_SUFFIX, file_url)
}

/// Message templates with `{mod_name}` and `{version}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTemplates {
    /// Plain message content sent alongside the embed (e.g. a role mention).
    pub tag: String,
    pub header: Option<String>,
    pub footer: Option<String>,
}

impl MessageTemplates {
    pub fn render_header(&self, mod_name: &str, version: &str) -> String {
        let template = self
            .header
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_HEADER_TEMPLATE);
        render(template, mod_name, version)
    }

    pub fn render_footer(&self, mod_name: &str, version: &str) -> Option<String> {
        self.footer
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| render(t, mod_name, version))
    }
}

fn render(template: &str, mod_name: &str, version: &str) -> String {
    template
        .replace("{mod_name}", mod_name)
        .replace("{version}", version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileRecord;

    const WEBSITE: &str = "https://www.curseforge.com/ark-survival-ascended/mods";

    fn notification(changelog: &str) -> ReleaseNotification {
        let info = ModInfo {
            id: 101,
            name: "Cool Mod".to_string(),
            slug: "cool-mod".to_string(),
            logo: None,
        };
        let latest = LatestFile {
            file: FileRecord {
                id: 555,
                display_name: "WindowsServer 42.zip".to_string(),
                file_name: String::new(),
                file_date: None,
            },
            version: "42".to_string(),
            changelog: changelog.to_string(),
        };
        ReleaseNotification::new(&info, &latest, 9)
    }

    #[test]
    fn test_file_url() {
        assert_eq!(
            notification("").file_url(&format!("{}/", WEBSITE)),
            format!("{}/cool-mod/files/555", WEBSITE)
        );
    }

    #[test]
    fn test_empty_changelog_has_no_field() {
        assert_eq!(notification("").changelog_field(WEBSITE), None);
        assert_eq!(notification("  \n").changelog_field(WEBSITE), None);
    }

    #[test]
    fn test_short_changelog_is_untouched() {
        assert_eq!(
            notification("fix").changelog_field(WEBSITE),
            Some("fix".to_string())
        );
    }

    #[test]
    fn test_long_changelog_is_truncated_to_limit() {
        let url = format!("{}/cool-mod/files/555", WEBSITE);
        let long = "x".repeat(5000);

        let field = truncate_changelog(&long, &url);

        assert_eq!(field.chars().count(), CHANGELOG_FIELD_LIMIT);
        assert!(field.ends_with(&format!("[View full changelog on CurseForge]({})", url)));
        assert!(field.starts_with("xxx"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let url = "https://example.com/f/1";
        let long = "é".repeat(2000);
        let field = truncate_changelog(&long, url);
        assert_eq!(field.chars().count(), CHANGELOG_FIELD_LIMIT);
    }

    #[test]
    fn test_default_header() {
        let templates = MessageTemplates::default();
        assert_eq!(
            templates.render_header("Cool Mod", "42"),
            "@everyone Cool Mod version 42 is now available!"
        );
        assert_eq!(templates.render_footer("Cool Mod", "42"), None);
    }

    #[test]
    fn test_custom_templates() {
        let templates = MessageTemplates {
            tag: "<@&1>".to_string(),
            header: Some("{mod_name} {version} is out".to_string()),
            footer: Some("Thanks for playing {mod_name}!".to_string()),
        };
        assert_eq!(templates.render_header("Cool Mod", "42"), "Cool Mod 42 is out");
        assert_eq!(
            templates.render_footer("Cool Mod", "42").as_deref(),
            Some("Thanks for playing Cool Mod!")
        );
    }
}
