//! Release version extraction from file display names.

use std::sync::LazyLock;

use regex::Regex;

/// Dedicated-server archives are named like `WindowsServer 1234.zip`; the
/// number is the build identifier shared by every upload of that release.
pub static SERVER_BUILD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"windowsserver\s+(\d+)\.zip").unwrap());

/// Derive the canonical version token for a file display name.
///
/// Returns the captured build number when the name matches
/// [`SERVER_BUILD_REGEX`] (case-insensitively), otherwise the display name
/// itself. Never fails.
pub fn extract_version(display_name: &str) -> String {
    SERVER_BUILD_REGEX
        .captures(&display_name.to_lowercase())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| display_name.to_string())
}
