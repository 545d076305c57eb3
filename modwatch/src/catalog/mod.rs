//! Remote mod catalog.
//!
//! Fetches mod metadata and published files from the CurseForge API under a
//! shared rate-limit contract, and normalizes what the scanner needs:
//! - [`extract_version`] turns a file display name into a version token
//! - [`format_changelog`] turns HTML changelogs into Markdown text

pub mod changelog;
pub mod client;
pub mod models;
pub mod pacer;
pub mod version;

pub use changelog::format_changelog;
pub use client::{CurseForgeClient, CurseForgeConfig};
pub use models::{FileRecord, LatestFile, ModId, ModInfo, ModLogo};
pub use pacer::RequestPacer;
pub use version::extract_version;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::Result;

/// Read access to the remote catalog.
#[async_trait]
pub trait ModCatalog: Send + Sync {
    /// Mod metadata. Fails with `NotFound` for an unknown mod.
    async fn get_mod_info(&self, mod_id: ModId) -> Result<ModInfo>;

    /// Published files of a mod, newest first.
    async fn get_mod_files(&self, mod_id: ModId) -> Result<Vec<FileRecord>>;

    /// Changelog of a file as Markdown. Empty when the file has none.
    async fn get_file_changelog(&self, mod_id: ModId, file_id: u64) -> Result<String>;

    /// The newest file of a mod with its version token and changelog attached.
    ///
    /// `None` when the mod has no files; that is a valid state, not an error.
    async fn get_latest_file(&self, mod_id: ModId) -> Result<Option<LatestFile>> {
        let files = self.get_mod_files(mod_id).await?;
        let Some(file) = files.into_iter().next() else {
            warn!(mod_id, "No files found for mod");
            return Ok(None);
        };

        let version = extract_version(&file.display_name);
        let changelog = self.get_file_changelog(mod_id, file.id).await?;
        debug!(
            mod_id,
            file_id = file.id,
            version = %version,
            "Resolved latest file"
        );

        Ok(Some(LatestFile {
            file,
            version,
            changelog,
        }))
    }
}
