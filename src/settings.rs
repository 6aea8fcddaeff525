//! Cached API credentials for the CLI.
//!
//! The conversion core never reads or writes this file: the CLI loads it,
//! merges it with flags and environment, and passes plain values down.
//!
//! Location: `$TDCONV_CONFIG_DIR/settings.json`, falling back to
//! `<platform config dir>/tdconv/settings.json`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File name inside the config directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Persisted credential cache.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_id", &self.api_id)
            .field("api_hash", &self.api_hash.as_ref().map(|_| "<redacted>"))
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

/// Config directory, honoring the `TDCONV_CONFIG_DIR` override.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("TDCONV_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join("tdconv"))
}

/// Full path of the settings file, if a config directory is known.
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(SETTINGS_FILE))
}

impl Settings {
    /// Load from `path`. A missing file is an empty cache; an unreadable or
    /// corrupt one is ignored with a warning.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cached settings");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read settings; ignoring");
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt settings file; ignoring");
                Self::default()
            }
        }
    }

    /// Persist to `path` with temp-then-rename, owner-only on Unix.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_vec_pretty(self).context("failed to serialize settings")?;
        write_private_atomic(path, &content)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Remember a credential pair, stamping the save time.
    pub fn remember(&mut self, api_id: i32, api_hash: &str) {
        self.api_id = Some(api_id);
        self.api_hash = Some(api_hash.to_string());
        self.saved_at = Some(Utc::now());
    }

    /// Whether `api_id`/`api_hash` already match what is cached.
    pub fn holds(&self, api_id: i32, api_hash: &str) -> bool {
        self.api_id == Some(api_id) && self.api_hash.as_deref() == Some(api_hash)
    }
}

/// Write `content` to `target` via a temp file in the same directory.
///
/// Either the old file stays intact or the new one is fully written and
/// fsynced.
fn write_private_atomic(target: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let parent = target.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;

    let temp_path = parent.join(format!(
        ".tdconv-tmp-{}",
        uuid::Uuid::new_v4().as_hyphenated()
    ));

    let write_result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&temp_path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(content)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&temp_path, target) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_cache() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let settings = Settings::load(&tmp.path().join(SETTINGS_FILE));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load_keeps_credentials() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("nested/dir").join(SETTINGS_FILE);

        let mut settings = Settings::default();
        settings.remember(12345, "abc123");
        settings.save(&path).expect("save");

        let loaded = Settings::load(&path);
        assert!(loaded.holds(12345, "abc123"));
        assert!(loaded.saved_at.is_some());

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tdconv-tmp-"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind");
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join(SETTINGS_FILE);
        let mut settings = Settings::default();
        settings.remember(1, "h");
        settings.save(&path).expect("save");

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").expect("write");
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn debug_redacts_api_hash() {
        let mut settings = Settings::default();
        settings.remember(7, "s3cret-hash");
        assert!(!format!("{settings:?}").contains("s3cret-hash"));
    }
}
