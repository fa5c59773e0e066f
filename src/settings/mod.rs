//! Settings Management
//!
//! This module provides [`SettingsManager`], a bounded key/value store that
//! persists to a plain text file.
//!
//! # File Format
//! ```text
//! # myapp settings
//! theme=dark
//! greeting=hello\nworld
//! ```
//! - One `key=value` pair per line, split at the first `=`
//! - Blank lines and lines starting with `#` are ignored
//! - Keys are trimmed; values are taken verbatim after `=`
//! - Values escape `\` as `\\`, line feed as `\n`, carriage return as `\r`
//!
//! # Default Location
//! A store that was never loaded from or saved to an explicit path saves to
//! `<config dir>/<app name>/settings.conf` (e.g. `~/.config/myapp/settings.conf`).

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{ConfdbError, Result};

/// Maximum number of settings a store may hold
pub const MAX_SETTINGS: usize = 100;

/// File name used under the per-application config directory
pub const SETTINGS_FILE_NAME: &str = "settings.conf";

/// Load/save capability for configuration stores
pub trait ConfigStore {
    /// Replace the store contents with the contents of `path`
    fn load_config(&mut self, path: &Path) -> Result<()>;

    /// Persist the store contents to its associated file
    fn save_config(&self) -> Result<()>;
}

/// Bounded key/value settings store
#[derive(Debug, Clone)]
pub struct SettingsManager {
    app_name: String,
    settings: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

impl SettingsManager {
    /// Create an empty store for `app_name`
    pub fn new(app_name: impl Into<String>) -> Self {
        Self { app_name: app_name.into(), settings: BTreeMap::new(), path: None }
    }

    /// Application name given at construction
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// File this store was last loaded from or saved to
    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Value for `key`, or an empty string if absent
    #[must_use]
    pub fn get_setting(&self, key: &str) -> String {
        self.setting(key).map(str::to_string).unwrap_or_default()
    }

    /// Value for `key`, `None` if absent
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Insert or overwrite `key`
    ///
    /// Fails with [`ConfdbError::CapacityExceeded`] if `key` is new and the
    /// store already holds [`MAX_SETTINGS`] entries. The store is unchanged
    /// on failure.
    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        validate_key(&key)?;

        if !self.settings.contains_key(&key) && self.settings.len() >= MAX_SETTINGS {
            return Err(ConfdbError::capacity_exceeded(MAX_SETTINGS));
        }

        self.settings.insert(key, value.into());
        Ok(())
    }

    /// Whether `key` is present
    #[must_use]
    pub fn has_setting(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    /// Remove `key`, returning its value
    pub fn remove_setting(&mut self, key: &str) -> Option<String> {
        self.settings.remove(key)
    }

    /// Number of stored settings
    #[must_use]
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Iterate settings in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.settings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Write the store to `path` and associate the store with it
    pub fn save_config_to(&mut self, path: &Path) -> Result<()> {
        write_settings(path, &self.app_name, &self.settings)?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Path `save_config` writes to
    pub fn resolve_save_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => default_settings_path(&self.app_name),
        }
    }
}

impl ConfigStore for SettingsManager {
    fn load_config(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ConfdbError::config_load(format!("Could not read {}: {e}", path.display()))
        })?;

        let settings = parse_settings(&contents)?;
        info!(path = %path.display(), count = settings.len(), "loaded settings");

        self.settings = settings;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn save_config(&self) -> Result<()> {
        let path = self.resolve_save_path()?;
        write_settings(&path, &self.app_name, &self.settings)
    }
}

/// Default settings file for `app_name` under the user config directory
///
/// `app_name` must be a single plain path component: not blank, no
/// separators, not `.` or `..`.
pub fn default_settings_path(app_name: &str) -> Result<PathBuf> {
    validate_app_name(app_name)?;

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfdbError::config_save("Could not determine user config directory"))?;

    Ok(config_dir.join(app_name).join(SETTINGS_FILE_NAME))
}

fn validate_app_name(app_name: &str) -> Result<()> {
    let mut components = Path::new(app_name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if app_name.trim().is_empty() || app_name.contains(['/', '\\']) || !single_normal {
        return Err(ConfdbError::invalid_argument(format!(
            "Application name '{app_name}' cannot be used as a directory name"
        )));
    }
    Ok(())
}

/// Keys must survive a save/load round trip unchanged
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ConfdbError::invalid_argument("Setting key cannot be empty"));
    }
    if key.contains(['=', '\n', '\r']) {
        return Err(ConfdbError::invalid_argument(format!(
            "Setting key '{}' cannot contain '=' or line breaks",
            key.escape_debug()
        )));
    }
    if key.trim() != key {
        return Err(ConfdbError::invalid_argument(format!(
            "Setting key '{key}' cannot start or end with whitespace"
        )));
    }
    if key.starts_with('#') {
        return Err(ConfdbError::invalid_argument(format!(
            "Setting key '{key}' cannot start with '#'"
        )));
    }
    Ok(())
}

fn parse_settings(contents: &str) -> Result<BTreeMap<String, String>> {
    let mut settings = BTreeMap::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (key, value) = trimmed.split_once('=').ok_or_else(|| {
            ConfdbError::config_load(format!("Line {line_no}: expected 'key=value'"))
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ConfdbError::config_load(format!("Line {line_no}: empty key")));
        }

        let value = unescape_value(value)
            .map_err(|reason| ConfdbError::config_load(format!("Line {line_no}: {reason}")))?;

        settings.insert(key.to_string(), value);
        if settings.len() > MAX_SETTINGS {
            return Err(ConfdbError::capacity_exceeded(MAX_SETTINGS));
        }
    }

    Ok(settings)
}

/// Write via a temp file in the target directory, then rename over `path`
fn write_settings(path: &Path, app_name: &str, settings: &BTreeMap<String, String>) -> Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|e| {
                ConfdbError::config_save(format!("Could not create {}: {e}", parent.display()))
            })?;
            parent
        }
        None => Path::new("."),
    };

    let mut contents = format!("# {app_name} settings\n");
    for (key, value) in settings {
        contents.push_str(key);
        contents.push('=');
        contents.push_str(&escape_value(value));
        contents.push('\n');
    }

    let write_err =
        |e: std::io::Error| ConfdbError::config_save(format!("Could not write {}: {e}", path.display()));

    // Dropping the temp file on any error below removes it
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!(path = %path.display(), count = settings.len(), "saved settings");
    Ok(())
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_value(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => return Err(format!("invalid escape sequence '\\{other}'")),
            None => return Err("dangling '\\' at end of value".to_string()),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_store_is_empty() {
        let settings = SettingsManager::new("myapp");
        assert_eq!(settings.app_name(), "myapp");
        assert!(settings.is_empty());
        assert!(!settings.has_setting("theme"));
        assert_eq!(settings.get_setting("theme"), "");
        assert!(settings.config_path().is_none());
    }

    #[test]
    fn test_set_get_overwrite() {
        let mut settings = SettingsManager::new("myapp");
        settings.set_setting("theme", "light").unwrap();
        settings.set_setting("theme", "dark").unwrap();
        assert_eq!(settings.get_setting("theme"), "dark");
        assert_eq!(settings.len(), 1);
    }

    #[test]
    fn test_empty_value_distinct_from_absent() {
        let mut settings = SettingsManager::new("myapp");
        settings.set_setting("blank", "").unwrap();
        assert_eq!(settings.setting("blank"), Some(""));
        assert_eq!(settings.setting("missing"), None);
        assert_eq!(settings.get_setting("missing"), "");
    }

    #[test]
    fn test_capacity_limit() {
        let mut settings = SettingsManager::new("myapp");
        for i in 0..MAX_SETTINGS {
            settings.set_setting(format!("key{i}"), "v").unwrap();
        }

        let err = settings.set_setting("one_too_many", "v").unwrap_err();
        assert!(matches!(err, ConfdbError::CapacityExceeded { capacity: MAX_SETTINGS }));
        assert_eq!(settings.len(), MAX_SETTINGS);
        assert!(!settings.has_setting("one_too_many"));

        // overwriting at capacity is fine
        settings.set_setting("key0", "updated").unwrap();
        assert_eq!(settings.get_setting("key0"), "updated");
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let mut settings = SettingsManager::new("myapp");
        for key in ["", "a=b", "line\nbreak", " padded", "padded ", "#comment"] {
            let err = settings.set_setting(key, "v").unwrap_err();
            assert!(matches!(err, ConfdbError::InvalidArgument(_)), "key {key:?}");
        }
        assert!(settings.is_empty());
    }

    #[test]
    fn test_remove_setting() {
        let mut settings = SettingsManager::new("myapp");
        settings.set_setting("theme", "dark").unwrap();
        assert_eq!(settings.remove_setting("theme"), Some("dark".to_string()));
        assert_eq!(settings.remove_setting("theme"), None);
        assert!(!settings.has_setting("theme"));
    }

    #[test]
    fn test_iter_sorted_by_key() {
        let mut settings = SettingsManager::new("myapp");
        settings.set_setting("b", "2").unwrap();
        settings.set_setting("a", "1").unwrap();
        let pairs: Vec<_> = settings.iter().collect();
        assert_eq!(pairs, vec![("a", "1"), ("b", "2")]);
    }

    #[test]
    fn test_parse_settings() {
        let parsed = parse_settings(
            "# comment\n\n  theme = dark\nurl=http://x/?a=b\nempty=\nmulti=one\\ntwo\\\\\n",
        )
        .unwrap();
        assert_eq!(parsed.get("theme").map(String::as_str), Some(" dark"));
        assert_eq!(parsed.get("url").map(String::as_str), Some("http://x/?a=b"));
        assert_eq!(parsed.get("empty").map(String::as_str), Some(""));
        assert_eq!(parsed.get("multi").map(String::as_str), Some("one\ntwo\\"));
    }

    #[test]
    fn test_parse_duplicate_keys_last_wins() {
        let parsed = parse_settings("k=1\nk=2\n").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get("k").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_parse_malformed_lines() {
        let err = parse_settings("ok=1\nno separator\n").unwrap_err();
        assert!(matches!(err, ConfdbError::ConfigLoad(_)));
        assert!(err.message().contains("Line 2"));

        let err = parse_settings("=value\n").unwrap_err();
        assert!(err.message().contains("empty key"));

        let err = parse_settings("k=bad\\q\n").unwrap_err();
        assert!(err.message().contains("invalid escape"));

        let err = parse_settings("k=dangling\\\n").unwrap_err();
        assert!(err.message().contains("dangling"));
    }

    #[test]
    fn test_parse_over_capacity() {
        let contents: String = (0..=MAX_SETTINGS).map(|i| format!("key{i}=v\n")).collect();
        let err = parse_settings(&contents).unwrap_err();
        assert!(matches!(err, ConfdbError::CapacityExceeded { .. }));
    }

    #[test]
    fn test_escape_roundtrip() {
        let value = "a\\b\nc\rd=e";
        assert_eq!(unescape_value(&escape_value(value)).unwrap(), value);
    }

    #[test]
    fn test_default_settings_path() {
        match dirs::config_dir() {
            Some(dir) => assert_eq!(
                default_settings_path("myapp").unwrap(),
                dir.join("myapp").join(SETTINGS_FILE_NAME)
            ),
            // Some platforms/sandboxes have no config dir
            None => assert!(matches!(default_settings_path("myapp"), Err(ConfdbError::ConfigSave(_)))),
        }
    }

    #[test]
    fn test_default_settings_path_rejects_non_directory_names() {
        for name in ["", "  ", ".", "..", "a/b", "a\\b", "/abs", "../up"] {
            assert!(
                matches!(default_settings_path(name), Err(ConfdbError::InvalidArgument(_))),
                "app name {name:?}"
            );
        }
    }

    #[test]
    fn test_save_without_path_rejects_dot_app_name() {
        let settings = SettingsManager::new("..");
        assert!(matches!(settings.save_config(), Err(ConfdbError::InvalidArgument(_))));
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "old=contents\nstale=1\n").unwrap();

        let mut settings = SettingsManager::new("myapp");
        settings.set_setting("theme", "dark").unwrap();
        settings.save_config_to(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "# myapp settings\ntheme=dark\n");
        assert_eq!(dir_entries(dir.path()), vec![SETTINGS_FILE_NAME.to_string()]);
    }

    #[test]
    fn test_failed_save_keeps_target_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        let mut settings = SettingsManager::new("myapp");
        settings.set_setting("theme", "dark").unwrap();
        let err = settings.save_config_to(&target).unwrap_err();

        assert!(matches!(err, ConfdbError::ConfigSave(_)));
        assert!(settings.config_path().is_none());
        assert_eq!(dir_entries(dir.path()), vec!["occupied".to_string()]);
        assert_eq!(dir_entries(&target), vec!["keep".to_string()]);
    }
}
