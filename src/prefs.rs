use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PrefsError;

pub const PUSH_TO_TALK: &str = "pushToTalkUI";
pub const LOGS_EXPANDED: &str = "logsExpanded";
pub const AUDIO_PLAYBACK: &str = "audioPlaybackEnabled";

/// Boolean key-value persistence for user preferences.
pub trait Preferences: Send {
    fn get_bool(&self, key: &str) -> Option<bool>;

    fn set_bool(&mut self, key: &str, value: bool);
}

/// Flags read once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiPreferences {
    pub push_to_talk: bool,
    pub logs_expanded: bool,
    pub audio_playback: bool,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            push_to_talk: true,
            logs_expanded: true,
            audio_playback: false,
        }
    }
}

impl UiPreferences {
    pub fn load(store: &dyn Preferences) -> Self {
        let defaults = Self::default();
        Self {
            push_to_talk: store.get_bool(PUSH_TO_TALK).unwrap_or(defaults.push_to_talk),
            logs_expanded: store.get_bool(LOGS_EXPANDED).unwrap_or(defaults.logs_expanded),
            audio_playback: store.get_bool(AUDIO_PLAYBACK).unwrap_or(defaults.audio_playback),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: BTreeMap<String, bool>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preferences for MemoryPreferences {
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).copied()
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), value);
    }
}

/// Preferences kept in a small JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: BTreeMap<String, bool>,
}

impl FilePreferences {
    /// Opens `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.values)?)?;
        Ok(())
    }
}

impl Preferences for FilePreferences {
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).copied()
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), value);
        if let Err(err) = self.persist() {
            tracing::warn!(path = %self.path.display(), "Failed to save preferences: {}", err);
        }
    }
}

pub fn default_preferences_path() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home).join(".deckhand").join("preferences.json");
    }

    PathBuf::from("deckhand.preferences.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let mut store = MemoryPreferences::new();
        assert_eq!(UiPreferences::load(&store), UiPreferences::default());

        store.set_bool(PUSH_TO_TALK, false);
        let prefs = UiPreferences::load(&store);
        assert!(!prefs.push_to_talk);
        assert!(prefs.logs_expanded);
        assert!(!prefs.audio_playback);
    }

    #[test]
    fn file_preferences_persist_every_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let mut store = FilePreferences::open(&path).unwrap();
        assert_eq!(store.get_bool(AUDIO_PLAYBACK), None);
        store.set_bool(AUDIO_PLAYBACK, true);
        store.set_bool(PUSH_TO_TALK, false);

        let reopened = FilePreferences::open(&path).unwrap();
        assert_eq!(reopened.get_bool(AUDIO_PLAYBACK), Some(true));
        assert_eq!(reopened.get_bool(PUSH_TO_TALK), Some(false));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FilePreferences::open(&path),
            Err(PrefsError::Parse(_))
        ));
    }
}
