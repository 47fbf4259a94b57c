use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::Preferences;

const APP_NAME: &str = "CodeCombiner";
const PREFERENCES_FILE: &str = "preferences.json";

/// Persistence seam for [`Preferences`].
pub trait PreferencesStore: Send + Sync {
    fn load(&self) -> Result<Preferences>;
    fn save(&self, preferences: &Preferences) -> Result<()>;
}

/// Stores preferences as pretty-printed JSON, either at an explicit path or
/// in the platform config directory.
#[derive(Debug, Clone, Default)]
pub struct JsonFileStore {
    path: Option<PathBuf>,
}

impl JsonFileStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// The file this store reads and writes, if one can be determined.
    pub fn location(&self) -> Option<PathBuf> {
        resolve_path(self.path.as_deref()).ok()
    }
}

impl PreferencesStore for JsonFileStore {
    fn load(&self) -> Result<Preferences> {
        load_preferences(self.path.as_deref())
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        save_preferences(preferences, self.path.as_deref())
    }
}

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("com", "codecombiner", APP_NAME)
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the preferences file.
pub fn get_preferences_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(PREFERENCES_FILE))
}

fn resolve_path(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) => Ok(path.to_path_buf()),
        None => get_preferences_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory")),
    }
}

/// Loads preferences, writing a default file first if none exists.
///
/// A file that cannot be parsed goes through [`migrate_legacy_preferences`];
/// if that fails too, defaults are returned and the broken file is left alone.
pub fn load_preferences(override_path: Option<&Path>) -> Result<Preferences> {
    let path = resolve_path(override_path)?;

    if !path.exists() {
        tracing::info!("Preferences not found, creating defaults at {:?}", path);
        let defaults = Preferences::default();
        save_preferences(&defaults, Some(&path))?;
        return Ok(defaults);
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read preferences from {}", path.display()))?;

    match serde_json::from_str::<Preferences>(&content) {
        Ok(preferences) => {
            tracing::info!("Loaded preferences from {:?}", path);
            Ok(preferences)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse preferences at {:?}: {}. Trying legacy format.",
                path,
                e
            );
            Ok(migrate_legacy_preferences(&content).unwrap_or_else(|e| {
                tracing::warn!("Legacy migration failed: {}. Using defaults.", e);
                Preferences::default()
            }))
        }
    }
}

/// Saves preferences, creating the parent directory when needed.
pub fn save_preferences(preferences: &Preferences, override_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(override_path)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            tracing::info!("Created config directory: {:?}", dir);
        }
    }

    let json = serde_json::to_string_pretty(preferences)?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write preferences to {}", path.display()))?;
    tracing::debug!("Saved preferences to {:?}", path);
    Ok(())
}

/// Upgrades older preference files.
///
/// Null values are dropped so the field default applies, and the key names
/// of the first release (`concurrency`, `default_format`) are renamed.
fn migrate_legacy_preferences(content: &str) -> Result<Preferences> {
    let mut value: Value = serde_json::from_str(content)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Preferences are not a JSON object"))?;

    obj.retain(|_, v| !v.is_null());

    let rename = |obj: &mut Map<String, Value>, old: &str, new: &str| {
        if let Some(v) = obj.remove(old) {
            obj.entry(new.to_string()).or_insert(v);
        }
    };
    rename(obj, "concurrency", "max_workers");
    rename(obj, "default_format", "output_format");

    if let Some(Value::String(format)) = obj.get_mut("output_format") {
        *format = format.to_lowercase();
    }

    let migrated: Preferences = serde_json::from_value(value)?;
    tracing::info!("Successfully migrated legacy preferences");
    Ok(migrated)
}

/// Exports preferences to a user-chosen JSON file.
pub fn export_preferences(preferences: &Preferences, export_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(preferences)?;
    fs::write(export_path, json)
        .with_context(|| format!("Failed to export preferences to {}", export_path.display()))?;
    tracing::info!("Exported preferences to {:?}", export_path);
    Ok(())
}

/// Imports preferences from a user-chosen JSON file.
pub fn import_preferences(import_path: &Path) -> Result<Preferences> {
    let content = fs::read_to_string(import_path)
        .with_context(|| format!("Failed to read {}", import_path.display()))?;
    match serde_json::from_str::<Preferences>(&content) {
        Ok(preferences) => {
            tracing::info!("Imported preferences from {:?}", import_path);
            Ok(preferences)
        }
        Err(_) => {
            tracing::info!("Importing legacy preferences from {:?}", import_path);
            migrate_legacy_preferences(&content)
        }
    }
}
