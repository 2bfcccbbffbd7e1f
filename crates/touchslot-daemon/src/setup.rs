//! Settings, mapping and gamepad profile loading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Settings;
use crate::error::DaemonError;
use crate::mapping::Mapping;
use crate::profile::{GamepadProfile, RELAYED_PROFILE};

/// The mapping written by `touchslot template` and on first start.
pub const MAPPING_TEMPLATE: &str = include_str!("../assets/template.json");

const PROFILES_DIR_NAME: &str = "joystickInfos";

/// Load settings from the given path, or `settings.toml` next to the
/// mapping. A missing file yields the defaults.
pub fn load_settings(path: Option<&Path>, mapping_path: &Path) -> Result<Settings, DaemonError> {
    let settings_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_settings_path(mapping_path),
    };

    if settings_path.exists() {
        let content = std::fs::read_to_string(&settings_path)
            .map_err(|e| DaemonError::Config(format!("failed to read settings: {e}")))?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| DaemonError::Config(format!("failed to parse settings: {e}")))?;
        info!(path = %settings_path.display(), "loaded settings");
        Ok(settings)
    } else if path.is_some() {
        Err(DaemonError::Config(format!(
            "settings file {} does not exist",
            settings_path.display()
        )))
    } else {
        info!("no settings file found, using defaults");
        Ok(Settings::default())
    }
}

fn default_settings_path(mapping_path: &Path) -> PathBuf {
    mapping_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("settings.toml")
}

/// Read and validate a mapping document.
pub fn load_mapping(path: &Path) -> Result<Mapping, DaemonError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DaemonError::Config(format!("failed to read mapping {}: {e}", path.display()))
    })?;
    let mapping = Mapping::from_json(&content)?;
    info!(
        path = %path.display(),
        width = mapping.screen.width,
        height = mapping.screen.height,
        actions = mapping.actions.len(),
        "loaded mapping"
    );
    Ok(mapping)
}

/// Write the template mapping to `path`, creating parent directories.
pub fn write_template(path: &Path) -> Result<(), DaemonError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| DaemonError::Config(format!("failed to create mapping dir: {e}")))?;
    }
    std::fs::write(path, MAPPING_TEMPLATE)
        .map_err(|e| DaemonError::Config(format!("failed to write template: {e}")))?;
    info!(path = %path.display(), "wrote template mapping");
    Ok(())
}

/// Load the mapping, writing the template first if the file is missing.
pub fn load_or_create_mapping(path: &Path) -> Result<Mapping, DaemonError> {
    if !path.exists() {
        write_template(path)?;
    }
    load_mapping(path)
}

/// The `joystickInfos` directory next to the running binary.
pub fn default_profiles_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PROFILES_DIR_NAME)
}

/// Load every `<device name>.json` profile in `dir` plus the built-in
/// relayed-gamepad profile. Unreadable profiles are skipped with a warning.
pub fn load_profiles(dir: &Path) -> Result<HashMap<String, GamepadProfile>, DaemonError> {
    let mut profiles = HashMap::new();
    let relayed = GamepadProfile::relayed()
        .map_err(|e| DaemonError::Config(format!("built-in gamepad profile: {e}")))?;
    profiles.insert(RELAYED_PROFILE.to_string(), relayed);

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "no gamepad profiles loaded");
            return Ok(profiles);
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| GamepadProfile::from_json(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(profile) => {
                info!(device = %name, path = %path.display(), "loaded gamepad profile");
                profiles.insert(name.to_string(), profile);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping gamepad profile"),
        }
    }
    Ok(profiles)
}
