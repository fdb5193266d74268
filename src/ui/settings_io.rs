use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::ui::settings::UiSettings;

fn settings_path(config_root: &Path) -> PathBuf {
    config_root.join("ui_settings.json")
}

/// Loads the presentation settings, writing the defaults out on first run.
pub fn load_settings(config_root: &Path) -> UiSettings {
    let path = settings_path(config_root);
    if !path.exists() {
        let settings = UiSettings::default();
        save_settings(config_root, &settings);
        return settings;
    }

    fs::read_to_string(&path)
        .ok()
        .and_then(|s| match serde_json::from_str(&s) {
            Ok(settings) => Some(settings),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "bad ui settings, using defaults");
                None
            }
        })
        .unwrap_or_default()
}

pub fn save_settings(config_root: &Path, settings: &UiSettings) {
    let path = settings_path(config_root);
    match serde_json::to_string_pretty(settings) {
        Ok(json) => {
            if let Err(err) = fs::write(&path, json) {
                warn!(path = %path.display(), error = %err, "cannot save ui settings");
            }
        }
        Err(err) => warn!(error = %err, "cannot serialize ui settings"),
    }
}
