use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::settings::config::Settings;

/// Loads settings for one process. Settings are read once and never written
/// back; fsprobe leaves no state behind.
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_path: Option<PathBuf>,
    settings: Settings,
}

impl SettingsManager {
    /// Loads `path` if given (it must exist), otherwise the default location
    /// if a file is there, otherwise built-in defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Settings file not found: {}", path.display());
                }
                Self::from_path(path)
            }
            None => match Self::default_settings_path() {
                Some(path) if path.exists() => Self::from_path(path),
                _ => Ok(Self {
                    settings_path: None,
                    settings: Settings::default(),
                }),
            },
        }
    }

    /// Loads settings from a specific TOML file.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        let settings = Self::load_from_file(&path)?;
        Ok(Self {
            settings_path: Some(path),
            settings,
        })
    }

    /// The default settings path (~/.fsprobe/settings.toml)
    pub fn default_settings_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".fsprobe").join("settings.toml"))
    }

    fn load_from_file(path: &Path) -> Result<Settings> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {path:?}"))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse settings in {path:?}"))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }
}
