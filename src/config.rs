use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

const QUALIFIER: &str = "com.royalvente";
const ORGANIZATION: &str = "Royal Vente";
const APPLICATION: &str = "vente-editor";
const CONFIG_FILE_NAME: &str = "editor.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not access config file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Editor tunables. Durations are stored in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Delay before the selection state is recomputed after a host event
    pub selection_debounce_ms: u64,
    /// Quiet period after the last change before autosave runs
    pub autosave_delay_ms: u64,
    pub toolbar_width: i32,
    pub toolbar_height: i32,
    /// Vertical space between the toolbar and the selection
    pub toolbar_gap: i32,
    /// Level used by the toolbar's heading command
    pub toolbar_heading_level: u8,
    /// Horizontal distance of the insertion menu from the block's left edge
    pub insert_menu_gutter: i32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            selection_debounce_ms: 30,
            autosave_delay_ms: 3000,
            toolbar_width: 240,
            toolbar_height: 36,
            toolbar_gap: 8,
            toolbar_heading_level: 2,
            insert_menu_gutter: 40,
        }
    }
}

impl EditorConfig {
    /// Config with no debounce, for driving a session synchronously
    pub fn immediate() -> Self {
        EditorConfig {
            selection_debounce_ms: 0,
            ..Self::default()
        }
    }

    pub fn selection_debounce(&self) -> Duration {
        Duration::from_millis(self.selection_debounce_ms)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn heading_level(&self) -> u8 {
        self.toolbar_heading_level.clamp(1, 6)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Load the config at `path`, falling back to defaults when the file is
    /// missing or unreadable
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Io(err)) if err.kind() == ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "using default editor config");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

pub fn config_file_path() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
