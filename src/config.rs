use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ViewMode;
use crate::error::ConfigError;

const APP_DIR: &str = "mdpane";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directories searched by file name when an image is not next to the document
    pub search_paths: Vec<String>,
    pub syntax_theme: String,
    pub default_view_mode: ViewMode,
    pub vim_navigation: bool,
    pub live_reload: bool,
    pub outline_collapsed: bool,
    pub timing: Timing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            syntax_theme: "base16-ocean.dark".to_string(),
            default_view_mode: ViewMode::Preview,
            vim_navigation: true,
            live_reload: true,
            outline_collapsed: false,
            timing: Timing::default(),
        }
    }
}

/// Debounce windows, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub sync_release_ms: u64,
    pub split_settle_ms: u64,
    pub scroll_save_ms: u64,
    pub scroll_restore_ms: u64,
    pub heading_debounce_ms: u64,
    pub key_sequence_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sync_release_ms: 100,
            split_settle_ms: 100,
            scroll_save_ms: 300,
            scroll_restore_ms: 150,
            heading_debounce_ms: 300,
            key_sequence_ms: 500,
        }
    }
}

impl Timing {
    pub fn sync_release(&self) -> Duration {
        Duration::from_millis(self.sync_release_ms)
    }

    pub fn split_settle(&self) -> Duration {
        Duration::from_millis(self.split_settle_ms)
    }

    pub fn scroll_save(&self) -> Duration {
        Duration::from_millis(self.scroll_save_ms)
    }

    pub fn scroll_restore(&self) -> Duration {
        Duration::from_millis(self.scroll_restore_ms)
    }

    pub fn heading_debounce(&self) -> Duration {
        Duration::from_millis(self.heading_debounce_ms)
    }

    pub fn key_sequence(&self) -> Duration {
        Duration::from_millis(self.key_sequence_ms)
    }
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| home_fallback().join(".config"))
            .join(APP_DIR)
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| home_fallback().join(".cache"))
            .join(APP_DIR)
    }

    /// Load the config file, falling back to defaults if it is missing or broken.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::read(&path) {
            Ok(config) => config,
            Err(ConfigError::Read(e)) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log::warn!("{} ({}), using defaults", e, path.display());
                Self::default()
            }
        }
    }

    pub fn load_or_create() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            let config = Self::default();
            if let Err(e) = config.write(&path) {
                log::warn!("could not write default config: {}", e);
            }
            return config;
        }
        Self::load()
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Search paths with `~` expanded.
    pub fn search_roots(&self) -> Vec<PathBuf> {
        self.search_paths
            .iter()
            .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
            .collect()
    }
}

fn home_fallback() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
search_paths = ["~/Pictures"]
default_view_mode = "split"

[timing]
scroll_save_ms = 500
"#,
        )
        .unwrap();

        assert_eq!(config.search_paths, vec!["~/Pictures"]);
        assert_eq!(config.default_view_mode, ViewMode::Split);
        assert!(config.vim_navigation);
        assert_eq!(config.timing.scroll_save_ms, 500);
        assert_eq!(config.timing.sync_release_ms, 100);
        assert_eq!(config.syntax_theme, "base16-ocean.dark");
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.live_reload = false;
        config.write(&path).unwrap();

        assert_eq!(Config::read(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_view_mode = 3").unwrap();

        assert!(matches!(Config::read(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_search_roots_expand_tilde() {
        let config = Config {
            search_paths: vec!["/abs/dir".to_string()],
            ..Config::default()
        };
        assert_eq!(config.search_roots(), vec![PathBuf::from("/abs/dir")]);
    }
}
