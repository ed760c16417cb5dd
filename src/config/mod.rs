//! Configuration management for atlas-watch
//!
//! Implements a hierarchical configuration system:
//! 1. Global config (`<config dir>/atlas-watch/config.json`)
//! 2. Project config (`./.atlas-watch.json`)
//! 3. Environment variables (`ATLAS_WATCH_*`)
//! 4. CLI parameters (highest priority, applied by the caller)

pub mod settings;

use std::path::{Path, PathBuf};

pub use self::settings::{ProjectSettings, Settings};
use crate::error::Result;

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Effective settings after merging every source
    pub settings: Settings,
}

impl Config {
    /// Load configuration from the default files and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::global_config_path(), &Self::project_config_path())
    }

    /// Load configuration from explicit file locations and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed
    pub fn load_from(global: &Path, project: &Path) -> Result<Self> {
        let mut settings = Settings::load_from_path(global)?;
        settings.merge(ProjectSettings::load_from_path(project)?);
        settings.apply_env(|key| std::env::var(key).ok());

        tracing::debug!(
            global = %global.display(),
            project = %project.display(),
            app_id = %settings.app_id,
            "configuration loaded"
        );
        Ok(Self { settings })
    }

    /// Get the configuration directory path
    #[must_use]
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("atlas-watch")
    }

    /// Get the global config file path
    #[must_use]
    pub fn global_config_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Get the project config file path in the current directory
    #[must_use]
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".atlas-watch.json")
    }
}
