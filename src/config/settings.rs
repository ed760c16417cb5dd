//! Global and project-specific settings

use std::{fs, path::Path};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding [`Settings::base_url`]
pub const ENV_BASE_URL: &str = "ATLAS_WATCH_BASE_URL";
/// Environment variable overriding [`Settings::app_id`]
pub const ENV_APP_ID: &str = "ATLAS_WATCH_APP_ID";
/// Environment variable overriding [`Settings::service_name`]
pub const ENV_SERVICE: &str = "ATLAS_WATCH_SERVICE";
/// Environment variable overriding [`Settings::access_token`]
pub const ENV_ACCESS_TOKEN: &str = "ATLAS_WATCH_ACCESS_TOKEN";

/// Connection settings (stored in the global config file)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the App Services deployment
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// App ID the functions endpoint belongs to
    #[serde(default)]
    pub app_id: String,

    /// Name of the linked MongoDB data source
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Bearer token sent with the watch request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

fn default_base_url() -> String {
    "https://services.cloud.mongodb.com".to_string()
}

fn default_service_name() -> String {
    "mongodb-atlas".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: String::new(),
            service_name: default_service_name(),
            access_token: None,
        }
    }
}

impl Settings {
    /// Load settings from a specific path, defaulting when it does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_path(path: &Path) -> Result<Self> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    /// Save settings to a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Overlay the values a project file sets
    pub fn merge(&mut self, project: ProjectSettings) {
        if let Some(base_url) = project.base_url {
            self.base_url = base_url;
        }
        if let Some(app_id) = project.app_id {
            self.app_id = app_id;
        }
        if let Some(service_name) = project.service_name {
            self.service_name = service_name;
        }
        if project.access_token.is_some() {
            self.access_token = project.access_token;
        }
    }

    /// Overlay values from the environment, looked up through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = var(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(app_id) = var(ENV_APP_ID) {
            self.app_id = app_id;
        }
        if let Some(service_name) = var(ENV_SERVICE) {
            self.service_name = service_name;
        }
        if let Some(token) = var(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
    }

    /// Check that a watch request can be built from these settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a missing app id, service name or
    /// an unparsable base URL
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "app_id is not set (use the config file or {ENV_APP_ID})"
            )));
        }
        if self.service_name.trim().is_empty() {
            return Err(Error::InvalidConfig("service_name is empty".to_string()));
        }
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            Error::InvalidConfig(format!("invalid base_url {:?}: {e}", self.base_url))
        })?;
        Ok(())
    }

    /// Copy safe to print, with the access token masked
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            access_token: self.access_token.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}

/// Project-specific overrides (stored in `./.atlas-watch.json`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl ProjectSettings {
    /// Load project settings from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_path(path: &Path) -> Result<Self> {
        Ok(read_json(path)?.unwrap_or_default())
    }
}

/// Read a JSON file, `None` if it does not exist
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
