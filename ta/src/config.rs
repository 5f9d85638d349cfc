//! Console settings and their persistence
//!
//! Settings are a flat YAML document. Every field has a default so a
//! partial or missing file always yields usable settings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::providers::{Provider, ProviderRegistry};

/// User-editable console settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Asana workspace used for remote search
    pub workspace_gid: String,

    /// Asana project whose tasks are listed (empty = the user's tasks)
    pub project_gid: String,

    /// Selected provider id
    pub provider: String,

    /// Selected model id (always one of the provider's models)
    pub model: String,

    /// Directory execution artifacts are written under
    pub output_dir: PathBuf,

    /// Stored API keys by provider id; environment variables take precedence
    pub api_keys: BTreeMap<String, String>,

    /// Explicit path to the asana-cli binary
    pub asana_cli_path: Option<PathBuf>,

    /// Theme name ("dark" or "light")
    pub theme: String,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub log_level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace_gid: String::new(),
            project_gid: String::new(),
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-6".to_string(),
            output_dir: PathBuf::from("./task-outputs"),
            api_keys: BTreeMap::new(),
            asana_cli_path: None,
            theme: "dark".to_string(),
            log_level: None,
        }
    }
}

impl Settings {
    /// Resolve the API key for a provider
    ///
    /// The provider's environment variable wins over a stored key. Empty
    /// values count as absent.
    pub fn api_key(&self, provider: &Provider) -> Option<String> {
        debug!(provider = %provider.id, "Settings::api_key: called");
        if let Some(env_key) = &provider.env_key
            && let Ok(value) = std::env::var(env_key)
            && !value.trim().is_empty()
        {
            debug!(%env_key, "Settings::api_key: using environment variable");
            return Some(value);
        }
        self.api_keys
            .get(&provider.id)
            .filter(|k| !k.trim().is_empty())
            .cloned()
    }

    /// Stored (not environment) key for a provider id
    pub fn stored_key(&self, provider_id: &str) -> &str {
        self.api_keys.get(provider_id).map(String::as_str).unwrap_or("")
    }

    /// Store a key, removing the entry when the value is blank
    pub fn set_stored_key(&mut self, provider_id: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.api_keys.remove(provider_id);
        } else {
            self.api_keys.insert(provider_id.to_string(), value.to_string());
        }
    }

    /// Repair provider/model so the model belongs to the provider's list
    ///
    /// Unknown providers fall back to the first registry entry.
    pub fn normalize(&mut self, registry: &ProviderRegistry) {
        debug!(provider = %self.provider, model = %self.model, "Settings::normalize: called");
        let provider = match registry.get(&self.provider).or_else(|| registry.at(0)) {
            Some(p) => p,
            None => {
                debug!("Settings::normalize: empty registry");
                return;
            }
        };
        if provider.id != self.provider {
            warn!(provider = %self.provider, fallback = %provider.id, "Unknown provider in settings");
            self.provider = provider.id.clone();
        }
        if !provider.has_model(&self.model) {
            debug!(model = %self.model, "Settings::normalize: model not offered, using default");
            self.model = provider.default_model.clone();
        }
    }
}

/// Persistence seam for settings
pub trait SettingsStore: Send + Sync {
    /// Load settings; a missing or unreadable store yields defaults
    fn load(&self) -> Settings;

    /// Persist settings
    fn save(&self, settings: &Settings) -> Result<()>;

    /// Where settings are persisted, for status messages
    fn location(&self) -> String;
}

/// YAML file backed settings store
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(?path, "FileSettingsStore::new: called");
        Self { path }
    }

    /// Store at the explicit path if given, else the default location
    pub fn from_option(path: Option<&PathBuf>) -> Self {
        match path {
            Some(p) => Self::new(p.clone()),
            None => Self::new(Self::default_path()),
        }
    }

    /// `~/.config/task-agent/settings.yml` (platform config dir)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("task-agent")
            .join("settings.yml")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Settings> {
        let content = fs::read_to_string(&self.path).context("Failed to read settings file")?;
        let settings: Settings = serde_yaml::from_str(&content).context("Failed to parse settings file")?;
        Ok(settings)
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Settings {
        debug!(path = %self.path.display(), "FileSettingsStore::load: called");
        if !self.path.exists() {
            info!("No settings file at {}, using defaults", self.path.display());
            return Settings::default();
        }
        match self.read() {
            Ok(settings) => {
                info!("Loaded settings from: {}", self.path.display());
                settings
            }
            Err(e) => {
                warn!("Failed to load settings from {}: {:#}", self.path.display(), e);
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        debug!(path = %self.path.display(), "FileSettingsStore::save: called");
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let yaml = serde_yaml::to_string(settings).context("Failed to serialize settings")?;

        let tmp = self.path.with_extension("yml.tmp");
        fs::write(&tmp, yaml).context(format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).context(format!("Failed to replace {}", self.path.display()))?;

        info!("Saved settings to: {}", self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
