use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use paychat_llm::{DEFAULT_CHATBASE_ENDPOINT, EndpointConfig};
use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::error::{MissingApiKeySnafu, MissingChatbotIdSnafu, SettingsResult};

pub const SETTINGS_DIRECTORY_NAME: &str = "paychat";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const STATE_FILE_NAME: &str = "state.json";
pub const ENV_PREFIX: &str = "PAYCHAT_";
/// Overrides the settings file location.
pub const CONFIG_PATH_ENV: &str = "PAYCHAT_CONFIG";
pub const DEFAULT_RENDER_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub chatbot_id: String,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_render_width")]
    pub render_width: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            chatbot_id: String::new(),
            state_path: default_state_path(),
            render_width: default_render_width(),
        }
    }
}

impl Settings {
    pub fn to_endpoint_config(&self) -> EndpointConfig {
        EndpointConfig::new(&self.endpoint, &self.api_key, &self.chatbot_id)
    }

    pub fn normalized(mut self) -> Self {
        self.endpoint = if self.endpoint.trim().is_empty() {
            default_endpoint()
        } else {
            self.endpoint.trim().to_string()
        };
        self.api_key = self.api_key.trim().to_string();
        self.chatbot_id = self.chatbot_id.trim().to_string();
        if self.state_path.as_os_str().is_empty() {
            self.state_path = default_state_path();
        }
        // Narrower than this leaves no room for wrapped Hebrew text.
        self.render_width = self.render_width.max(20);
        self
    }
}

/// Read-only settings loader: defaults, then the JSON file, then `PAYCHAT_*` variables.
pub struct SettingsStore {
    settings: Settings,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".paychat"))
    }

    pub fn default_config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::default_config_dir().join(SETTINGS_FILE_NAME))
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings,
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Returns the settings once the chatbot credentials are present.
    pub fn validated(&self) -> SettingsResult<&Settings> {
        let config_path = self.config_path.display().to_string();
        ensure!(
            !self.settings.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "validate-settings",
                config_path: config_path.clone(),
            }
        );
        ensure!(
            !self.settings.chatbot_id.is_empty(),
            MissingChatbotIdSnafu {
                stage: "validate-settings",
                config_path,
            }
        );
        Ok(&self.settings)
    }

    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    fn load_from_disk(path: &Path) -> Settings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults and environment", path);
        }

        match Self::figment(path).extract::<Settings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults and environment",
                    path,
                    error
                );
                Figment::from(Serialized::defaults(Settings::default()))
                    .merge(Env::prefixed(ENV_PREFIX))
                    .extract::<Settings>()
                    .unwrap_or_default()
                    .normalized()
            }
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_CHATBASE_ENDPOINT.to_string()
}

fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
        .unwrap_or_else(|| PathBuf::from(".paychat"))
        .join(STATE_FILE_NAME)
}

fn default_render_width() -> usize {
    DEFAULT_RENDER_WIDTH
}
