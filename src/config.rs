use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub chat_model: String,
    pub vision_model: String,
    pub transcription_model: String,
    pub transcription_language: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            transcription_model: "whisper-1".to_string(),
            transcription_language: None,
            request_timeout_secs: 120,
        }
    }
}

impl AppConfig {
    /// Per-user directory holding `config.json`.
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("solveshot"))
    }

    pub fn load(app_data: &Path) -> Self {
        let config_path = app_data.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    log::warn!("Ignoring malformed {}: {}", config_path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("Could not read {}: {}", config_path.display(), e);
                    Self::default()
                }
            }
        } else {
            let c = Self::default();
            c.save(app_data);
            c
        };

        // Environment wins over the file so keys never have to be written to disk
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                config.openai_api_key = key;
            }
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            if !url.is_empty() {
                config.openai_base_url = url;
            }
        }

        config
    }

    pub fn save(&self, app_data: &Path) {
        if let Err(e) = std::fs::create_dir_all(app_data) {
            log::warn!("Could not create {}: {}", app_data.display(), e);
            return;
        }
        let config_path = app_data.join(CONFIG_FILE);
        match serde_json::to_string_pretty(self) {
            Ok(content) => {
                if let Err(e) = std::fs::write(&config_path, content) {
                    log::warn!("Could not write {}: {}", config_path.display(), e);
                }
            }
            Err(e) => log::warn!("Could not serialise config: {}", e),
        }
    }
}
