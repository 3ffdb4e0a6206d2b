use chatgate_common::{BlockReasonMode, Error, RationaleLocale, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub safety: SafetyConfig,
    pub store: StoreConfig,
    pub chat: ChatConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for any path not matched by the API
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: None,
        }
    }
}

/// Hosted model backend (OpenAI-compatible chat completions)
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    /// HTTP statuses the provider uses to reject content under its own policy
    pub filtered_statuses: Vec<u16>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
            filtered_statuses: vec![400],
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("filtered_statuses", &self.filtered_statuses)
            .finish()
    }
}

/// Content-safety scanning. An empty `profile_id` turns scanning off.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub endpoint: String,
    pub api_key: String,
    pub profile_id: String,
    pub app_name: String,
    pub reason_mode: BlockReasonMode,
    pub locale: RationaleLocale,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            profile_id: String::new(),
            app_name: "ChatGate".to_string(),
            reason_mode: BlockReasonMode::FirstMatch,
            locale: RationaleLocale::En,
        }
    }
}

impl std::fmt::Debug for SafetyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("profile_id", &self.profile_id)
            .field("app_name", &self.app_name)
            .field("reason_mode", &self.reason_mode)
            .field("locale", &self.locale)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Jsonl,
}

/// Conversation store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// File used by the jsonl backend
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("chatgate/conversations.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of previous turns sent to the model as context
    pub history_limit: usize,
    /// Sent to the model as a leading system message on every turn
    pub system_prompt: Option<String>,
    /// Reference text appended to the system message, read once at start-up
    pub context_file: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            system_prompt: None,
            context_file: None,
        }
    }
}

impl ChatConfig {
    /// System prompt followed by the context file contents, blank parts dropped
    pub fn load_instructions(&self) -> Result<Option<String>> {
        let context = match &self.context_file {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    Error::ConfigError(format!(
                        "cannot read context file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                info!("Loaded chat context from {}", path.display());
                Some(text)
            }
            None => None,
        };

        let parts: Vec<&str> = [self.system_prompt.as_deref(), context.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        Ok((!parts.is_empty()).then(|| parts.join("\n\n")))
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file or defaults, then apply environment overrides
    pub fn load(path: Option<&PathBuf>) -> Result<AppConfig> {
        let mut config = Self::load_file(path)?;
        Self::apply_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from file or use defaults
    pub fn load_file(path: Option<&PathBuf>) -> Result<AppConfig> {
        if let Some(path) = path {
            if path.exists() {
                return Self::read(path);
            }
            return Err(Error::ConfigError(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        // Check default locations
        let default_paths = vec![
            PathBuf::from("chatgate.json"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("chatgate/config.json"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::read(&path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(AppConfig::default())
    }

    fn read(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            Error::ConfigError(format!("invalid config file {}: {}", path.display(), e))
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Overlay secrets and endpoints from the environment
    pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };

        set(&mut config.model.endpoint, "CHATGATE_MODEL_ENDPOINT");
        set(&mut config.model.api_key, "CHATGATE_MODEL_API_KEY");
        set(&mut config.model.model, "CHATGATE_MODEL_NAME");
        set(&mut config.safety.endpoint, "CHATGATE_SAFETY_ENDPOINT");
        set(&mut config.safety.api_key, "CHATGATE_SAFETY_API_KEY");
        set(&mut config.safety.profile_id, "CHATGATE_SAFETY_PROFILE_ID");

        if let Some(prompt) = lookup("CHATGATE_SYSTEM_PROMPT") {
            config.chat.system_prompt = Some(prompt);
        }

        if let Some(path) = lookup("CHATGATE_STORE_PATH") {
            config.store.backend = StoreBackend::Jsonl;
            config.store.path = PathBuf::from(path);
        }

        if let Some(port) = lookup("CHATGATE_PORT").and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
    }

    /// Save configuration to file
    pub fn save(config: &AppConfig, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
