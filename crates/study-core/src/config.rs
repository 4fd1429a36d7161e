use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::prompt::PromptTemplate;

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen3:1.7b";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

const APP_DIR: &str = "study-assistant";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub host: Option<String>,
    pub default_model: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub template_path: Option<PathBuf>,
}

/// Everything the Ollama client needs, resolved from [`Config`] and the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config {}: {}", config_path.display(), e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        Self::save_default_model_to(&Self::get_config_path()?, model)
    }

    /// Update only the default model. A file that fails to parse is left untouched.
    pub fn save_default_model_to(config_path: &Path, model: &str) -> Result<()> {
        let mut config = Self::load_from(config_path)?;
        config.default_model = Some(model.to_string());
        config.save_to(config_path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR).join("config.json"))
    }

    /// Directory for the log file.
    pub fn get_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join(APP_DIR))
    }

    pub fn model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        self.gateway_config_with_env(std::env::var("OLLAMA_HOST").ok().as_deref())
    }

    /// `OLLAMA_HOST` wins over the configured host, as it does for the ollama CLI.
    pub fn gateway_config_with_env(&self, env_host: Option<&str>) -> GatewayConfig {
        let host = env_host
            .filter(|h| !h.trim().is_empty())
            .or(self.host.as_deref())
            .unwrap_or(DEFAULT_HOST);

        GatewayConfig {
            base_url: normalize_host(host),
            model: self.model().to_string(),
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            connect_timeout: Duration::from_secs(
                self.connect_timeout_secs.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
        }
    }

    /// The configured template file, or the built-in study template.
    pub fn load_template(&self) -> Result<PromptTemplate> {
        let template = match &self.template_path {
            Some(path) => PromptTemplate::from_file(path)?,
            None => PromptTemplate::study_assistant()?,
        };
        Ok(template)
    }
}

/// Accepts `host`, `host:port` or a full URL and returns a base URL without a trailing slash.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(normalize_host("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(normalize_host(" https://gpu-box:443 "), "https://gpu-box:443");
    }

    #[test]
    fn test_defaults() {
        let gateway = Config::new().gateway_config_with_env(None);
        assert_eq!(gateway.base_url, DEFAULT_HOST);
        assert_eq!(gateway.model, DEFAULT_MODEL);
        assert_eq!(gateway.max_tokens, None);
        assert_eq!(gateway.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(gateway.connect_timeout, Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));
    }

    #[test]
    fn test_env_host_overrides_config() {
        let config = Config {
            host: Some("http://configured:11434".to_string()),
            ..Config::new()
        };
        assert_eq!(
            config.gateway_config_with_env(Some("envhost:9999")).base_url,
            "http://envhost:9999"
        );
        assert_eq!(config.gateway_config_with_env(Some("  ")).base_url, "http://configured:11434");
        assert_eq!(config.gateway_config_with_env(None).base_url, "http://configured:11434");
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_model": "qwen3:14b", "max_tokens": 2000 }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model(), "qwen3:14b");
        assert_eq!(config.max_tokens, Some(2000));
        assert_eq!(config.host, None);
        assert_eq!(config.gateway_config_with_env(None).max_tokens, Some(2000));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            default_model: Some("llama3.2:latest".to_string()),
            timeout_secs: Some(30),
            ..Config::new()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_save_default_model_keeps_other_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "host": "gpu-box:11434", "max_tokens": 2000 }"#).unwrap();

        Config::save_default_model_to(&path, "qwen3:14b").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model(), "qwen3:14b");
        assert_eq!(config.host.as_deref(), Some("gpu-box:11434"));
        assert_eq!(config.max_tokens, Some(2000));
    }

    #[test]
    fn test_save_default_model_leaves_invalid_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let original = r#"{ "host": "gpu-box:11434", "max_tokens": }"#;
        fs::write(&path, original).unwrap();

        assert!(Config::save_default_model_to(&path, "qwen3:14b").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_template_path_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("prompt.txt");
        fs::write(&template_path, "{study_materials} | {question}").unwrap();

        let config = Config {
            template_path: Some(template_path),
            ..Config::new()
        };
        assert_eq!(config.load_template().unwrap().render("q", "m"), "m | q");

        let broken = Config {
            template_path: Some(dir.path().join("missing.txt")),
            ..Config::new()
        };
        assert!(broken.load_template().is_err());
    }
}
