use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{github, llm};

pub const CONFIG_FILE: &str = ".pr-scribe.toml";
const DEFAULT_DATABASE: &str = ".pr-scribe/settings.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .pr-scribe.toml.
/// All fields are optional; the tool works with zero config.
///
/// The encryption master key is never read from the file, only from the
/// ENCRYPTION_KEY environment variable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub user: UserConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// API base URL, for GitHub Enterprise
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    /// Gemini API key. If None, falls back to GEMINI_API_KEY env var.
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    /// Models tried in order until one answers
    #[serde(default)]
    pub models: Vec<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Path of the settings database. PR_SCRIBE_DB overrides it.
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserConfig {
    /// Identity credentials are stored under. PR_SCRIBE_USER overrides it.
    pub email: Option<String>,
}

impl Config {
    /// Load configuration from .pr-scribe.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Fill gaps from the environment; explicit overrides win over the file
    /// for the user and database, file values win for tokens.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.github.token.is_none() {
            self.github.token = var("GITHUB_TOKEN");
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = var("GEMINI_API_KEY");
        }
        if let Some(email) = var("PR_SCRIBE_USER") {
            self.user.email = Some(email);
        }
        if let Some(db) = var("PR_SCRIBE_DB") {
            self.storage.database = Some(PathBuf::from(db));
        }
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<SecretString> {
        non_empty(self.github.token.clone()).map(SecretString::from)
    }

    pub fn gemini_api_key(&self) -> Option<SecretString> {
        non_empty(self.llm.api_key.clone()).map(SecretString::from)
    }

    /// The master secret credentials are encrypted under.
    pub fn encryption_key() -> Option<SecretString> {
        non_empty(std::env::var("ENCRYPTION_KEY").ok()).map(SecretString::from)
    }

    pub fn github_api_url(&self) -> &str {
        self.github.api_url.as_deref().unwrap_or(github::DEFAULT_API_URL)
    }

    pub fn llm_api_url(&self) -> &str {
        self.llm.api_url.as_deref().unwrap_or(llm::DEFAULT_API_URL)
    }

    pub fn models(&self) -> Vec<String> {
        if self.llm.models.is_empty() {
            llm::DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
        } else {
            self.llm.models.clone()
        }
    }

    pub fn generation_options(&self) -> llm::GenerationOptions {
        let defaults = llm::GenerationOptions::default();
        llm::GenerationOptions {
            temperature: self.llm.temperature.unwrap_or(defaults.temperature),
            max_output_tokens: self.llm.max_output_tokens.unwrap_or(defaults.max_output_tokens),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    pub fn user_email(&self) -> Option<&str> {
        self.user.email.as_deref().filter(|e| !e.trim().is_empty())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github_api_url(), "https://api.github.com");
        assert_eq!(config.models(), vec!["gemini-2.5-flash", "gemini-2.5-flash-lite"]);
        assert_eq!(config.generation_options(), llm::GenerationOptions::default());
        assert_eq!(config.database_path(), PathBuf::from(".pr-scribe/settings.db"));
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[github]
api_url = "https://ghe.example.com/api/v3"

[llm]
models = ["gemini-2.5-pro"]
temperature = 0.2

[storage]
database = "/tmp/scribe.db"

[user]
email = "alice@example.com"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.github_api_url(), "https://ghe.example.com/api/v3");
        assert_eq!(config.models(), vec!["gemini-2.5-pro"]);
        assert_eq!(config.generation_options().temperature, 0.2);
        assert_eq!(config.generation_options().max_output_tokens, 8192);
        assert_eq!(config.user_email(), Some("alice@example.com"));
    }

    #[test]
    fn test_env_fills_gaps() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GITHUB_TOKEN", "env-token"),
            ("GEMINI_API_KEY", "env-gemini"),
            ("PR_SCRIBE_USER", "bob@example.com"),
        ]);
        let mut config: Config = toml::from_str("[github]\ntoken = \"file-token\"\n[user]\nemail = \"alice@example.com\"").unwrap();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.github_token().unwrap().expose_secret(), "file-token");
        assert_eq!(config.gemini_api_key().unwrap().expose_secret(), "env-gemini");
        assert_eq!(config.user_email(), Some("bob@example.com"));
    }

    #[test]
    fn test_blank_token_is_absent() {
        let config: Config = toml::from_str("[github]\ntoken = \"  \"").unwrap();
        assert!(config.github_token().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[llm]\nmax_output_tokens = 1024\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.generation_options().max_output_tokens, 1024);
    }
}
