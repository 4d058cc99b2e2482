use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;
use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

static CONFIG_FILE_NAME: &str = "config.json";
static ENV_CONFIG_DIR: &str = "KEYAREAS_CONFIG_DIR";
static ENV_API_URL: &str = "KEYAREAS_API_URL";
static ENV_TOKEN: &str = "KEYAREAS_TOKEN";
static ENV_TIMEOUT_SECS: &str = "KEYAREAS_TIMEOUT_SECS";

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("dev", "keyareas", "keyareas"));

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    api_url: Option<String>,
    token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    api_url: String,
    token: Option<String>,
    timeout: Duration,
    config_path: Option<PathBuf>,
}

impl AppConfig {
    /// Construct [`AppConfig`] from the provided API URL override, environment variables,
    /// the config file in the platform config directory, and built-in defaults, in that order.
    pub fn discover(api_url_override: Option<String>) -> Result<Self> {
        let config_path = resolve_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME));
        Self::resolve(api_url_override, config_path, |key| env::var(key).ok())
    }

    /// Same as [`AppConfig::discover`] but reads the config file from `config_dir`
    /// and ignores the process environment.
    pub fn discover_in(config_dir: &Path, api_url_override: Option<String>) -> Result<Self> {
        Self::resolve(
            api_url_override,
            Some(config_dir.join(CONFIG_FILE_NAME)),
            |_| None,
        )
    }

    pub fn from_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: trim_base_url(&api_url.into()),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            config_path: None,
        }
    }

    fn resolve(
        api_url_override: Option<String>,
        config_path: Option<PathBuf>,
        env_lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file = match &config_path {
            Some(path) => load_config_file(path)?,
            None => ConfigFile::default(),
        };

        let api_url = api_url_override
            .or_else(|| env_lookup(ENV_API_URL))
            .or(file.api_url)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let token = env_lookup(ENV_TOKEN)
            .or(file.token)
            .filter(|token| !token.trim().is_empty());

        let timeout = match env_lookup(ENV_TIMEOUT_SECS) {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?,
            ),
            None => file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        };

        Ok(Self {
            api_url: trim_base_url(&api_url),
            token,
            timeout,
            config_path: config_path.filter(|path| path.exists()),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The config file that was read, if one existed.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Config file at {} is not valid JSON", path.display()))
}

fn resolve_config_dir() -> Option<PathBuf> {
    if let Ok(env_dir) = env::var(ENV_CONFIG_DIR) {
        return Some(PathBuf::from(env_dir));
    }

    if let Some(project) = &*PROJECT_DIRS {
        return Some(project.config_dir().to_path_buf());
    }

    BaseDirs::new().map(|base| base.home_dir().join(".keyareas"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) {
        fs::write(dir.path().join(CONFIG_FILE_NAME), contents).unwrap();
    }

    #[test]
    fn defaults_apply_without_a_config_file() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::discover_in(dir.path(), None).unwrap();
        assert_eq!(config.api_url(), DEFAULT_API_URL);
        assert_eq!(config.token(), None);
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.config_path(), None);
    }

    #[test]
    fn config_file_values_are_used() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"{ "api_url": "https://tasks.example.com/api/", "token": "abc", "timeout_secs": 3 }"#,
        );
        let config = AppConfig::discover_in(dir.path(), None).unwrap();
        assert_eq!(config.api_url(), "https://tasks.example.com/api");
        assert_eq!(config.token(), Some("abc"));
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert!(config.config_path().is_some());
    }

    #[test]
    fn override_beats_config_file() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, r#"{ "api_url": "https://file.example.com" }"#);
        let config =
            AppConfig::discover_in(dir.path(), Some("http://override.local/api".into())).unwrap();
        assert_eq!(config.api_url(), "http://override.local/api");
    }

    #[test]
    fn environment_sits_between_override_and_file() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, r#"{ "api_url": "https://file.example.com", "timeout_secs": 9 }"#);
        let env = |key: &str| match key {
            "KEYAREAS_API_URL" => Some("https://env.example.com".to_string()),
            "KEYAREAS_TIMEOUT_SECS" => Some("4".to_string()),
            _ => None,
        };
        let config =
            AppConfig::resolve(None, Some(dir.path().join(CONFIG_FILE_NAME)), env).unwrap();
        assert_eq!(config.api_url(), "https://env.example.com");
        assert_eq!(config.timeout(), Duration::from_secs(4));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "not json");
        let err = AppConfig::discover_in(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }
}
