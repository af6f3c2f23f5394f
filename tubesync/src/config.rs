use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::remote::DEFAULT_BASE_URL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub tweet_page_size: u32,
    pub session_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 15,
            tweet_page_size: 10,
            session_path: None,
            log_level: "info,tubesync=debug".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&text)
    }

    /// Applies `TUBESYNC_*` overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("TUBESYNC_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("TUBESYNC_TIMEOUT_SECS") {
            self.request_timeout_secs = v.parse().map_err(|_| ConfigError::Invalid(format!("TUBESYNC_TIMEOUT_SECS={v}")))?;
        }
        if let Some(v) = lookup("TUBESYNC_TWEET_PAGE_SIZE") {
            self.tweet_page_size = v.parse().map_err(|_| ConfigError::Invalid(format!("TUBESYNC_TWEET_PAGE_SIZE={v}")))?;
        }
        if let Some(v) = lookup("TUBESYNC_SESSION") {
            self.session_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("TUBESYNC_LOG") {
            self.log_level = v;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_base_url(&self.base_url)?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        if self.tweet_page_size == 0 {
            return Err(ConfigError::Invalid("tweet_page_size must be positive".into()));
        }
        Ok(())
    }
}

fn check_base_url(base_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(base_url).map_err(|e| ConfigError::Invalid(format!("invalid base_url {base_url}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!("base_url must be an http(s) url: {base_url}")));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::Invalid(format!("base_url has no host: {base_url}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml("base_url = \"https://tube.example/api/v1\"\ntweet_page_size = 25\n").unwrap();
        assert_eq!(config.base_url, "https://tube.example/api/v1");
        assert_eq!(config.tweet_page_size, 25);
        assert_eq!(config.request_timeout_secs, ClientConfig::default().request_timeout_secs);
        config.validate().unwrap();
    }

    #[test]
    fn load_from_file_and_report_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "session_path = \"/tmp/tubesync-session.json\"").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.session_path, Some(PathBuf::from("/tmp/tubesync-session.json")));

        let missing = ClientConfig::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
        assert!(matches!(ClientConfig::from_toml("tweet_page_size = \"ten\""), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [("TUBESYNC_BASE_URL", "http://10.0.0.2:8000/api/v1"), ("TUBESYNC_TIMEOUT_SECS", "3")].into();
        let config = ClientConfig::default().with_overrides(|key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url, "http://10.0.0.2:8000/api/v1");
        assert_eq!(config.request_timeout_secs, 3);

        let bad = ClientConfig::default().with_overrides(|key| (key == "TUBESYNC_TWEET_PAGE_SIZE").then(|| "many".to_string()));
        assert!(matches!(bad, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validation() {
        let mut config = ClientConfig::default();
        config.validate().unwrap();
        config.tweet_page_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config = ClientConfig { base_url: "localhost:8000".into(), ..ClientConfig::default() };
        assert!(config.validate().is_err());
        config = ClientConfig { base_url: "http://".into(), ..ClientConfig::default() };
        assert!(config.validate().is_err());
        config = ClientConfig { base_url: "ftp://tube.example/api".into(), ..ClientConfig::default() };
        assert!(config.validate().is_err());
        config = ClientConfig { base_url: "http://[::1]:8000/api/v1/".into(), ..ClientConfig::default() };
        config.validate().unwrap();
    }
}
