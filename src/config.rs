use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::extract::batch::DEFAULT_BATCH_SIZE;
use crate::mapping::{PresetLibrary, DEFAULT_MAX_LEADS};
use crate::source::{ChromeConnector, PageFetcher, DEFAULT_DEBUG_PORT};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// JSON preset library; the built-in presets are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presets_file: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub chrome: ChromeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_leads")]
    pub max_leads: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Page download timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_max_page_bytes")]
    pub max_page_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    #[serde(default = "default_use_display_names")]
    pub use_display_names: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromeConfig {
    #[serde(default = "default_chrome_host")]
    pub host: String,

    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// DevTools command timeout in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default)]
    pub json_format: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|_| Error::NotFound(format!("Config file {}", path.as_ref().display())))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default location if it exists, else
    /// built-in defaults. Environment overrides apply in every case.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().ok().filter(|p| p.exists()),
        };

        match path {
            Some(path) => Self::load_with_env(path),
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("Server port must be greater than 0".to_string()));
        }

        if self.extraction.max_leads == 0 {
            return Err(Error::Config("Max leads must be greater than 0".to_string()));
        }

        if self.extraction.batch_size == 0 {
            return Err(Error::Config("Batch size must be greater than 0".to_string()));
        }

        if self.extraction.timeout == 0 || self.chrome.command_timeout == 0 {
            return Err(Error::Config("Timeouts must be greater than 0".to_string()));
        }

        if self.export.export_dir.as_os_str().is_empty() {
            return Err(Error::Config("Export directory cannot be empty".to_string()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `LEADLIFTR_*` overrides read through `lookup`. Unparseable
    /// values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("LEADLIFTR_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        if let Some(level) = lookup("LEADLIFTR_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(dir) = lookup("LEADLIFTR_EXPORT_DIR") {
            self.export.export_dir = PathBuf::from(dir);
        }

        if let Some(max_leads) = lookup("LEADLIFTR_MAX_LEADS").and_then(|v| v.parse().ok()) {
            self.extraction.max_leads = max_leads;
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("leadliftr"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn presets(&self) -> Result<PresetLibrary> {
        match &self.presets_file {
            Some(path) => PresetLibrary::load(path),
            None => Ok(PresetLibrary::builtin()),
        }
    }

    pub fn page_fetcher(&self) -> Result<PageFetcher> {
        Ok(PageFetcher::new()?
            .with_timeout(Duration::from_secs(self.extraction.timeout))
            .with_user_agent(self.extraction.user_agent.clone())
            .with_max_body_bytes(self.extraction.max_page_bytes))
    }

    pub fn chrome_connector(&self) -> Result<ChromeConnector> {
        Ok(ChromeConnector::with_host(self.chrome.host.clone())?
            .with_command_timeout(Duration::from_secs(self.chrome.command_timeout)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_leads: default_max_leads(),
            batch_size: default_batch_size(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
            max_page_bytes: default_max_page_bytes(),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
            use_display_names: default_use_display_names(),
        }
    }
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            host: default_chrome_host(),
            debug_port: default_debug_port(),
            command_timeout: default_command_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_to_file: false,
            log_file: default_log_file(),
            json_format: false,
        }
    }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 5000 }
fn default_max_leads() -> usize { DEFAULT_MAX_LEADS }
fn default_batch_size() -> usize { DEFAULT_BATCH_SIZE }
fn default_user_agent() -> String {
    format!("LeadLiftr/{}", env!("CARGO_PKG_VERSION"))
}
fn default_timeout() -> u64 { 30 }
fn default_max_page_bytes() -> usize { crate::source::fetcher::DEFAULT_MAX_BODY_BYTES }
fn default_export_dir() -> PathBuf { PathBuf::from("exports") }
fn default_use_display_names() -> bool { true }
fn default_chrome_host() -> String { "localhost".to_string() }
fn default_debug_port() -> u16 { DEFAULT_DEBUG_PORT }
fn default_command_timeout() -> u64 { 10 }
fn default_log_level() -> String { "warn".to_string() }
fn default_log_file() -> String { "logs/leadliftr.log".to_string() }

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.extraction.max_leads, 100);
        assert_eq!(config.chrome.debug_port, 9222);
        assert_eq!(config.export.export_dir, PathBuf::from("exports"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
presets_file = "presets.json"

[server]
port = 8080

[logging]
json_format = true
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.logging.json_format);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.presets_file, Some(PathBuf::from("presets.json")));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[extraction]\nmax_leads = 0").unwrap();
        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));

        assert!(matches!(Config::load("/no/such/config.toml"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("LEADLIFTR_PORT", "9000"),
            ("LEADLIFTR_LOG_LEVEL", "debug"),
            ("LEADLIFTR_EXPORT_DIR", "/tmp/leads"),
            ("LEADLIFTR_MAX_LEADS", "not a number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.export.export_dir, PathBuf::from("/tmp/leads"));
        assert_eq!(config.extraction.max_leads, 100);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.chrome.debug_port = 9333;
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_presets_fall_back_to_builtin() {
        let presets = Config::default().presets().unwrap();
        assert!(presets.get("ringy").is_some());
    }
}
