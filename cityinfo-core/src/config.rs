use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::PathBuf, time::Duration};

use crate::provider::ProviderId;

/// Environment variable that overrides the weather API key from the config file.
pub const WEATHER_API_KEY_ENV: &str = "WEATHER_API_KEY";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// weather_api_key = "..."
/// request_timeout_secs = 10
/// ```
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// OpenWeather API key. Weather lookups fail without it.
    pub weather_api_key: Option<String>,

    /// Overrides `https://restcountries.com/v3.1`.
    pub country_base_url: Option<String>,

    /// Overrides `https://api.openweathermap.org/data/2.5`.
    pub weather_base_url: Option<String>,

    /// Upper bound for a single upstream request. Unbounded when absent.
    pub request_timeout_secs: Option<u64>,

    /// Where city records are kept. Defaults to the platform data directory.
    pub data_file: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("weather_api_key", &self.weather_api_key.as_ref().map(|_| "<redacted>"))
            .field("country_base_url", &self.country_base_url)
            .field("weather_base_url", &self.weather_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("data_file", &self.data_file)
            .finish()
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Apply `WEATHER_API_KEY` from the process environment on top of the file.
    pub fn with_env_overrides(self) -> Self {
        self.with_weather_api_key_override(std::env::var(WEATHER_API_KEY_ENV).ok())
    }

    /// A non-blank `key` replaces whatever the file had.
    pub fn with_weather_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.weather_api_key = Some(key);
        }
        self
    }

    pub fn set_weather_api_key(&mut self, key: String) {
        self.weather_api_key = Some(key);
    }

    /// Returns the weather API key, treating a blank value as absent.
    pub fn weather_api_key(&self) -> Option<&str> {
        self.weather_api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Base URL for a provider, the configured override or the public default.
    pub fn base_url(&self, id: ProviderId) -> &str {
        let configured = match id {
            ProviderId::Country => self.country_base_url.as_deref(),
            ProviderId::Weather => self.weather_base_url.as_deref(),
        };
        configured.unwrap_or(id.default_base_url())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Path to the city records file.
    pub fn data_file_path(&self) -> Result<PathBuf> {
        match &self.data_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("cities.json")),
        }
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "cityinfo", "cityinfo")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_api_key_absent_by_default() {
        let cfg = Config::default();
        assert_eq!(cfg.weather_api_key(), None);
    }

    #[test]
    fn blank_weather_api_key_counts_as_absent() {
        let mut cfg = Config::default();
        cfg.set_weather_api_key("  ".into());

        assert_eq!(cfg.weather_api_key(), None);
    }

    #[test]
    fn env_key_overrides_file_key() {
        let mut cfg = Config::default();
        cfg.set_weather_api_key("FILE_KEY".into());

        let cfg = cfg.with_weather_api_key_override(Some("ENV_KEY".into()));
        assert_eq!(cfg.weather_api_key(), Some("ENV_KEY"));
    }

    #[test]
    fn blank_env_key_keeps_file_key() {
        let mut cfg = Config::default();
        cfg.set_weather_api_key("FILE_KEY".into());

        let cfg = cfg
            .with_weather_api_key_override(Some(String::new()))
            .with_weather_api_key_override(None);
        assert_eq!(cfg.weather_api_key(), Some("FILE_KEY"));
    }

    #[test]
    fn base_url_falls_back_to_public_endpoints() {
        let mut cfg = Config::default();
        assert_eq!(cfg.base_url(ProviderId::Country), "https://restcountries.com/v3.1");
        assert_eq!(cfg.base_url(ProviderId::Weather), "https://api.openweathermap.org/data/2.5");

        cfg.country_base_url = Some("http://localhost:9000".into());
        assert_eq!(cfg.base_url(ProviderId::Country), "http://localhost:9000");
    }

    #[test]
    fn parses_from_toml() {
        let cfg: Config = toml::from_str(
            r#"
            weather_api_key = "KEY"
            request_timeout_secs = 7
            data_file = "/tmp/cities.json"
            "#,
        )
        .expect("config must parse");

        assert_eq!(cfg.weather_api_key(), Some("KEY"));
        assert_eq!(cfg.request_timeout(), Some(Duration::from_secs(7)));
        assert_eq!(cfg.data_file_path().unwrap(), PathBuf::from("/tmp/cities.json"));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let mut cfg = Config::default();
        cfg.set_weather_api_key("SECRET".into());

        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("SECRET"));
        assert!(dbg.contains("<redacted>"));
    }
}
