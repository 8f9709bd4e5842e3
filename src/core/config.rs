use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co";
const API_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";
const BASE_URL_ENV: &str = "ALPHA_VANTAGE_BASE_URL";

/// A vendor that is part of the comparison set.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VendorConfig {
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

impl VendorConfig {
    fn new(ticker: &str, name: &str, sector: &str, industry: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
            sector: Some(sector.to_string()),
            industry: Some(industry.to_string()),
        }
    }
}

fn default_vendors() -> Vec<VendorConfig> {
    vec![
        VendorConfig::new(
            "TEL",
            "TE Connectivity",
            "Technology",
            "Electronic Components",
        ),
        VendorConfig::new(
            "ST",
            "Sensata Technologies",
            "Technology",
            "Electronic Components",
        ),
        VendorConfig::new("DD", "DuPont de Nemours", "Materials", "Chemicals"),
        VendorConfig::new("CE", "Celanese", "Materials", "Chemicals"),
        VendorConfig::new("LYB", "LyondellBasell", "Materials", "Chemicals"),
    ]
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlphaVantageConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Minimum pacing between upstream requests; unset means no pacing.
    pub requests_per_minute: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_ALPHA_VANTAGE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        AlphaVantageConfig {
            base_url: default_base_url(),
            api_keys: Vec::new(),
            requests_per_minute: Some(5),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub alpha_vantage: AlphaVantageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: u32,
    #[serde(default = "default_persist")]
    pub persist: bool,
    pub data_path: Option<String>,
}

fn default_freshness_hours() -> u32 {
    24
}

fn default_persist() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            freshness_hours: default_freshness_hours(),
            persist: default_persist(),
            data_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_vendors")]
    pub vendors: Vec<VendorConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            vendors: default_vendors(),
            providers: ProvidersConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to built-in
    /// defaults when no file exists yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            let mut config = Self::default();
            config.apply_env(|name| std::env::var(name).ok());
            return Ok(config);
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = Self::project_dirs()?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.cache.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = Self::project_dirs()?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("io", "vendor-health", "vendor-health")
            .context("Could not determine project directories")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.apply_env(|name| std::env::var(name).ok());
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Appends `ALPHA_VANTAGE_API_KEY` and `ALPHA_VANTAGE_API_KEY_1..n` to the
    /// key pool and honours `ALPHA_VANTAGE_BASE_URL`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let alpha_vantage = &mut self.providers.alpha_vantage;

        let mut env_keys = Vec::new();
        if let Some(key) = lookup(API_KEY_ENV) {
            env_keys.push(key);
        }
        let mut index = 1;
        while let Some(key) = lookup(&format!("{API_KEY_ENV}_{index}")) {
            env_keys.push(key);
            index += 1;
        }
        for key in env_keys {
            let key = key.trim().to_string();
            if !key.is_empty() && !alpha_vantage.api_keys.contains(&key) {
                alpha_vantage.api_keys.push(key);
            }
        }

        if let Some(base_url) = lookup(BASE_URL_ENV) {
            alpha_vantage.base_url = base_url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
vendors:
  - ticker: "TEL"
    name: "TE Connectivity"
    sector: "Technology"
  - ticker: "CE"
    name: "Celanese"
providers:
  alpha_vantage:
    base_url: "http://example.com/av"
    api_keys: ["first", "second"]
    requests_per_minute: 75
cache:
  freshness_hours: 12
  persist: false
server:
  bind: "0.0.0.0:9000"
  allowed_origins: ["https://dashboard.example.com"]
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.vendors.len(), 2);
        assert_eq!(config.vendors[0].ticker, "TEL");
        assert_eq!(config.vendors[0].sector.as_deref(), Some("Technology"));
        assert!(config.vendors[1].industry.is_none());

        let av = &config.providers.alpha_vantage;
        assert_eq!(av.base_url, "http://example.com/av");
        assert_eq!(av.api_keys, vec!["first", "second"]);
        assert_eq!(av.requests_per_minute, Some(75));
        assert_eq!(av.timeout_secs, 30);

        assert_eq!(config.cache.freshness_hours, 12);
        assert!(!config.cache.persist);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        let tickers: Vec<_> = config.vendors.iter().map(|v| v.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["TEL", "ST", "DD", "CE", "LYB"]);
        assert_eq!(config.cache.freshness_hours, 24);
        assert!(config.cache.persist);
        assert_eq!(
            config.providers.alpha_vantage.base_url,
            DEFAULT_ALPHA_VANTAGE_URL
        );
        assert!(config.providers.alpha_vantage.api_keys.is_empty());
    }

    #[test]
    fn test_env_keys_are_appended_in_order() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ALPHA_VANTAGE_API_KEY", "primary"),
            ("ALPHA_VANTAGE_API_KEY_1", "second"),
            ("ALPHA_VANTAGE_API_KEY_2", "configured"),
            ("ALPHA_VANTAGE_API_KEY_4", "unreachable"),
            ("ALPHA_VANTAGE_BASE_URL", "http://localhost:1234"),
        ]);
        let mut config = AppConfig::default();
        config.providers.alpha_vantage.api_keys = vec!["configured".to_string()];

        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(
            config.providers.alpha_vantage.api_keys,
            vec!["configured", "primary", "second"]
        );
        assert_eq!(
            config.providers.alpha_vantage.base_url,
            "http://localhost:1234"
        );
    }

    #[test]
    fn test_custom_data_path() {
        let mut config = AppConfig::default();
        config.cache.data_path = Some("/tmp/vendor-health".to_string());
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/vendor-health")
        );
    }
}
