//! Timegate configuration file handling
//!
//! Provides default configuration generation and loading for the bot.
//! Configuration files are TOML; a handful of environment variables
//! (`BOT_TOKEN`, `ADMINS`, `PORT`, `DATA_FILE`, `CHANNEL_ID`, `CHANNEL_LINK`,
//! `CHANNEL_NAME`) override the file so container deployments can run
//! without one.
//!
//! Channels listed here only seed a fresh data file. Once the bot has
//! persisted its document, channels are managed through the bot itself.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use timegate::gatekeeper::{AccessPolicy, MAX_DURATION_HOURS};
use timegate::store::{Channel, DocumentSeed};
use timegate::telegram::client::DEFAULT_API_URL;
use timegate::telegram::conversation::{parse_channel_id, parse_link};
use timegate::telegram::{ChannelId, UserId};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CHANNEL_NAME: &str = "Private channel";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write config file '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Timegate bot configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub keepalive: KeepAliveConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Channels seeded into a fresh data file
    #[serde(default)]
    pub channels: Vec<ChannelSeed>,
}

/// Bot API connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Long-poll timeout for getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

/// Access rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// User ids that administer every channel
    #[serde(default)]
    pub super_admins: Vec<i64>,

    #[serde(default = "default_min_hours")]
    pub min_duration_hours: u64,

    #[serde(default = "default_max_hours")]
    pub max_duration_hours: u64,

    /// One-tap approval durations, in hours
    #[serde(default = "default_presets")]
    pub approval_presets: Vec<u64>,

    /// Expiration sweep period (humantime syntax, e.g. "60s", "5m")
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON document holding channels, grants and pending requests
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    /// HTTP port for `GET /`; disabled when unset
    pub port: Option<u16>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSeed {
    pub id: i64,
    #[serde(default = "default_channel_name")]
    pub name: String,
    pub link: String,
    #[serde(default)]
    pub admins: Vec<i64>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_min_hours() -> u64 {
    1
}

fn default_max_hours() -> u64 {
    750
}

fn default_presets() -> Vec<u64> {
    vec![24, 48, 168]
}

fn default_sweep_interval() -> String {
    "60s".to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_channel_name() -> String {
    DEFAULT_CHANNEL_NAME.to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: default_api_url(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            super_admins: Vec::new(),
            min_duration_hours: default_min_hours(),
            max_duration_hours: default_max_hours(),
            approval_presets: default_presets(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the given file, else the default file if present, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("BOT_TOKEN") {
            self.telegram.token = token.trim().to_string();
        }

        if let Some(admins) = lookup("ADMINS") {
            self.access.super_admins = admins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i64>()
                        .map_err(|_| ConfigError::Invalid(format!("ADMINS: '{}' is not a user id", s)))
                })
                .collect::<Result<_, _>>()?;
        }

        if let Some(port) = lookup("PORT") {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("PORT: '{}' is not a port", port)))?;
            self.keepalive.port = Some(port);
        }

        if let Some(data_file) = lookup("DATA_FILE") {
            self.storage.data_file = PathBuf::from(data_file.trim());
        }

        if let Some(id) = lookup("CHANNEL_ID") {
            let id = parse_channel_id(&id).map_err(|e| ConfigError::Invalid(format!("CHANNEL_ID: {}", e)))?;
            let link = lookup("CHANNEL_LINK").ok_or_else(|| {
                ConfigError::Invalid("CHANNEL_LINK is required with CHANNEL_ID".to_string())
            })?;
            let name = lookup("CHANNEL_NAME").unwrap_or_else(default_channel_name);

            let seed = ChannelSeed {
                id: id.0,
                name,
                link: link.trim().to_string(),
                admins: Vec::new(),
            };
            match self.channels.iter_mut().find(|c| c.id == seed.id) {
                Some(existing) => {
                    existing.name = seed.name;
                    existing.link = seed.link;
                }
                None => self.channels.push(seed),
            }
        }

        Ok(())
    }

    /// Check settings the bot cannot run without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.is_empty() {
            return Err(ConfigError::Invalid(
                "no bot token: set [telegram] token or BOT_TOKEN".to_string(),
            ));
        }
        if self.access.min_duration_hours == 0
            || self.access.min_duration_hours > self.access.max_duration_hours
        {
            return Err(ConfigError::Invalid(format!(
                "duration bounds [{}h, {}h] are not a valid range",
                self.access.min_duration_hours, self.access.max_duration_hours
            )));
        }
        if self.access.max_duration_hours > MAX_DURATION_HOURS {
            return Err(ConfigError::Invalid(format!(
                "max_duration_hours {} exceeds the limit of {}h",
                self.access.max_duration_hours, MAX_DURATION_HOURS
            )));
        }
        self.sweep_interval()?;
        for channel in &self.channels {
            parse_link(&channel.link).map_err(|e| {
                ConfigError::Invalid(format!("channel {}: {}", channel.id, e))
            })?;
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Result<Duration, ConfigError> {
        let interval = humantime::parse_duration(&self.access.sweep_interval).map_err(|e| {
            ConfigError::Invalid(format!(
                "sweep_interval '{}': {}",
                self.access.sweep_interval, e
            ))
        })?;
        if interval.is_zero() {
            return Err(ConfigError::Invalid("sweep_interval must be positive".to_string()));
        }
        Ok(interval)
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy {
            min_duration_hours: self.access.min_duration_hours,
            max_duration_hours: self.access.max_duration_hours,
            approval_presets: self.access.approval_presets.clone(),
        }
    }

    /// Initial document content for a fresh data file
    pub fn document_seed(&self, now: i64) -> DocumentSeed {
        DocumentSeed {
            super_admins: self.access.super_admins.iter().copied().map(UserId).collect(),
            channels: self
                .channels
                .iter()
                .map(|seed| {
                    let mut channel =
                        Channel::new(ChannelId(seed.id), seed.name.clone(), seed.link.clone(), now);
                    for admin in &seed.admins {
                        channel.add_admin(UserId(*admin));
                    }
                    channel
                })
                .collect(),
        }
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(data_file: &Path) -> String {
        format!(
            r#"# Timegate Bot Configuration
#
# Environment variables override this file:
#   BOT_TOKEN, ADMINS (comma separated ids), PORT, DATA_FILE,
#   CHANNEL_ID, CHANNEL_LINK, CHANNEL_NAME

[telegram]
# Bot token from @BotFather (or set BOT_TOKEN)
token = ""

# Bot API endpoint
api_url = "{api_url}"

# Long-poll timeout for getUpdates, in seconds
poll_timeout_secs = 30

[access]
# User ids that administer every channel
super_admins = []

# Bounds for approved access durations, in hours
min_duration_hours = 1
max_duration_hours = 750

# Durations offered as approval buttons, in hours
approval_presets = [24, 48, 168]

# How often expired access is revoked ("60s", "5m", ...)
sweep_interval = "60s"

[storage]
# JSON document with channels, members and pending registrations
data_file = "{data_file}"

[keepalive]
# HTTP port answering GET / (leave commented to disable)
# port = 10000

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
level = "info"

# Channels created in a fresh data file. Afterwards, use /newchannel.
# [[channels]]
# id = -1001234567890
# name = "VIP"
# link = "https://t.me/+AbCdEf"
# admins = []
"#,
            api_url = DEFAULT_API_URL,
            data_file = data_file.display()
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path, data_file: &Path) -> Result<(), ConfigError> {
        write_file(config_path, &Self::generate_default_toml(data_file))
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let write_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
    }
    fs::write(path, contents).map_err(write_error)
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timegate")
        .join("config.toml")
}

/// Get the default data file path
pub fn default_data_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timegate")
        .join("members.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.telegram.api_url, DEFAULT_API_URL);
        assert_eq!(config.access.min_duration_hours, 1);
        assert_eq!(config.access.max_duration_hours, 750);
        assert_eq!(config.access.approval_presets, vec![24, 48, 168]);
        assert_eq!(config.sweep_interval().unwrap(), Duration::from_secs(60));
        assert_eq!(config.logging.level, "info");
        assert!(config.keepalive.port.is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.telegram.token = "123:abc".to_string();
        config.channels.push(ChannelSeed {
            id: -1001,
            name: "VIP".to_string(),
            link: "https://t.me/+v".to_string(),
            admins: vec![7],
        });
        fs::write(&config_path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = AppConfig::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_create_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let data_file = temp_dir.path().join("members.json");

        AppConfig::create_default(&config_path, &data_file).unwrap();

        let config = AppConfig::load(&config_path).unwrap();
        assert_eq!(config.storage.data_file, data_file);
        assert_eq!(config.access, AccessConfig::default());
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[telegram]\ntoken = \"1:x\"\n").unwrap();

        let config = AppConfig::load(&config_path).unwrap();
        assert_eq!(config.telegram.token, "1:x");
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.access.sweep_interval, "60s");
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[telegram\n").unwrap();

        assert!(matches!(
            AppConfig::load(&config_path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("BOT_TOKEN", "42:secret"),
                ("ADMINS", "1190237801, 5"),
                ("PORT", "10000"),
                ("DATA_FILE", "/data/members.json"),
                ("CHANNEL_ID", "-1001234567890"),
                ("CHANNEL_LINK", "https://t.me/+abc"),
            ]))
            .unwrap();

        assert_eq!(config.telegram.token, "42:secret");
        assert_eq!(config.access.super_admins, vec![1190237801, 5]);
        assert_eq!(config.keepalive.port, Some(10000));
        assert_eq!(config.storage.data_file, PathBuf::from("/data/members.json"));
        assert_eq!(
            config.channels,
            vec![ChannelSeed {
                id: -1001234567890,
                name: DEFAULT_CHANNEL_NAME.to_string(),
                link: "https://t.me/+abc".to_string(),
                admins: vec![],
            }]
        );
    }

    #[test]
    fn test_env_channel_replaces_same_id() {
        let mut config = AppConfig::default();
        config.channels.push(ChannelSeed {
            id: -1001,
            name: "Old".to_string(),
            link: "https://t.me/+old".to_string(),
            admins: vec![3],
        });
        config
            .apply_overrides(env(&[
                ("CHANNEL_ID", "-1001"),
                ("CHANNEL_LINK", "https://t.me/+new"),
                ("CHANNEL_NAME", "New"),
            ]))
            .unwrap();

        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.channels[0].name, "New");
        assert_eq!(config.channels[0].admins, vec![3]);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = AppConfig::default();
        assert!(config.apply_overrides(env(&[("ADMINS", "1,bob")])).is_err());
        assert!(config.apply_overrides(env(&[("PORT", "99999")])).is_err());
        assert!(config
            .apply_overrides(env(&[("CHANNEL_ID", "-1001")]))
            .is_err());
        assert!(config
            .apply_overrides(env(&[("CHANNEL_ID", "1234"), ("CHANNEL_LINK", "https://t.me/+a")]))
            .is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config.telegram.token = "1:x".to_string();
        assert!(config.validate().is_ok());

        config.access.sweep_interval = "often".to_string();
        assert!(config.validate().is_err());

        config.access.sweep_interval = "5m".to_string();
        config.access.min_duration_hours = 800;
        assert!(config.validate().is_err());

        config.access.min_duration_hours = 1;
        config.access.max_duration_hours = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_duration_hours"));

        config.access.max_duration_hours = MAX_DURATION_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_document_seed() {
        let mut config = AppConfig::default();
        config.access.super_admins = vec![1];
        config.channels.push(ChannelSeed {
            id: -1001,
            name: "VIP".to_string(),
            link: "https://t.me/+v".to_string(),
            admins: vec![7, 7],
        });

        let seed = config.document_seed(100);
        assert_eq!(seed.super_admins, vec![UserId(1)]);
        assert_eq!(seed.channels.len(), 1);
        assert_eq!(seed.channels[0].admins, vec![UserId(7)]);
        assert_eq!(seed.channels[0].created_at, 100);
    }

    #[test]
    fn test_generate_default_toml() {
        let toml = AppConfig::generate_default_toml(Path::new("/data/timegate/members.json"));

        assert!(toml.contains("data_file = \"/data/timegate/members.json\""));
        assert!(toml.contains("sweep_interval = \"60s\""));
        assert!(toml.contains("BOT_TOKEN"));
    }
}
