use serde::{Deserialize, Serialize};

use crate::storage::DEFAULT_ALPHABET;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 环境变量前缀，例如 SHORTENER__STORAGE__DATABASE_URL
pub const ENV_PREFIX: &str = "SHORTENER";

/// 静态配置（启动时加载）
///
/// 优先级：命令行参数 > ENV > config.toml > 默认值
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StaticConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub shortener: ShortenerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    pub fn load() -> Self {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// 从 TOML 文件（可选）和环境变量加载配置
    ///
    /// Falls back to defaults when the sources cannot be parsed; logging is
    /// not initialised yet at this point, so problems go to stderr.
    pub fn load_from(path: &str) -> Self {
        match Self::try_load_from(path) {
            Ok(config) => {
                if std::path::Path::new(path).exists() {
                    eprintln!("[INFO] Configuration loaded from: {}", path);
                }
                config
            }
            Err(e) => {
                eprintln!("[ERROR] Failed to load config: {}", e);
                Self::default()
            }
        }
    }

    pub fn try_load_from(path: &str) -> Result<Self, config::ConfigError> {
        use config::{Config, Environment, File};

        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<StaticConfig>()
    }

    /// 生成示例 TOML 配置
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 短链接前缀，保证以 `/` 结尾
    pub fn url_prefix(&self) -> String {
        let base = self.shortener.base_url.trim_end_matches('/');
        format!("{}/", base)
    }
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// 为空时不启用快照
    #[serde(default = "default_file_storage_path")]
    pub file_storage_path: String,
    /// 为空时使用内存存储
    #[serde(default)]
    pub database_url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShortenerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `text` 或 `json`
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
}

fn default_file_storage_path() -> String {
    "/tmp/short-url-db.json".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_alphabet() -> String {
    DEFAULT_ALPHABET.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_enable_rotation() -> bool {
    true
}

fn default_max_backups() -> u32 {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file_storage_path: default_file_storage_path(),
            database_url: String::new(),
            pool_size: default_pool_size(),
        }
    }
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            alphabet: default_alphabet(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            enable_rotation: default_enable_rotation(),
            max_backups: default_max_backups(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = StaticConfig::default();
        assert_eq!(config.storage.file_storage_path, "/tmp/short-url-db.json");
        assert!(config.storage.database_url.is_empty());
        assert_eq!(config.storage.pool_size, 10);
        assert_eq!(config.shortener.base_url, "http://localhost:8080");
        assert_eq!(config.shortener.alphabet, DEFAULT_ALPHABET);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_url_prefix_normalises_trailing_slash() {
        let mut config = StaticConfig::default();
        assert_eq!(config.url_prefix(), "http://localhost:8080/");
        config.shortener.base_url = "https://s.example/".to_string();
        assert_eq!(config.url_prefix(), "https://s.example/");
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[storage]\ndatabase_url = \"sqlite://links.db\"\n\n[shortener]\nbase_url = \"https://s.example\"\n",
        )
        .unwrap();

        let config = StaticConfig::try_load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.storage.database_url, "sqlite://links.db");
        assert_eq!(config.storage.pool_size, 10);
        assert_eq!(config.shortener.base_url, "https://s.example");
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let config = StaticConfig::load_from(path.to_str().unwrap());
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_sample_config_parses_back() {
        let sample = StaticConfig::generate_sample_config();
        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed, StaticConfig::default());
    }
}
