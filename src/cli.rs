//! Command-line interface definitions using clap.

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_CONFIG_PATH, StaticConfig};

/// Shortener - link storage engine
#[derive(Parser, Debug)]
#[command(name = "shortener")]
#[command(version)]
#[command(about = "URL shortener storage engine", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Snapshot file path (empty disables snapshots)
    #[arg(long = "file-storage-path", short = 'f')]
    pub file_storage_path: Option<String>,

    /// Database DSN (empty uses in-memory storage)
    #[arg(long = "database-dsn", short = 'd')]
    pub database_dsn: Option<String>,

    /// Base URL used to build short URLs
    #[arg(long = "base-url", short = 'b')]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Open the store and wait for Ctrl+C (default)
    Run,

    /// Shorten a URL
    Shorten {
        url: String,

        /// Owner user ID
        #[arg(long)]
        user: Option<String>,
    },

    /// Print the original URL for a short key
    Resolve { key: String },

    /// List a user's links
    List { user: String },

    /// Soft-delete a user's links
    Delete {
        user: String,

        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Check that the storage backend is reachable
    Ping,

    /// Print a sample configuration file
    GenerateConfig,
}

impl Cli {
    /// 命令行参数覆盖文件/环境变量中的配置
    pub fn apply_overrides(&self, config: &mut StaticConfig) {
        if let Some(path) = &self.file_storage_path {
            config.storage.file_storage_path = path.clone();
        }
        if let Some(dsn) = &self.database_dsn {
            config.storage.database_url = dsn.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.shortener.base_url = base_url.clone();
        }
    }
}
