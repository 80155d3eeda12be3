use anyhow::{Context, Result};
use confyg::{env, Confygery};
use resona_core::track::sanitize_filename;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for resona.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (RESONA_* prefix)
/// 3. Config file (~/.config/resona/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the vector index service.
    ///
    /// Can be set via:
    /// - ENV: RESONA_INDEX_URL
    /// - Config: index_url = "http://localhost:6333"
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Name of the index collection holding track embeddings.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Drop and recreate the collection on startup. Destructive:
    /// existing vectors are lost.
    #[serde(default)]
    pub recreate_collection: bool,

    /// Base URL of the external preview-URL resolver. Tracks without
    /// an inline preview URL are skipped when unset.
    pub resolver_url: Option<String>,

    /// Endpoint of the embedding-model inference service. Required for
    /// processing jobs.
    pub model_url: Option<String>,

    /// Directory for downloaded previews, normalized audio, and
    /// per-user embedding artifacts.
    ///
    /// Default: ~/.local/share/resona (or platform equivalent)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Per-download timeout in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            collection: default_collection(),
            recreate_collection: false,
            resolver_url: None,
            model_url: None,
            data_dir: default_data_dir(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/resona/config.toml
    /// Reads environment variables with RESONA_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("resona");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with a custom data directory (--data-dir CLI flag).
    pub fn load_with_data_dir(data_dir: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.data_dir = data_dir;
        Ok(config)
    }

    /// Directory holding a user's downloaded preview clips.
    pub fn previews_dir(&self, user_id: &str) -> PathBuf {
        self.user_dir(user_id).join("mp3")
    }

    /// Directory holding a user's normalized clips.
    pub fn wav_dir(&self, user_id: &str) -> PathBuf {
        self.user_dir(user_id).join("wav")
    }

    /// Directory holding per-user embedding artifacts.
    pub fn embeddings_dir(&self) -> PathBuf {
        self.data_dir.join("embeddings")
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.data_dir.join(sanitize_filename(user_id))
    }
}

fn default_index_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "track_embeddings".to_string()
}

fn default_download_timeout() -> u64 {
    10
}

/// Get the default data directory.
///
/// Returns: ~/.local/share/resona (or platform equivalent)
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("resona")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/resona/config.toml
/// - macOS: ~/Library/Application Support/resona/config.toml
/// - Windows: %APPDATA%\resona\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("resona")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Resona Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (RESONA_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Base URL of the vector index service
#
# Can also be set via:
# - Environment: RESONA_INDEX_URL=http://localhost:6333
index_url = "http://localhost:6333"

# Collection that holds track embeddings (dim 1024, cosine metric)
#collection = "track_embeddings"

# Base URL of the preview-URL resolver service
#
# Tracks that arrive without an inline preview URL are resolved here
# by "name - artist" key. When unset, such tracks are skipped.
#resolver_url = "http://localhost:8900"

# Endpoint of the embedding-model inference service
#
# Required for 'resona process'; similarity search works without it.
#model_url = "http://localhost:8600/embed"

# Directory for downloaded previews, normalized clips, and per-user
# embedding artifacts
#
# Default: Platform-specific data directory
#data_dir = "/path/to/resona-data"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
