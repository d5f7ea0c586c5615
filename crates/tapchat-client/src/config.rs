//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration.

use std::path::PathBuf;

use directories::ProjectDirs;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Application data directory; images go to `<data_dir>/Pictures`.
    /// Env: `TAPCHAT_DATA_DIR`
    /// Default: platform data directory, or `./tapchat-data`.
    pub data_dir: PathBuf,

    /// Name stamped on outbound messages.
    /// Env: `TAPCHAT_NAME`
    /// Default: `"Me"`
    pub sender_name: String,

    /// Capacity of the upward notification channel.
    /// Env: `TAPCHAT_NOTIFY_CAPACITY`
    /// Default: `64`
    pub notify_capacity: usize,

    /// Capacity of the session command channel.
    /// Env: `TAPCHAT_COMMAND_CAPACITY`
    /// Default: `32`
    pub command_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sender_name: "Me".to_string(),
            notify_capacity: 64,
            command_capacity: 32,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("TAPCHAT_DATA_DIR") {
            if !path.is_empty() {
                config.data_dir = PathBuf::from(path);
            }
        }

        if let Ok(name) = std::env::var("TAPCHAT_NAME") {
            if !name.trim().is_empty() {
                config.sender_name = name;
            }
        }

        if let Some(n) = capacity_var("TAPCHAT_NOTIFY_CAPACITY") {
            config.notify_capacity = n;
        }

        if let Some(n) = capacity_var("TAPCHAT_COMMAND_CAPACITY") {
            config.command_capacity = n;
        }

        config
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "tapchat", "tapchat")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./tapchat-data"))
}

fn capacity_var(key: &str) -> Option<usize> {
    let value = std::env::var(key).ok()?;
    match parse_capacity(&value) {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(key, value = %value, error = %e, "Invalid capacity, using default");
            None
        }
    }
}

/// Channel capacities must be positive; tokio panics on zero.
fn parse_capacity(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("capacity must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
