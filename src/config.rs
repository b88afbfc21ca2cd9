//! Configuration types for sticker-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Default archive ceiling: 49 MiB, just under common bot attachment limits
pub const DEFAULT_CEILING_BYTES: u64 = 49 * 1024 * 1024;

/// Main configuration for the sticker bot core
///
/// Fields are organized into sub-configs:
/// - [`workspace`](WorkspaceConfig) - scratch directory root
/// - [`archive`](ArchiveConfig) - archive ceiling and compression
/// - [`retry`](RetryConfig) - backoff for remote fetches
/// - [`converter`](ConverterConfig) - external conversion tool
/// - [`remote`](RemoteConfig) - Bot-API-style sticker service
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scratch directory settings
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Archive packaging settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Retry behavior for remote fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Conversion tool settings
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Remote sticker service settings
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Config {
    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.workspace.root.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "workspace root must not be empty".to_string(),
                key: Some("workspace.root".to_string()),
            });
        }
        if self.archive.ceiling_bytes == 0 {
            return Err(Error::Config {
                message: "archive ceiling must be greater than zero".to_string(),
                key: Some("archive.ceiling_bytes".to_string()),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "at least one fetch attempt is required".to_string(),
                key: Some("retry.max_attempts".to_string()),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: format!(
                    "backoff multiplier {} would shrink delays",
                    self.retry.backoff_multiplier
                ),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        Ok(())
    }
}

/// Scratch directory configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root under which every job gets its own directory (default: "output_stickers")
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

/// Archive packaging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Maximum cumulative size of the files in one archive (default: 49 MiB)
    #[serde(default = "default_ceiling_bytes")]
    pub ceiling_bytes: u64,

    /// Compression used for archive entries
    #[serde(default)]
    pub compression: ArchiveCompression,

    /// Pack the downloaded `.tgs` payloads next to the converted files in set archives
    /// (default: true). The payloads count toward the ceiling.
    #[serde(default = "default_true")]
    pub include_sources: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            ceiling_bytes: default_ceiling_bytes(),
            compression: ArchiveCompression::default(),
            include_sources: true,
        }
    }
}

/// Compression method for archive entries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveCompression {
    /// No compression
    Stored,
    /// Deflate (default)
    #[default]
    Deflated,
}

/// Retry configuration for remote fetches
///
/// The delay before retry `n` (zero-based) is `initial_delay * backoff_multiplier^n`.
/// No jitter is applied.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// External conversion tool configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Explicit path to the conversion tool (searched in PATH if None)
    #[serde(default)]
    pub tool_path: Option<PathBuf>,

    /// Binary name searched in PATH (default: "lottie_convert.py")
    #[serde(default = "default_tool_name")]
    pub tool_name: String,

    /// Whether to search PATH when `tool_path` is not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Arguments that select the first frame for still formats (PNG, WEBP)
    #[serde(default = "default_still_frame_args")]
    pub still_frame_args: Vec<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            tool_path: None,
            tool_name: default_tool_name(),
            search_path: true,
            still_frame_args: default_still_frame_args(),
        }
    }
}

/// Remote sticker service configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the Bot-API-style service (default: "https://api.telegram.org")
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bot token used in request paths
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout (default: 60 seconds)
    #[serde(default = "default_remote_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: None,
            timeout: default_remote_timeout(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("output_stickers")
}

fn default_ceiling_bytes() -> u64 {
    DEFAULT_CEILING_BYTES
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_tool_name() -> String {
    "lottie_convert.py".to_string()
}

fn default_true() -> bool {
    true
}

fn default_still_frame_args() -> Vec<String> {
    vec!["--frame".to_string(), "0".to_string()]
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_remote_timeout() -> Duration {
    Duration::from_secs(60)
}

// Durations are written as (possibly fractional) seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
