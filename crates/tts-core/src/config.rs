//! Configuration structures for the synthesis gateway.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{TtsError, TtsResult};

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Scratch storage settings.
    pub scratch: ScratchConfig,
    /// Reference audio download settings.
    pub acquire: AcquireConfig,
    /// Reference audio post-processing settings.
    pub postprocess: PostProcessConfig,
    /// Orchestration settings.
    pub orchestrator: OrchestratorConfig,
    /// Request field defaults.
    pub defaults: RequestDefaults,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl ServiceConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> TtsResult<Self> {
        toml::from_str(text).map_err(|e| TtsError::config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> TtsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TtsError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address.
    #[serde(default = "default_server_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Worker count (accepted for compatibility; one synthesis runs at a time).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Request body size limit in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    6010
}

fn default_workers() -> usize {
    1
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1 MB
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            workers: default_workers(),
            max_body_size: default_max_body_size(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

/// Scratch storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchConfig {
    /// Directory for downloads, transcodes and outputs.
    #[serde(default = "default_scratch_dir")]
    pub dir: PathBuf,
    /// Directory for durable outputs.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Age after which scratch files are reaped (0 disables the reaper).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// How often the reaper runs.
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("TEMP")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_reap_interval_secs() -> u64 {
    10 * 60
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: default_scratch_dir(),
            output_dir: default_output_dir(),
            ttl_secs: default_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

/// Reference audio download configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireConfig {
    /// HTTP timeout for the whole download.
    #[serde(default = "default_acquire_timeout_secs")]
    pub timeout_secs: u64,
    /// Largest accepted payload in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Extension used when the URL path has none.
    #[serde(default = "default_extension")]
    pub default_extension: String,
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_max_bytes() -> u64 {
    50 * 1024 * 1024 // 50 MB
}

fn default_extension() -> String {
    "mp3".to_string()
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_acquire_timeout_secs(),
            max_bytes: default_max_bytes(),
            default_extension: default_extension(),
        }
    }
}

/// Reference audio post-processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostProcessConfig {
    /// Frames this many dB below the peak count as silence.
    #[serde(default = "default_top_db")]
    pub top_db: f32,
    /// Analysis frame length in samples.
    #[serde(default = "default_frame_length")]
    pub frame_length: usize,
    /// Analysis hop length in samples.
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    /// Peak amplitude ceiling.
    #[serde(default = "default_max_amplitude")]
    pub max_amplitude: f32,
    /// Trailing silence appended, in seconds at the engine rate.
    #[serde(default = "default_pad_secs")]
    pub pad_secs: f32,
}

fn default_top_db() -> f32 {
    60.0
}

fn default_frame_length() -> usize {
    440
}

fn default_hop_length() -> usize {
    220
}

fn default_max_amplitude() -> f32 {
    0.8
}

fn default_pad_secs() -> f32 {
    0.2
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            top_db: default_top_db(),
            frame_length: default_frame_length(),
            hop_length: default_hop_length(),
            max_amplitude: default_max_amplitude(),
            pad_secs: default_pad_secs(),
        }
    }
}

/// Orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Give up on a request after this many seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Rate reference audio is resampled to, and the minimum accepted rate.
    #[serde(default = "default_prompt_sample_rate")]
    pub prompt_sample_rate: u32,
    /// Container synthesized audio is written in.
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// Container for synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// MPEG layer III.
    #[default]
    Mp3,
    /// Uncompressed 16-bit PCM.
    Wav,
}

impl OutputFormat {
    /// File extension for this container.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Wav => "wav",
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_prompt_sample_rate() -> u32 {
    16000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            prompt_sample_rate: default_prompt_sample_rate(),
            output_format: OutputFormat::default(),
        }
    }
}

/// Defaults applied to fields missing from a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDefaults {
    /// Text synthesized when the request has none.
    #[serde(default = "default_text")]
    pub text: String,
    /// Reference transcript used when the request has none.
    #[serde(default = "default_text")]
    pub prompt_text: String,
    /// Reference clip used when the request has none.
    #[serde(default)]
    pub reference_url: Option<String>,
    /// Speaker for pretrained-voice synthesis.
    #[serde(default = "default_speaker")]
    pub speaker: String,
}

fn default_text() -> String {
    "Hello everyone, this is a short sample of synthesized speech.".to_string()
}

fn default_speaker() -> String {
    "default".to_string()
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            text: default_text(),
            prompt_text: default_text(),
            reference_url: None,
            speaker: default_speaker(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (json or text).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}
