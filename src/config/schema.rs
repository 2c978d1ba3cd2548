//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the mesh gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Upload validation rules.
    pub upload: UploadConfig,

    /// Temp directory and cleanup settings.
    pub storage: StorageConfig,

    /// External generation pipeline.
    pub pipeline: PipelineConfig,

    /// GPU discovery probe.
    pub devices: DeviceConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to produce response headers, generation included.
    pub request_secs: u64,

    /// How long shutdown waits for pending cleanups to finish.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 900,
            shutdown_grace_secs: 30,
        }
    }
}

/// Upload validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Multipart field carrying the image.
    pub field_name: String,

    /// Largest accepted image, in bytes.
    pub max_bytes: usize,

    /// Accepted file extensions (lower case, without the dot).
    pub supported_formats: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            field_name: "image".to_string(),
            max_bytes: 10 * 1024 * 1024,
            supported_formats: ["jpg", "jpeg", "png", "webp", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    /// Whether `extension` (any case) is an accepted format.
    pub fn accepts(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.supported_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(&extension))
    }
}

/// Temp directory and cleanup settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding per-request input and output files.
    pub temp_dir: PathBuf,

    /// Remove files left behind by a previous run at startup.
    pub sweep_on_startup: bool,

    /// Untracked files older than this are removed by the periodic sweep.
    pub stale_after_secs: u64,

    /// Interval of the periodic sweep.
    pub sweep_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("./temp_3d"),
            sweep_on_startup: true,
            stale_after_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

/// External generation pipeline.
///
/// The pipeline is an opaque program. `args` is a template in which
/// `{input}`, `{output}`, `{model}` and `{request_id}` are substituted per job.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Program to execute.
    pub program: String,

    /// Argument template for a generation run.
    pub args: Vec<String>,

    /// Arguments for the one-time load check. Empty skips the check.
    pub probe_args: Vec<String>,

    /// Model identifier handed to the program.
    pub model: String,

    /// Working directory of the child process.
    pub working_dir: Option<PathBuf>,

    /// Extra environment for the child process.
    pub env: BTreeMap<String, String>,

    /// Upper bound for a single generation run.
    pub generation_timeout_secs: u64,

    /// Upper bound for the load check.
    pub load_timeout_secs: u64,

    /// Generations allowed to run at once.
    pub max_concurrent_jobs: usize,

    /// How long a request may wait for a free generation slot.
    pub queue_timeout_ms: u64,

    /// Run the load check at startup instead of on first request.
    pub preload: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: [
                "-m",
                "hy3dgen.cli",
                "--model",
                "{model}",
                "--image",
                "{input}",
                "--output",
                "{output}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            probe_args: vec!["-c".to_string(), "import hy3dgen.shapegen".to_string()],
            model: "tencent/Hunyuan3D-2".to_string(),
            working_dir: None,
            env: BTreeMap::new(),
            generation_timeout_secs: 600,
            load_timeout_secs: 300,
            max_concurrent_jobs: 1,
            queue_timeout_ms: 60_000,
            preload: false,
        }
    }
}

impl PipelineConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

/// GPU discovery probe.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Program listing GPUs. Empty disables the probe.
    pub probe_program: String,

    /// Arguments for the probe.
    pub probe_args: Vec<String>,

    /// Probe timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            probe_program: "nvidia-smi".to_string(),
            probe_args: vec!["--list-gpus".to_string()],
            timeout_secs: 5,
        }
    }
}

/// Cross-origin settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any.
    pub allow_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
