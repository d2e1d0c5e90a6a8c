//! Daemon configuration
//!
//! Optional TOML file (`kiosk.toml`, or the path in `KIOSK_CONFIG`), overlaid
//! by `KIOSK__SECTION__KEY` environment variables. Every key has a default.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Config file used when `KIOSK_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "kiosk.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub backend: BackendSettings,
    pub inference: InferenceSettings,
    pub cameras: CameraSettings,
    pub presence: PresenceSettings,
    pub schedule: ScheduleSettings,
    pub voice: VoiceSettings,
    pub status: StatusSettings,
    pub logging: LoggingSettings,
}

impl KioskConfig {
    /// Load from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("KIOSK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load from `path` (may be missing) plus the environment
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("KIOSK")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cameras.indices"),
            )
            .build()?
            .try_deserialize()
    }
}

/// Business backend that serves the working-hours window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    /// Kiosk team id; empty means no remote schedule
    pub team_id: String,
    pub schedule_path: String,
    pub request_timeout_ms: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".into(),
            team_id: String::new(),
            schedule_path: "api/horarios".into(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub base_url: String,
    pub confidence_threshold: f32,
    pub request_timeout_ms: u64,
    pub capture_timeout_ms: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            confidence_threshold: 0.5,
            request_timeout_ms: 15_000,
            capture_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendKind {
    /// External snapshot command per V4L2 device
    Snapshot,
    /// Synthetic frames
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub backend: CameraBackendKind,
    /// Cameras to open; empty opens every probed camera
    pub indices: Vec<u32>,
    pub snapshot_program: String,
    /// Snapshot arguments; `{device}` becomes the device path. Empty keeps the built-in ffmpeg arguments.
    pub snapshot_args: Vec<String>,
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            backend: CameraBackendKind::Snapshot,
            indices: Vec::new(),
            snapshot_program: "ffmpeg".into(),
            snapshot_args: Vec::new(),
            max_width: 1280,
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    pub enabled: bool,
    /// Serial port; empty auto-discovers
    pub port: String,
    pub baud_rate: u32,
    /// Pause between two presence detections
    pub rearm_ms: u64,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: String::new(),
            baud_rate: presence_protocol::DEFAULT_BAUD_RATE,
            rearm_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub evaluate_every_secs: u64,
    pub reload_every_secs: u64,
    /// Window used when no team id is configured
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            evaluate_every_secs: 60 * 60,
            reload_every_secs: 6 * 60 * 60,
            start_hour: 6,
            end_hour: 22,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Read typed utterances from stdin
    pub console_recognizer: bool,
    /// TTS program; empty logs speech instead
    pub synthesizer_program: String,
    pub synthesizer_voice: String,
    pub welcome_phrase: String,
    pub rate: f32,
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        let accessibility = accessibility::AccessibilityConfig::default();
        Self {
            console_recognizer: false,
            synthesizer_program: "espeak-ng".into(),
            synthesizer_voice: "es".into(),
            welcome_phrase: accessibility.welcome_phrase,
            rate: accessibility.speech_rate,
            volume: accessibility.speech_volume,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    pub enabled: bool,
    pub bind: String,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:8080".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}
