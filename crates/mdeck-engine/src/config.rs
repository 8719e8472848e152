//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// How a paused job holds its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseMode {
    /// Suspend the process with OS signals where available, falling back
    /// to emulation when the signal fails.
    #[default]
    Suspend,
    /// Leave the process running and only mute progress reporting.
    Emulated,
}

impl std::str::FromStr for PauseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suspend" => Ok(Self::Suspend),
            "emulated" => Ok(Self::Emulated),
            other => Err(format!("unknown pause mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tool binary to spawn. Tests point this at a stub script.
    pub ffmpeg_path: PathBuf,
    /// How long a graceful quit may take before the process is killed.
    pub grace_timeout: Duration,
    /// Pre-roll seconds before a recording starts.
    pub countdown_seconds: u32,
    /// How many recent artifacts the registry retains.
    pub registry_capacity: usize,
    /// Default directory for recordings when the session names none.
    pub output_dir: Option<PathBuf>,
    /// How pause holds the process.
    pub pause_mode: PauseMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            grace_timeout: Duration::from_secs(5),
            countdown_seconds: 3,
            registry_capacity: 10,
            output_dir: None,
            pause_mode: PauseMode::Suspend,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `MDECK_*` environment variables.
    ///
    /// Unset or unparseable values fall back to defaults; a bad value is
    /// logged, never fatal.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_path: env_var("MDECK_FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            grace_timeout: parse_env("MDECK_GRACE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace_timeout),
            countdown_seconds: parse_env("MDECK_COUNTDOWN_SECS")
                .unwrap_or(defaults.countdown_seconds),
            registry_capacity: parse_env("MDECK_REGISTRY_CAPACITY")
                .unwrap_or(defaults.registry_capacity),
            output_dir: env_var("MDECK_OUTPUT_DIR").map(PathBuf::from),
            pause_mode: parse_env("MDECK_PAUSE_MODE").unwrap_or(defaults.pause_mode),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|value| match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(var = name, value = %value, "ignoring unparseable config value");
            None
        }
    })
}
