//! Capture sources and quality presets for recording jobs.

use serde::{Deserialize, Serialize};

use crate::job::EncoderPreset;

/// Which input devices a recording combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    ScreenOnly,
    ScreenSystemAudio,
    ScreenMicrophone,
    ScreenAllAudio,
    Webcam,
    WebcamScreen,
}

impl CaptureMode {
    pub fn includes_screen(&self) -> bool {
        !matches!(self, Self::Webcam)
    }

    pub fn includes_webcam(&self) -> bool {
        matches!(self, Self::Webcam | Self::WebcamScreen)
    }

    pub fn wants_system_audio(&self) -> bool {
        matches!(self, Self::ScreenSystemAudio | Self::ScreenAllAudio)
    }

    pub fn wants_microphone(&self) -> bool {
        matches!(self, Self::ScreenMicrophone | Self::ScreenAllAudio)
    }

    pub fn has_audio(&self) -> bool {
        self.wants_system_audio() || self.wants_microphone()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ScreenOnly => "screen only",
            Self::ScreenSystemAudio => "screen + system audio",
            Self::ScreenMicrophone => "screen + microphone",
            Self::ScreenAllAudio => "screen + all audio",
            Self::Webcam => "webcam",
            Self::WebcamScreen => "webcam + screen",
        }
    }
}

/// Recording quality presets mapping to constant-rate-factor and encoder
/// speed settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Low,
    Medium,
    High,
    Lossless,
}

impl QualityPreset {
    pub fn crf(&self) -> u32 {
        match self {
            Self::Low => 28,
            Self::Medium => 23,
            Self::High => 18,
            Self::Lossless => 0,
        }
    }

    pub fn encoder_preset(&self) -> EncoderPreset {
        match self {
            Self::Low => EncoderPreset::UltraFast,
            Self::Medium => EncoderPreset::Fast,
            Self::High => EncoderPreset::Medium,
            Self::Lossless => EncoderPreset::Slow,
        }
    }
}

impl Default for QualityPreset {
    fn default() -> Self {
        Self::Medium
    }
}

fn default_frame_rate() -> u32 {
    30
}

fn default_display() -> String {
    ":0".to_string()
}

fn default_audio_device() -> String {
    "default".to_string()
}

fn default_webcam_device() -> String {
    "/dev/video0".to_string()
}

/// Device configuration for one capture job.
///
/// Device identifiers are resolved by the caller (for example from the
/// `DISPLAY` environment variable) before the spec is built; argument
/// construction never reads the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    pub mode: CaptureMode,
    #[serde(default)]
    pub quality: QualityPreset,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default = "default_display")]
    pub display: String,
    #[serde(default = "default_audio_device")]
    pub audio_device: String,
    #[serde(default = "default_webcam_device")]
    pub webcam_device: String,
}

impl CaptureSettings {
    pub fn new(mode: CaptureMode) -> Self {
        Self {
            mode,
            quality: QualityPreset::default(),
            frame_rate: default_frame_rate(),
            display: default_display(),
            audio_device: default_audio_device(),
            webcam_device: default_webcam_device(),
        }
    }

    pub fn with_quality(mut self, quality: QualityPreset) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = fps;
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = display.into();
        self
    }
}
