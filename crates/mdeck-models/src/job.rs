//! Job specifications and related value types.
//!
//! A [`JobSpec`] is a plain description of one unit of work handed to the
//! engine: which inputs to read, which container/codec to produce, and how
//! the output file should be named. Specs are inert data; argument
//! construction happens in the media crate.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::CaptureSettings;

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broad kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    Video,
    Audio,
    Image,
    Capture,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Capture => "capture",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target container/codec combination for an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    // Video containers
    Mp4H264,
    MkvH264,
    WebmVp9,
    Avi,
    Mov,
    Gif,
    // Audio containers
    Mp3,
    M4aAac,
    Flac,
    Wav,
    OggVorbis,
    Opus,
    // Image formats
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4H264 => "mp4",
            Self::MkvH264 => "mkv",
            Self::WebmVp9 => "webm",
            Self::Avi => "avi",
            Self::Mov => "mov",
            Self::Gif => "gif",
            Self::Mp3 => "mp3",
            Self::M4aAac => "m4a",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::OggVorbis => "ogg",
            Self::Opus => "opus",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }

    /// Category this format belongs to. Capture jobs produce video formats.
    pub fn category(&self) -> MediaCategory {
        match self {
            Self::Mp4H264 | Self::MkvH264 | Self::WebmVp9 | Self::Avi | Self::Mov | Self::Gif => {
                MediaCategory::Video
            }
            Self::Mp3 | Self::M4aAac | Self::Flac | Self::Wav | Self::OggVorbis | Self::Opus => {
                MediaCategory::Audio
            }
            Self::Png | Self::Jpeg | Self::Webp | Self::Bmp => MediaCategory::Image,
        }
    }

    /// Explicit video encoder flag, if this format requires one.
    ///
    /// Formats without an entry rely on the tool's container default.
    pub fn video_codec(&self) -> Option<&'static str> {
        match self {
            Self::Mp4H264 | Self::MkvH264 => Some("libx264"),
            Self::WebmVp9 => Some("libvpx-vp9"),
            _ => None,
        }
    }

    /// Explicit audio encoder flag for audio-extraction jobs.
    pub fn audio_codec(&self) -> Option<&'static str> {
        match self {
            Self::Mp3 => Some("libmp3lame"),
            Self::M4aAac => Some("aac"),
            Self::Flac => Some("flac"),
            Self::Opus => Some("libopus"),
            _ => None,
        }
    }
}

/// Speed/compression trade-off for software video encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderPreset {
    UltraFast,
    SuperFast,
    VeryFast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    VerySlow,
}

impl EncoderPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UltraFast => "ultrafast",
            Self::SuperFast => "superfast",
            Self::VeryFast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::VerySlow => "veryslow",
        }
    }

    /// Map a UI slider position (0 = fastest) to a preset.
    pub fn from_index(index: usize) -> Option<Self> {
        [
            Self::UltraFast,
            Self::SuperFast,
            Self::VeryFast,
            Self::Faster,
            Self::Fast,
            Self::Medium,
            Self::Slow,
            Self::Slower,
            Self::VerySlow,
        ]
        .get(index)
        .copied()
    }
}

impl Default for EncoderPreset {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for EncoderPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audio track handling for video conversion jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    Aac,
    Mp3,
    Flac,
    Opus,
    /// Pass the source audio stream through untouched.
    Copy,
}

impl AudioCodec {
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Mp3 => "libmp3lame",
            Self::Flac => "flac",
            Self::Opus => "libopus",
            Self::Copy => "copy",
        }
    }
}

impl Default for AudioCodec {
    fn default() -> Self {
        Self::Aac
    }
}

/// Output width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How a derived output file name relates to its input.
///
/// The timestamp variants carry a stamp captured at spec creation so that
/// the derived path stays stable for the lifetime of the spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputNaming {
    Converted,
    Trimmed,
    Screenshot { stamp: String },
    Recording { stamp: String },
}

impl OutputNaming {
    /// Suffix appended to the input stem. Not applicable to recordings,
    /// which have no input file to derive a stem from.
    pub fn suffix(&self) -> String {
        match self {
            Self::Converted => "_converted".to_string(),
            Self::Trimmed => "_trimmed".to_string(),
            Self::Screenshot { stamp } => format!("_screenshot_{stamp}"),
            Self::Recording { stamp } => format!("_{stamp}"),
        }
    }

    /// Timestamp in the `YYYYmmdd_HHMMSS` form used for capture file names.
    pub fn stamp_now() -> String {
        Utc::now().format("%Y%m%d_%H%M%S").to_string()
    }
}

/// Description of one unit of work.
///
/// Specs are built once, validated by the command builder, and never
/// mutated by the engine while a job runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    /// Source files. Empty for capture jobs.
    pub inputs: Vec<PathBuf>,
    /// Explicit output path. When unset the path is derived from the first
    /// input, the naming rule and the format extension.
    pub output: Option<PathBuf>,
    /// Directory for derived outputs. Defaults to the first input's parent.
    pub output_dir: Option<PathBuf>,
    pub category: Option<MediaCategory>,
    pub format: OutputFormat,
    pub preset: EncoderPreset,
    /// Target video bitrate in kbit/s. None lets the encoder decide.
    pub video_bitrate_kbps: Option<u32>,
    pub frame_rate: Option<u32>,
    pub resolution: Option<Resolution>,
    pub audio_codec: AudioCodec,
    /// Audio bitrate string passed verbatim, e.g. "192k".
    pub audio_bitrate: String,
    pub sample_rate: Option<u32>,
    /// Present iff `category` is `Capture`.
    pub capture: Option<CaptureSettings>,
    pub naming: OutputNaming,
    /// Allow the derived output to replace an existing file.
    pub overwrite: bool,
}

impl JobSpec {
    /// Spec for a file conversion job with engine defaults.
    pub fn convert(category: MediaCategory, format: OutputFormat) -> Self {
        Self {
            id: JobId::new(),
            inputs: Vec::new(),
            output: None,
            output_dir: None,
            category: Some(category),
            format,
            preset: EncoderPreset::default(),
            video_bitrate_kbps: None,
            frame_rate: None,
            resolution: None,
            audio_codec: AudioCodec::default(),
            audio_bitrate: "192k".to_string(),
            sample_rate: None,
            capture: None,
            naming: OutputNaming::Converted,
            overwrite: false,
        }
    }

    /// Spec for a capture (recording) job. The file name stamp is taken at
    /// creation time.
    pub fn capture(settings: CaptureSettings, format: OutputFormat) -> Self {
        let mut spec = Self::convert(MediaCategory::Capture, format);
        spec.capture = Some(settings);
        spec.naming = OutputNaming::Recording {
            stamp: OutputNaming::stamp_now(),
        };
        spec
    }

    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_preset(mut self, preset: EncoderPreset) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_video_bitrate_kbps(mut self, kbps: u32) -> Self {
        self.video_bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some(Resolution::new(width, height));
        self
    }

    pub fn with_audio_codec(mut self, codec: AudioCodec) -> Self {
        self.audio_codec = codec;
        self
    }

    pub fn with_audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = bitrate.into();
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Short operation label used in logs.
    pub fn operation(&self) -> &'static str {
        match self.category {
            Some(MediaCategory::Capture) => "capture",
            _ => "convert",
        }
    }
}
