//! Deterministic FFmpeg argument construction.
//!
//! [`build_args`] is a pure function of the job spec: no filesystem access,
//! no environment reads, no clock. The same spec always yields the same
//! argument vector, so tests can compare full command lines.

use std::path::PathBuf;

use mdeck_models::{AudioCodec, CaptureSettings, JobSpec, MediaCategory};

use crate::error::{MediaError, MediaResult};
use crate::paths;

/// Check that ffmpeg is available in PATH.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Validate a spec without building arguments.
///
/// Rejects incoherent specs before any process is spawned: a missing
/// category, inputs on a capture job, a video container requested for an
/// audio extraction, and so on.
pub fn validate(spec: &JobSpec) -> MediaResult<()> {
    let category = spec
        .category
        .ok_or_else(|| MediaError::invalid_spec("media category is not set"))?;

    if category == MediaCategory::Capture {
        if spec.capture.is_none() {
            return Err(MediaError::invalid_spec(
                "capture job is missing capture settings",
            ));
        }
        if !spec.inputs.is_empty() {
            return Err(MediaError::invalid_spec(
                "capture job must not have file inputs",
            ));
        }
    } else {
        if spec.capture.is_some() {
            return Err(MediaError::invalid_spec(
                "capture settings on a non-capture job",
            ));
        }
        if spec.inputs.is_empty() {
            return Err(MediaError::invalid_spec("no input files"));
        }
    }

    let format_category = spec.format.category();
    let compatible = match category {
        MediaCategory::Video | MediaCategory::Capture => format_category == MediaCategory::Video,
        MediaCategory::Audio => format_category == MediaCategory::Audio,
        MediaCategory::Image => format_category == MediaCategory::Image,
    };
    if !compatible {
        return Err(MediaError::invalid_spec(format!(
            "{} output format is incompatible with a {} job",
            format_category, category
        )));
    }

    Ok(())
}

/// Build the full argument vector for a spec, output path included as the
/// final element.
pub fn build_args(spec: &JobSpec) -> MediaResult<Vec<String>> {
    validate(spec)?;
    let output = paths::resolve_output(spec)?;

    let mut args: Vec<String> = Vec::new();
    // Overwrite confirmation is always passed explicitly; the collision
    // check happens before spawn, never inside the tool.
    args.push("-y".to_string());

    match spec.category {
        Some(MediaCategory::Video) => {
            push_inputs(spec, &mut args);
            push_video_output(spec, &mut args);
        }
        Some(MediaCategory::Audio) => {
            push_inputs(spec, &mut args);
            push_audio_output(spec, &mut args);
        }
        Some(MediaCategory::Image) => {
            push_inputs(spec, &mut args);
        }
        Some(MediaCategory::Capture) => {
            // validate() guarantees settings are present
            if let Some(settings) = &spec.capture {
                push_capture_inputs(settings, &mut args);
                push_capture_output(settings, &mut args);
            }
        }
        None => unreachable!("validate rejects specs without a category"),
    }

    args.push(output.to_string_lossy().into_owned());
    Ok(args)
}

fn push_inputs(spec: &JobSpec, args: &mut Vec<String>) {
    for input in &spec.inputs {
        args.push("-i".to_string());
        args.push(input.to_string_lossy().into_owned());
    }
}

fn push_video_output(spec: &JobSpec, args: &mut Vec<String>) {
    if let Some(resolution) = &spec.resolution {
        args.push("-s".to_string());
        args.push(resolution.to_string());
    }
    if let Some(codec) = spec.format.video_codec() {
        args.push("-c:v".to_string());
        args.push(codec.to_string());
    }
    args.push("-preset".to_string());
    args.push(spec.preset.as_str().to_string());
    if let Some(kbps) = spec.video_bitrate_kbps {
        args.push("-b:v".to_string());
        args.push(format!("{kbps}k"));
    }
    if let Some(fps) = spec.frame_rate {
        args.push("-r".to_string());
        args.push(fps.to_string());
    }
    args.push("-c:a".to_string());
    args.push(spec.audio_codec.flag().to_string());
    // A bitrate makes no sense for a passed-through stream.
    if spec.audio_codec != AudioCodec::Copy {
        args.push("-b:a".to_string());
        args.push(spec.audio_bitrate.clone());
    }
}

fn push_audio_output(spec: &JobSpec, args: &mut Vec<String>) {
    args.push("-vn".to_string());
    if let Some(codec) = spec.format.audio_codec() {
        args.push("-c:a".to_string());
        args.push(codec.to_string());
    }
    args.push("-b:a".to_string());
    args.push(spec.audio_bitrate.clone());
    if let Some(rate) = spec.sample_rate {
        args.push("-ar".to_string());
        args.push(rate.to_string());
    }
}

fn push_capture_inputs(settings: &CaptureSettings, args: &mut Vec<String>) {
    let fps = settings.frame_rate.to_string();
    if settings.mode.includes_screen() {
        args.extend([
            "-f".to_string(),
            "x11grab".to_string(),
            "-framerate".to_string(),
            fps.clone(),
            "-i".to_string(),
            settings.display.clone(),
        ]);
    }
    if settings.mode.wants_system_audio() {
        args.extend([
            "-f".to_string(),
            "pulse".to_string(),
            "-i".to_string(),
            settings.audio_device.clone(),
        ]);
    }
    if settings.mode.wants_microphone() {
        args.extend([
            "-f".to_string(),
            "pulse".to_string(),
            "-i".to_string(),
            settings.audio_device.clone(),
        ]);
    }
    if settings.mode.includes_webcam() {
        args.extend([
            "-f".to_string(),
            "v4l2".to_string(),
            "-framerate".to_string(),
            fps,
            "-i".to_string(),
            settings.webcam_device.clone(),
        ]);
    }
}

fn push_capture_output(settings: &CaptureSettings, args: &mut Vec<String>) {
    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        settings.quality.encoder_preset().as_str().to_string(),
        "-crf".to_string(),
        settings.quality.crf().to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);
    if settings.mode.has_audio() {
        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
        ]);
    }
}
