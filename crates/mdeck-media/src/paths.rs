//! Output path derivation and filesystem contract checks.
//!
//! Path derivation is pure string manipulation so the command builder stays
//! deterministic. The filesystem checks run separately, just before spawn.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use mdeck_models::{JobSpec, OutputNaming};

use crate::error::{MediaError, MediaResult};

/// Derive the output path for a spec without touching the filesystem.
///
/// An explicit `spec.output` wins. Otherwise the name is derived from the
/// first input's stem plus the naming suffix, except for recordings, whose
/// name is built entirely from the stamp.
pub fn resolve_output(spec: &JobSpec) -> MediaResult<PathBuf> {
    if let Some(output) = &spec.output {
        return Ok(output.clone());
    }

    let ext = spec.format.extension();
    if let OutputNaming::Recording { stamp } = &spec.naming {
        let dir = spec
            .output_dir
            .as_ref()
            .ok_or_else(|| MediaError::invalid_spec("recording requires an output directory"))?;
        return Ok(dir.join(format!("recording_{stamp}.{ext}")));
    }

    let input = spec
        .inputs
        .first()
        .ok_or_else(|| MediaError::invalid_spec("no input to derive an output name from"))?;
    let stem = input
        .file_stem()
        .and_then(OsStr::to_str)
        .ok_or_else(|| MediaError::invalid_spec("input has no usable file name"))?;

    let dir = spec
        .output_dir
        .clone()
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    Ok(dir.join(format!("{stem}{}.{ext}", spec.naming.suffix())))
}

/// Check inputs exist and the output will not clobber an existing file,
/// then make sure the output directory exists.
///
/// Runs once per job, before spawn. Collisions are rejected here rather
/// than left to the tool so the overwrite flag in the spec stays the only
/// way to replace a file.
pub fn check_io_contract(spec: &JobSpec, output: &Path) -> MediaResult<()> {
    for input in &spec.inputs {
        if !input.exists() {
            return Err(MediaError::InputNotFound(input.clone()));
        }
    }

    if output.exists() && !spec.overwrite {
        return Err(MediaError::OutputExists(output.to_path_buf()));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdeck_models::{CaptureMode, CaptureSettings, JobSpec, MediaCategory, OutputFormat};
    use tempfile::TempDir;

    #[test]
    fn test_resolve_output_from_input_stem() {
        let spec = JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264)
            .with_input("/videos/clip.mov");
        let output = resolve_output(&spec).unwrap();
        assert_eq!(output, PathBuf::from("/videos/clip_converted.mp4"));
    }

    #[test]
    fn test_resolve_output_bare_input_name() {
        let spec =
            JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264).with_input("clip.mov");
        let output = resolve_output(&spec).unwrap();
        assert_eq!(output, PathBuf::from("clip_converted.mp4"));
    }

    #[test]
    fn test_resolve_output_explicit_wins() {
        let spec = JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264)
            .with_input("/videos/clip.mov")
            .with_output("/out/final.mp4");
        assert_eq!(
            resolve_output(&spec).unwrap(),
            PathBuf::from("/out/final.mp4")
        );
    }

    #[test]
    fn test_resolve_output_dir_override() {
        let spec = JobSpec::convert(MediaCategory::Audio, OutputFormat::Mp3)
            .with_input("/music/song.wav")
            .with_output_dir("/converted");
        assert_eq!(
            resolve_output(&spec).unwrap(),
            PathBuf::from("/converted/song_converted.mp3")
        );
    }

    #[test]
    fn test_resolve_output_recording_name() {
        let spec = JobSpec::capture(CaptureSettings::new(CaptureMode::ScreenOnly), OutputFormat::Mp4H264)
            .with_output_dir("/recordings");
        let output = resolve_output(&spec).unwrap();
        let name = output.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("recording_"));
        assert!(name.ends_with(".mp4"));
    }

    #[test]
    fn test_resolve_output_no_input() {
        let spec = JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264);
        assert!(matches!(
            resolve_output(&spec),
            Err(MediaError::InvalidSpec(_))
        ));
    }

    #[test]
    fn test_check_io_contract_missing_input() {
        let dir = TempDir::new().unwrap();
        let spec = JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264)
            .with_input(dir.path().join("missing.mov"));
        let output = dir.path().join("missing_converted.mp4");
        assert!(matches!(
            check_io_contract(&spec, &output),
            Err(MediaError::InputNotFound(_))
        ));
    }

    #[test]
    fn test_check_io_contract_collision() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mov");
        let output = dir.path().join("clip_converted.mp4");
        std::fs::write(&input, b"x").unwrap();
        std::fs::write(&output, b"x").unwrap();

        let spec =
            JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264).with_input(&input);
        assert!(matches!(
            check_io_contract(&spec, &output),
            Err(MediaError::OutputExists(_))
        ));

        let spec = spec.with_overwrite(true);
        assert!(check_io_contract(&spec, &output).is_ok());
    }

    #[test]
    fn test_check_io_contract_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mov");
        std::fs::write(&input, b"x").unwrap();
        let output = dir.path().join("nested").join("clip_converted.mp4");

        let spec =
            JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264).with_input(&input);
        check_io_contract(&spec, &output).unwrap();
        assert!(output.parent().unwrap().exists());
    }
}
