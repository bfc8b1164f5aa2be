//! FFmpeg frame extraction.
//!
//! Video thumbnails are produced by shelling out to `ffmpeg` rather than
//! decoding containers in-process. One frame near the requested offset is
//! scaled to a fixed width (height auto, even) and written as JPEG.

use std::path::Path;

/// Error type for ffmpeg invocations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("video file not found: {0}")]
    VideoNotFound(String),
}

/// Extract a single frame as a JPEG thumbnail.
///
/// * `timestamp_secs` - offset into the video to sample.
/// * `width`          - output width in pixels; height is derived from
///   the aspect ratio, rounded to an even value as the JPEG encoder
///   requires.
pub async fn extract_frame_thumbnail(
    video_path: &Path,
    output_path: &Path,
    timestamp_secs: f64,
    width: u32,
) -> Result<(), FfmpegError> {
    if !video_path.exists() {
        return Err(FfmpegError::VideoNotFound(
            video_path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-ss",
            &format!("{timestamp_secs:.3}"),
            "-i",
        ])
        .arg(video_path)
        .args([
            "-vframes",
            "1",
            "-vf",
            &format!("scale={width}:-2"),
            "-q:v",
            "3",
        ])
        .arg(output_path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_video_is_rejected_before_spawning() {
        let err = extract_frame_thumbnail(
            Path::new("/nonexistent/clip.mp4"),
            Path::new("/tmp/thumb.jpg"),
            1.0,
            320,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FfmpegError::VideoNotFound(_)));
    }
}
