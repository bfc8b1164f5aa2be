//! Media-kind classification for engine output files.
//!
//! The engine reports outputs under differently-named lists per media
//! family and the final routing decision is made from the file extension.
//! Everything downstream works with [`MediaKind`] instead of re-inspecting
//! raw key names or extensions.

use serde::Serialize;

/// Video container extensions routed to the video pipeline.
///
/// `.gif` is deliberately absent: gifs are classified first and receive
/// no thumbnail or blur treatment.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "avi", "mov"];

/// Marker in a filename identifying engine scratch files.
const TEMP_FILENAME_MARKER: &str = "_temp_";

/// Final media classification of one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Gif,
}

impl MediaKind {
    /// Classify a filename by extension. Gif takes precedence over the
    /// video set; anything that is not a known video container is
    /// treated as an image.
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if ext == "gif" {
            Self::Gif
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else {
            Self::Image
        }
    }

    /// Remote path segment for this kind (`{job}/{segment}/{filename}`).
    pub fn storage_dir(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Video => "videos",
            Self::Gif => "gifs",
        }
    }

    /// Client-facing type label in the job result.
    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Gif => "gif",
        }
    }
}

/// Whether an output descriptor refers to an engine-internal scratch
/// file. These are intermediate, non-deliverable artifacts and are
/// skipped silently rather than reported as errors.
pub fn is_scratch_output(filename: &str, reported_type: &str) -> bool {
    filename.contains(TEMP_FILENAME_MARKER) || reported_type == "temp"
}

/// MIME content type for an output file, derived from its extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Encode format for generated image thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFormat {
    Webp,
    Jpeg,
    Png,
}

impl ThumbnailFormat {
    /// File extension (without dot).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// MIME content type.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Parse from the job-input string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "webp" => Some(Self::Webp),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gif_takes_precedence_over_video_set() {
        assert_eq!(MediaKind::from_filename("anim.gif"), MediaKind::Gif);
        assert_eq!(MediaKind::from_filename("ANIM.GIF"), MediaKind::Gif);
    }

    #[test]
    fn known_video_containers() {
        assert_eq!(MediaKind::from_filename("clip.mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_filename("clip.webm"), MediaKind::Video);
        assert_eq!(MediaKind::from_filename("clip.AVI"), MediaKind::Video);
        assert_eq!(MediaKind::from_filename("clip.mov"), MediaKind::Video);
    }

    #[test]
    fn everything_else_is_an_image() {
        assert_eq!(MediaKind::from_filename("out.png"), MediaKind::Image);
        assert_eq!(MediaKind::from_filename("out.jpeg"), MediaKind::Image);
        assert_eq!(MediaKind::from_filename("no_extension"), MediaKind::Image);
    }

    #[test]
    fn storage_dirs() {
        assert_eq!(MediaKind::Image.storage_dir(), "images");
        assert_eq!(MediaKind::Video.storage_dir(), "videos");
        assert_eq!(MediaKind::Gif.storage_dir(), "gifs");
    }

    #[test]
    fn scratch_detection_by_marker() {
        assert!(is_scratch_output("ComfyUI_temp_abc.png", "output"));
        assert!(is_scratch_output("final.png", "temp"));
        assert!(!is_scratch_output("final.png", "output"));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.mp4"), "video/mp4");
        assert_eq!(content_type_for("a.gif"), "image/gif");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }

    #[test]
    fn thumbnail_format_parse() {
        assert_eq!(ThumbnailFormat::parse("webp"), Some(ThumbnailFormat::Webp));
        assert_eq!(ThumbnailFormat::parse("jpeg"), Some(ThumbnailFormat::Jpeg));
        assert_eq!(ThumbnailFormat::parse("png"), Some(ThumbnailFormat::Png));
        assert_eq!(ThumbnailFormat::parse("bmp"), None);
    }
}
