//! Derivative generation: image thumbnails, privacy blurs, video frame
//! thumbnails.
//!
//! Every function here is best-effort from the pipeline's point of view:
//! a failure is logged by the caller and the derivative is omitted from
//! the result. Image operations are CPU-bound and synchronous; the
//! artifact processor runs them on a blocking thread.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use relay_core::ffmpeg;
use relay_core::media::ThumbnailFormat;

/// Offset into a video where the frame thumbnail is sampled.
const VIDEO_THUMBNAIL_OFFSET_SECS: f64 = 1.0;

/// Errors from derivative generation. Always non-fatal for the job.
#[derive(Debug, thiserror::Error)]
pub enum DerivativeError {
    #[error("image operation failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(#[from] ffmpeg::FfmpegError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Thumbnail encode settings, resolved from job options and worker
/// configuration defaults.
#[derive(Debug, Clone)]
pub struct ThumbnailSpec {
    /// Target length of the longer edge, in pixels.
    pub width: u32,
    /// Encode quality 1-100. Applied to JPEG only; PNG and WebP encode
    /// losslessly.
    pub quality: u8,
    pub format: ThumbnailFormat,
}

/// Compute thumbnail dimensions: the longer edge becomes `target`, the
/// shorter edge scales to preserve aspect ratio, never below 1 px.
pub fn thumbnail_dimensions(width: u32, height: u32, target: u32) -> (u32, u32) {
    if width >= height {
        let scaled = ((height as f64 * target as f64) / width as f64).round() as u32;
        (target, scaled.max(1))
    } else {
        let scaled = ((width as f64 * target as f64) / height as f64).round() as u32;
        (scaled.max(1), target)
    }
}

/// Generate a resized thumbnail of `source` at `dest`.
pub fn generate_image_thumbnail(
    source: &Path,
    dest: &Path,
    spec: &ThumbnailSpec,
) -> Result<(), DerivativeError> {
    let img = image::open(source)?;
    let (width, height) = img.dimensions();
    let (thumb_w, thumb_h) = thumbnail_dimensions(width, height, spec.width);
    let thumb = img.resize_exact(thumb_w, thumb_h, FilterType::Lanczos3);

    encode_to(dest, &thumb, spec)?;
    Ok(())
}

/// Generate a Gaussian-blurred privacy variant of `source` at `dest`.
///
/// The output keeps the source's format (inferred from the `dest`
/// extension by the encoder).
pub fn generate_blurred_image(
    source: &Path,
    dest: &Path,
    radius: f32,
) -> Result<(), DerivativeError> {
    let img = image::open(source)?;
    let blurred = img.blur(radius);
    blurred.save(dest)?;
    Ok(())
}

/// Extract one JPEG frame near the 1-second mark of a video.
pub async fn generate_video_thumbnail(
    video: &Path,
    dest: &Path,
    width: u32,
) -> Result<(), DerivativeError> {
    ffmpeg::extract_frame_thumbnail(video, dest, VIDEO_THUMBNAIL_OFFSET_SECS, width).await?;
    Ok(())
}

/// Encode an image per the thumbnail spec.
///
/// JPEG cannot carry an alpha channel and the lossless WebP encoder
/// only accepts RGB8/RGBA8, so pixels are converted first.
fn encode_to(
    dest: &Path,
    img: &DynamicImage,
    spec: &ThumbnailSpec,
) -> Result<(), DerivativeError> {
    let mut writer = BufWriter::new(File::create(dest)?);
    match spec.format {
        ThumbnailFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut writer, spec.quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        ThumbnailFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            img.write_with_encoder(encoder)?;
        }
        ThumbnailFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut writer);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{}-{name}", uuid::Uuid::new_v4()))
    }

    fn write_test_image(width: u32, height: u32) -> std::path::PathBuf {
        let path = temp_path("source.png");
        RgbImage::from_pixel(width, height, image::Rgb([120, 40, 200]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn dimensions_landscape_pins_width() {
        assert_eq!(thumbnail_dimensions(1920, 1080, 320), (320, 180));
    }

    #[test]
    fn dimensions_portrait_pins_height() {
        assert_eq!(thumbnail_dimensions(1080, 1920, 320), (180, 320));
    }

    #[test]
    fn dimensions_square() {
        assert_eq!(thumbnail_dimensions(640, 640, 320), (320, 320));
    }

    #[test]
    fn dimensions_never_collapse_to_zero() {
        assert_eq!(thumbnail_dimensions(10_000, 1, 320), (320, 1));
        assert_eq!(thumbnail_dimensions(1, 10_000, 320), (1, 320));
    }

    #[test]
    fn thumbnail_matches_target_on_longer_edge() {
        let source = write_test_image(800, 600);
        let dest = temp_path("thumb.jpg");
        let spec = ThumbnailSpec {
            width: 320,
            quality: 80,
            format: ThumbnailFormat::Jpeg,
        };
        generate_image_thumbnail(&source, &dest, &spec).unwrap();

        let thumb = image::open(&dest).unwrap();
        assert_eq!(thumb.dimensions(), (320, 240));

        std::fs::remove_file(&source).unwrap();
        std::fs::remove_file(&dest).unwrap();
    }

    #[test]
    fn thumbnail_encodes_each_format() {
        let source = write_test_image(64, 32);
        for (format, ext) in [
            (ThumbnailFormat::Jpeg, "jpg"),
            (ThumbnailFormat::Png, "png"),
            (ThumbnailFormat::Webp, "webp"),
        ] {
            let dest = temp_path(&format!("thumb.{ext}"));
            let spec = ThumbnailSpec {
                width: 16,
                quality: 70,
                format,
            };
            generate_image_thumbnail(&source, &dest, &spec).unwrap();
            assert!(std::fs::metadata(&dest).unwrap().len() > 0);
            std::fs::remove_file(&dest).unwrap();
        }
        std::fs::remove_file(&source).unwrap();
    }

    #[test]
    fn blur_preserves_dimensions() {
        let source = write_test_image(48, 48);
        let dest = temp_path("blurred.png");
        generate_blurred_image(&source, &dest, 4.0).unwrap();

        let blurred = image::open(&dest).unwrap();
        assert_eq!(blurred.dimensions(), (48, 48));

        std::fs::remove_file(&source).unwrap();
        std::fs::remove_file(&dest).unwrap();
    }

    #[test]
    fn missing_source_reports_image_error() {
        let dest = temp_path("thumb.jpg");
        let spec = ThumbnailSpec {
            width: 320,
            quality: 80,
            format: ThumbnailFormat::Jpeg,
        };
        let err = generate_image_thumbnail(Path::new("/nonexistent.png"), &dest, &spec);
        assert!(err.is_err());
    }
}
