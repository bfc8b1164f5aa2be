//! Per-item artifact processing.
//!
//! One [`OutputRef`] in, exactly one `Result<ProcessedArtifact,
//! ItemError>` out. The primary upload decides success; derivatives are
//! best-effort and never fail the item. Local files are deleted after
//! their upload attempt on every path through this module.

use std::path::{Path, PathBuf};

use serde::Serialize;

use relay_comfyui::history::OutputRef;
use relay_core::hashing::sha256_hex;
use relay_core::media::{content_type_for, MediaKind};
use relay_storage::{ObjectStore, StoreError};

use crate::derivative::{
    generate_blurred_image, generate_image_thumbnail, generate_video_thumbnail, ThumbnailSpec,
};

/// Length of the filename-hash prefix used for blurred-variant names.
const BLUR_NAME_HASH_LEN: usize = 16;

/// Everything one job's worth of item processing needs, constructed
/// once per job and shared immutably across items.
pub struct ProcessorContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub job_id: &'a str,
    /// Directory where the engine writes output files.
    pub output_root: &'a Path,
    /// Legacy output directory checked when a file is missing from
    /// `output_root`.
    pub alt_output_root: &'a Path,
    pub thumbnail: ThumbnailSpec,
    /// `Some(radius)` enables the privacy-blur variant for images.
    pub blur_radius: Option<f32>,
}

/// A final, uploaded, client-visible artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedArtifact {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blurred_url: Option<String>,
}

/// Item-level failures. Fatal for the item, never for the job.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    /// The output file is missing from every known location.
    #[error("Output file not found at expected paths: {expected} or {alternate}")]
    OutputNotFound { expected: String, alternate: String },

    /// The primary upload was rejected or failed.
    #[error("Failed to upload {filename}: {source}")]
    Upload {
        filename: String,
        source: StoreError,
    },
}

/// Process one output descriptor end to end.
///
/// Resolves the local file, uploads the original under
/// `{job}/{images|videos|gifs}/{filename}`, attaches best-effort
/// derivatives, and deletes the local source regardless of outcome.
pub async fn process_output(
    ctx: &ProcessorContext<'_>,
    output: &OutputRef,
) -> Result<ProcessedArtifact, ItemError> {
    let local_path = resolve_local_path(output, ctx.output_root, ctx.alt_output_root)?;
    let kind = MediaKind::from_filename(&output.filename);

    tracing::info!(
        job_id = %ctx.job_id,
        filename = %output.filename,
        kind = kind.label(),
        path = %local_path.display(),
        "Processing output item",
    );

    let primary_key = format!("{}/{}/{}", ctx.job_id, kind.storage_dir(), output.filename);
    let uploaded = ctx
        .store
        .upload(&local_path, &primary_key, content_type_for(&output.filename))
        .await;

    let url = match uploaded {
        Ok(url) => url,
        Err(source) => {
            cleanup_local_file(&local_path, "output file").await;
            return Err(ItemError::Upload {
                filename: output.filename.clone(),
                source,
            });
        }
    };

    let mut artifact = ProcessedArtifact {
        url,
        media_type: kind,
        thumbnail_url: None,
        blurred_url: None,
    };

    // Derivatives read the local source, so it is deleted only after
    // they have run.
    match kind {
        MediaKind::Image => {
            artifact.thumbnail_url = try_image_thumbnail(ctx, &local_path, &output.filename).await;
            if let Some(radius) = ctx.blur_radius {
                artifact.blurred_url =
                    try_blurred_variant(ctx, &local_path, &output.filename, radius).await;
            }
        }
        MediaKind::Video => {
            artifact.thumbnail_url = try_video_thumbnail(ctx, &local_path, &output.filename).await;
        }
        MediaKind::Gif => {}
    }

    cleanup_local_file(&local_path, kind.label()).await;

    tracing::info!(
        job_id = %ctx.job_id,
        filename = %output.filename,
        url = %artifact.url,
        "Output item processed",
    );
    Ok(artifact)
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// Resolve an output descriptor to an existing local file.
///
/// Preference order: engine-supplied absolute path, configured output
/// root + subfolder/filename, then the one alternate root.
fn resolve_local_path(
    output: &OutputRef,
    root: &Path,
    alt_root: &Path,
) -> Result<PathBuf, ItemError> {
    if let Some(fullpath) = &output.fullpath {
        let candidate = PathBuf::from(fullpath);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let mut relative = PathBuf::new();
    let subfolder = output.subfolder.trim_start_matches('/');
    if !subfolder.is_empty() {
        relative.push(subfolder);
    }
    relative.push(&output.filename);

    let expected = root.join(&relative);
    if expected.exists() {
        return Ok(expected);
    }

    let alternate = alt_root.join(&relative);
    if alternate.exists() {
        tracing::debug!(path = %alternate.display(), "Found output file in alternate root");
        return Ok(alternate);
    }

    Err(ItemError::OutputNotFound {
        expected: expected.to_string_lossy().to_string(),
        alternate: alternate.to_string_lossy().to_string(),
    })
}

// ---------------------------------------------------------------------------
// Derivatives (best-effort)
// ---------------------------------------------------------------------------

async fn try_image_thumbnail(
    ctx: &ProcessorContext<'_>,
    source: &Path,
    filename: &str,
) -> Option<String> {
    let ext = ctx.thumbnail.format.extension();
    let temp = temp_file_path(ext);

    let spec = ctx.thumbnail.clone();
    let source = source.to_path_buf();
    let temp_for_task = temp.clone();
    let generated = tokio::task::spawn_blocking(move || {
        generate_image_thumbnail(&source, &temp_for_task, &spec)
    })
    .await;

    match generated {
        Ok(Ok(())) => {
            let key = format!(
                "{}/thumbnails/{}_thumb.{ext}",
                ctx.job_id,
                file_stem(filename)
            );
            upload_derivative(ctx, &temp, &key, ctx.thumbnail.format.content_type(), "thumbnail")
                .await
        }
        Ok(Err(e)) => {
            tracing::warn!(filename = %filename, error = %e, "Thumbnail generation failed");
            cleanup_local_file(&temp, "thumbnail temp file").await;
            None
        }
        Err(e) => {
            tracing::warn!(filename = %filename, error = %e, "Thumbnail task panicked");
            cleanup_local_file(&temp, "thumbnail temp file").await;
            None
        }
    }
}

async fn try_blurred_variant(
    ctx: &ProcessorContext<'_>,
    source: &Path,
    filename: &str,
    radius: f32,
) -> Option<String> {
    // The blurred variant keeps the original encoding but takes a
    // hash-derived name so the original filename never leaks.
    let ext = file_extension(filename);
    let hashed = &sha256_hex(filename.as_bytes())[..BLUR_NAME_HASH_LEN];
    let blurred_name = format!("{hashed}.{ext}");
    let temp = temp_file_path(&ext);

    let source = source.to_path_buf();
    let temp_for_task = temp.clone();
    let generated =
        tokio::task::spawn_blocking(move || generate_blurred_image(&source, &temp_for_task, radius))
            .await;

    match generated {
        Ok(Ok(())) => {
            let key = format!("{}/images/{blurred_name}", ctx.job_id);
            upload_derivative(ctx, &temp, &key, content_type_for(filename), "blurred variant").await
        }
        Ok(Err(e)) => {
            tracing::warn!(filename = %filename, error = %e, "Blurred variant generation failed");
            cleanup_local_file(&temp, "blurred temp file").await;
            None
        }
        Err(e) => {
            tracing::warn!(filename = %filename, error = %e, "Blurred variant task panicked");
            cleanup_local_file(&temp, "blurred temp file").await;
            None
        }
    }
}

async fn try_video_thumbnail(
    ctx: &ProcessorContext<'_>,
    source: &Path,
    filename: &str,
) -> Option<String> {
    let temp = temp_file_path("jpg");

    match generate_video_thumbnail(source, &temp, ctx.thumbnail.width).await {
        Ok(()) => {
            let key = format!(
                "{}/thumbnails/{}_thumb.jpg",
                ctx.job_id,
                file_stem(filename)
            );
            upload_derivative(ctx, &temp, &key, "image/jpeg", "video thumbnail").await
        }
        Err(e) => {
            tracing::warn!(filename = %filename, error = %e, "Video thumbnail generation failed");
            cleanup_local_file(&temp, "video thumbnail temp file").await;
            None
        }
    }
}

/// Upload a derivative and delete its temp file regardless of outcome.
/// Failures are logged and swallowed -- derivatives never fail the item.
async fn upload_derivative(
    ctx: &ProcessorContext<'_>,
    temp: &Path,
    key: &str,
    content_type: &str,
    description: &str,
) -> Option<String> {
    let uploaded = ctx.store.upload(temp, key, content_type).await;
    cleanup_local_file(temp, description).await;

    match uploaded {
        Ok(url) => {
            tracing::debug!(key = %key, "Uploaded {description}");
            Some(url)
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Failed to upload {description}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Local file helpers
// ---------------------------------------------------------------------------

/// Remove a local file, logging (but swallowing) failures.
async fn cleanup_local_file(path: &Path, description: &str) {
    if !path.exists() {
        return;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed local {description}"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Error removing local {description}")
        }
    }
}

fn temp_file_path(ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!("relay-{}.{ext}", uuid::Uuid::new_v4()))
}

fn file_stem(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
}

fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
