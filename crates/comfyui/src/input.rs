//! Input asset staging.
//!
//! Resolves each validated input image (URL fetch or base64 decode),
//! runs the bytes through the configured [`ImageNormalizer`], and pushes
//! the result into the engine's input namespace. Per-image failures are
//! collected; any failure aborts the job before submission.

use std::path::Path;
use std::time::Duration;

use base64::Engine as _;

use relay_core::job::InputImage;

use crate::api::ComfyApi;

/// Timeout for fetching one input image from a URL.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Normalized image bytes plus whether a repair was applied.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub fixed: bool,
}

/// Image repair seam (EXIF orientation, corrupt/MPO normalization).
///
/// The heuristics themselves live outside this system; the default
/// implementation passes bytes through untouched.
pub trait ImageNormalizer: Send + Sync {
    fn normalize(&self, bytes: Vec<u8>) -> Result<NormalizedImage, String>;
}

/// Normalizer that applies no repair.
pub struct PassthroughNormalizer;

impl ImageNormalizer for PassthroughNormalizer {
    fn normalize(&self, bytes: Vec<u8>) -> Result<NormalizedImage, String> {
        Ok(NormalizedImage {
            bytes,
            fixed: false,
        })
    }
}

/// All per-image failures from one staging pass.
#[derive(Debug, thiserror::Error)]
#[error("{} input image(s) failed to stage: {}", errors.len(), errors.join("; "))]
pub struct InputUploadError {
    pub errors: Vec<String>,
}

/// Stage every input image into the engine.
///
/// Images are processed in order; one image failing does not stop the
/// others from being attempted, but any failure fails the whole pass.
pub async fn upload_input_images(
    api: &ComfyApi,
    client: &reqwest::Client,
    images: &[InputImage],
    normalizer: &dyn ImageNormalizer,
) -> Result<(), InputUploadError> {
    if images.is_empty() {
        return Ok(());
    }

    tracing::info!(count = images.len(), "Staging input images into the engine");
    let mut errors = Vec::new();

    for image in images {
        if let Err(reason) = stage_one(api, client, image, normalizer).await {
            tracing::warn!(name = %image.name, error = %reason, "Input image failed to stage");
            errors.push(reason);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(InputUploadError { errors })
    }
}

async fn stage_one(
    api: &ComfyApi,
    client: &reqwest::Client,
    image: &InputImage,
    normalizer: &dyn ImageNormalizer,
) -> Result<(), String> {
    let bytes = resolve_payload(client, image).await?;

    let normalized = normalizer
        .normalize(bytes)
        .map_err(|reason| format!("Failed to normalize image '{}': {reason}", image.name))?;
    if normalized.fixed {
        tracing::debug!(name = %image.name, "Input image repaired during normalization");
    }

    let filename = sanitize_filename(&image.name);
    api.upload_asset(&filename, normalized.bytes)
        .await
        .map_err(|e| format!("Error uploading '{}' to engine: {e}", image.name))?;

    tracing::debug!(name = %image.name, filename = %filename, "Input image staged");
    Ok(())
}

/// Fetch or decode the raw payload for one input image.
async fn resolve_payload(client: &reqwest::Client, image: &InputImage) -> Result<Vec<u8>, String> {
    if image.data.starts_with("http://") || image.data.starts_with("https://") {
        download_image(client, &image.data)
            .await
            .map_err(|e| format!("Failed to download image '{}' from URL: {e}", image.name))
    } else {
        base64::engine::general_purpose::STANDARD
            .decode(&image.data)
            .map_err(|e| format!("Failed to decode base64 for image '{}': {e}", image.name))
    }
}

async fn download_image(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = client
        .get(url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Strip any path components from a client-supplied name.
fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string())
}
