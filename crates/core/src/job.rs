//! Job payload validation.
//!
//! The dispatcher hands the worker an arbitrary payload (JSON object or a
//! string containing JSON). [`validate_input`] normalizes it into a
//! [`JobRequest`] or rejects it with a [`CoreError::Validation`] before
//! any engine call is made. The caller's value is never mutated.

use serde_json::Value;

use crate::error::CoreError;
use crate::media::ThumbnailFormat;

/// One input image to stage into the engine before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    /// Filename the workflow graph references.
    pub name: String,
    /// Either an `http(s)://` URL or a base64-encoded payload.
    pub data: String,
}

/// Post-processing knobs carried in the job payload. Missing fields fall
/// back to the worker configuration defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputOptions {
    pub generate_blurred_image: bool,
    pub blur_radius: Option<f32>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_quality: Option<u8>,
    pub thumbnail_format: Option<ThumbnailFormat>,
}

/// A validated job payload. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// The opaque workflow graph submitted to the engine verbatim.
    pub workflow: Value,
    /// Input images to stage before submission. Empty when the payload
    /// carried no `images` field.
    pub images: Vec<InputImage>,
    pub options: OutputOptions,
}

/// Validate and normalize a raw job payload.
///
/// Fails when the payload is absent, a string payload is not well-formed
/// JSON, the top-level value is not an object, `workflow` is missing or
/// not an object, or `images` is present but malformed.
pub fn validate_input(payload: &Value) -> Result<JobRequest, CoreError> {
    if payload.is_null() {
        return Err(CoreError::Validation("Input is missing".into()));
    }

    // A string payload is one more level of encoding away.
    let parsed;
    let payload = match payload {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s).map_err(|_| {
                CoreError::Validation("Invalid JSON format in input string".into())
            })?;
            &parsed
        }
        other => other,
    };

    let obj = payload
        .as_object()
        .ok_or_else(|| CoreError::Validation("Input must be a JSON object".into()))?;

    let workflow = obj
        .get("workflow")
        .ok_or_else(|| CoreError::Validation("Missing 'workflow' key in input".into()))?;
    if !workflow.is_object() {
        return Err(CoreError::Validation("'workflow' must be a JSON object".into()));
    }

    let images = match obj.get("images") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => validate_images(items)?,
        Some(_) => return Err(CoreError::Validation("'images' must be a list".into())),
    };

    let options = validate_options(obj)?;

    Ok(JobRequest {
        workflow: workflow.clone(),
        images,
        options,
    })
}

fn validate_images(items: &[Value]) -> Result<Vec<InputImage>, CoreError> {
    let mut images = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or_else(|| {
            CoreError::Validation(format!("Item at index {i} in 'images' must be an object"))
        })?;
        let name = obj.get("name").and_then(Value::as_str).ok_or_else(|| {
            CoreError::Validation(format!("Image name at index {i} must be a string"))
        })?;
        let data = obj.get("image").and_then(Value::as_str).ok_or_else(|| {
            CoreError::Validation(format!(
                "Image data at index {i} must be a string (base64 or URL)"
            ))
        })?;
        images.push(InputImage {
            name: name.to_string(),
            data: data.to_string(),
        });
    }
    Ok(images)
}

fn validate_options(obj: &serde_json::Map<String, Value>) -> Result<OutputOptions, CoreError> {
    let generate_blurred_image = match obj.get("generate_blurred_image") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(CoreError::Validation(
                "'generate_blurred_image' must be a boolean".into(),
            ))
        }
    };

    let blur_radius = match obj.get("blur_radius") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let radius = v.as_f64().filter(|r| *r > 0.0).ok_or_else(|| {
                CoreError::Validation("'blur_radius' must be a number > 0".into())
            })?;
            Some(radius as f32)
        }
    };

    let thumbnail_width = match obj.get("thumbnail_width") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let width = v.as_u64().filter(|w| *w > 0).ok_or_else(|| {
                CoreError::Validation("'thumbnail_width' must be an integer > 0".into())
            })?;
            Some(width as u32)
        }
    };

    let thumbnail_quality = match obj.get("thumbnail_quality") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let quality = v.as_u64().filter(|q| (1..=100).contains(q)).ok_or_else(|| {
                CoreError::Validation("'thumbnail_quality' must be an integer in 1-100".into())
            })?;
            Some(quality as u8)
        }
    };

    let thumbnail_format = match obj.get("thumbnail_format") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let format = v
                .as_str()
                .and_then(ThumbnailFormat::parse)
                .ok_or_else(|| {
                    CoreError::Validation(
                        "'thumbnail_format' must be one of: webp, jpeg, png".into(),
                    )
                })?;
            Some(format)
        }
    };

    Ok(OutputOptions {
        generate_blurred_image,
        blur_radius,
        thumbnail_width,
        thumbnail_quality,
        thumbnail_format,
    })
}
