//! Worker configuration loaded from environment variables.

use std::time::Duration;

/// Configuration for one worker process.
///
/// All fields have defaults suitable for the standard container image.
/// In production, override via environment variables. Constructed once in
/// the worker binary and passed by reference into every component.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// ComfyUI host and port (default: `127.0.0.1:8188`).
    pub comfy_host: String,
    /// Delay between readiness-check attempts.
    pub readiness_interval: Duration,
    /// Maximum number of readiness-check attempts.
    pub readiness_max_retries: u32,
    /// Delay between history polls.
    pub poll_interval: Duration,
    /// Wall-clock deadline for one job, in seconds. The only authority
    /// for declaring the job timed out.
    pub job_timeout_secs: u64,
    /// Directory where the engine writes output files.
    pub output_root: String,
    /// Alternate output directory checked when a file is missing from
    /// `output_root` (some images keep the legacy layout).
    pub alt_output_root: String,
    /// Default Gaussian blur radius for privacy variants.
    pub blur_radius: f32,
    /// Default thumbnail target width in pixels (longer edge).
    pub thumbnail_width: u32,
    /// Default thumbnail encode quality (1-100, JPEG only).
    pub thumbnail_quality: u8,
    /// Default thumbnail format: `webp`, `jpeg`, or `png`.
    pub thumbnail_format: String,
    /// Whether the dispatcher should recycle this worker after each job.
    pub refresh_worker: bool,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                      |
    /// |----------------------------------|------------------------------|
    /// | `COMFY_HOST`                     | `127.0.0.1:8188`             |
    /// | `COMFY_API_AVAILABLE_INTERVAL_MS`| `50`                         |
    /// | `COMFY_API_AVAILABLE_MAX_RETRIES`| `500`                        |
    /// | `COMFY_POLLING_INTERVAL_MS`      | `250`                        |
    /// | `JOB_TIMEOUT_SECS`               | `600`                        |
    /// | `COMFYUI_OUTPUT_PATH`            | `/workspace/ComfyUI/output`  |
    /// | `COMFYUI_ALT_OUTPUT_PATH`        | `/comfyui/output`            |
    /// | `IMAGE_FILTER_BLUR_RADIUS`       | `10`                         |
    /// | `THUMBNAIL_WIDTH`                | `320`                        |
    /// | `THUMBNAIL_QUALITY`              | `80`                         |
    /// | `THUMBNAIL_FORMAT`               | `jpeg`                       |
    /// | `REFRESH_WORKER`                 | `false`                      |
    pub fn from_env() -> Self {
        Self {
            comfy_host: env_or("COMFY_HOST", "127.0.0.1:8188"),
            readiness_interval: Duration::from_millis(env_parsed(
                "COMFY_API_AVAILABLE_INTERVAL_MS",
                50,
            )),
            readiness_max_retries: env_parsed("COMFY_API_AVAILABLE_MAX_RETRIES", 500),
            poll_interval: Duration::from_millis(env_parsed("COMFY_POLLING_INTERVAL_MS", 250)),
            job_timeout_secs: env_parsed("JOB_TIMEOUT_SECS", 600),
            output_root: env_or("COMFYUI_OUTPUT_PATH", "/workspace/ComfyUI/output"),
            alt_output_root: env_or("COMFYUI_ALT_OUTPUT_PATH", "/comfyui/output"),
            blur_radius: env_parsed("IMAGE_FILTER_BLUR_RADIUS", 10.0),
            thumbnail_width: env_parsed("THUMBNAIL_WIDTH", 320),
            thumbnail_quality: env_parsed("THUMBNAIL_QUALITY", 80),
            thumbnail_format: env_or("THUMBNAIL_FORMAT", "jpeg"),
            refresh_worker: env_or("REFRESH_WORKER", "false").eq_ignore_ascii_case("true"),
        }
    }

    /// Base HTTP URL of the engine, e.g. `http://127.0.0.1:8188`.
    pub fn comfy_url(&self) -> String {
        format!("http://{}", self.comfy_host)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var mutation is process-global, so defaults are exercised via
    // keys that are never set in the test environment.

    #[test]
    fn defaults_are_sane() {
        let config = WorkerConfig::from_env();
        assert!(!config.comfy_host.is_empty());
        assert!(config.job_timeout_secs > 0);
        assert!(config.thumbnail_width > 0);
        assert!((1..=100).contains(&config.thumbnail_quality));
    }

    #[test]
    fn comfy_url_prepends_scheme() {
        let mut config = WorkerConfig::from_env();
        config.comfy_host = "10.0.0.5:8188".into();
        assert_eq!(config.comfy_url(), "http://10.0.0.5:8188");
    }

    #[test]
    fn env_parsed_falls_back_on_missing() {
        assert_eq!(env_parsed::<u64>("RELAY_TEST_UNSET_KEY", 42), 42);
    }
}
