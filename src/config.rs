use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, loaded once from the environment and passed down
/// explicitly. The API credential travels inside this value to whoever
/// constructs a client; no module reads it from a global.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_image_model: String,
    pub gemini_video_model: String,
    pub request_timeout_secs: u64,
    pub video_poll_interval_secs: u64,
    pub video_poll_max_attempts: usize,
    pub video_resolution: String,
    pub video_aspect_ratio: String,
    pub output_dir: PathBuf,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            log_level: env_string("LOG_LEVEL", "info"),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            gemini_video_model: env_string("GEMINI_VIDEO_MODEL", "veo-3.1-fast-generate-preview"),
            request_timeout_secs: env_u64("GEMINI_REQUEST_TIMEOUT_SECS", 90),
            // 10s between status checks; the remote operation rarely finishes
            // in fewer than three polls.
            video_poll_interval_secs: env_u64("VIDEO_POLL_INTERVAL_SECS", 10),
            video_poll_max_attempts: env_usize("VIDEO_POLL_MAX_ATTEMPTS", 60),
            video_resolution: env_string("VIDEO_RESOLUTION", "720p"),
            video_aspect_ratio: env_string("VIDEO_ASPECT_RATIO", "16:9"),
            output_dir: PathBuf::from(env_string("STUDIO_OUTPUT_DIR", ".")),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn video_poll_interval(&self) -> Duration {
        Duration::from_secs(self.video_poll_interval_secs)
    }
}
