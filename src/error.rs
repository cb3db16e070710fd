use std::path::PathBuf;

/// Failure taxonomy shared by ingestion, generation and export.
///
/// Generation-path failures are classified once, at the request-client
/// boundary, so the edit, merge and video flows all report errors the same
/// way. Nothing in here is retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("{0}")]
    Validation(String),

    #[error(
        "API Limit Reached: You have exceeded the current quota. Please wait a few moments \
         before trying again or check your API billing details at ai.google.dev."
    )]
    QuotaExceeded,

    #[error("No image data found in the response.")]
    NoImageData,

    #[error("No video URI returned.")]
    NoVideoUri,

    #[error("Video generation did not complete after {attempts} polls; giving up.")]
    VideoTimedOut { attempts: usize },

    #[error("Video generation was cancelled.")]
    Cancelled,

    /// Transport failures and non-2xx upstream responses, message passed
    /// through verbatim (API key redacted by the client before wrapping).
    #[error("{0}")]
    Upstream(String),

    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Image decoding failed: {0}")]
    Image(#[from] image::ImageError),
}

impl StudioError {
    pub fn validation(message: impl Into<String>) -> Self {
        StudioError::Validation(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StudioError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
