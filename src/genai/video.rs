use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::editor::presets::DEFAULT_VIDEO_PROMPT;
use crate::error::{Result, StudioError};
use crate::genai::gemini::{GeminiClient, InlineImage, GEMINI_API_BASE};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_generation_timing;

/// Fires the cancellation signal. Dropping the handle without cancelling
/// leaves the wait loop running to its deadline.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    #[allow(dead_code)]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the handle fires. Pends forever if the handle is gone
    /// without having fired, so a dropped handle never aborts the wait.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// Bounds for the long-running operation wait: poll cadence and how many
/// polls to attempt before declaring the operation stuck.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: usize,
}

impl PollPolicy {
    pub fn from_config(config: &Config) -> Self {
        PollPolicy {
            interval: config.video_poll_interval(),
            max_attempts: config.video_poll_max_attempts,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            interval: Duration::from_secs(10),
            max_attempts: 60,
        }
    }
}

/// Remote operation state as reported by the service; this client only
/// ever reads it.
#[derive(Debug, Deserialize)]
pub struct VideoOperation {
    pub name: Option<String>,
    #[serde(default)]
    pub done: bool,
    pub error: Option<OperationError>,
    pub response: Option<VideoOperationResponse>,
}

#[derive(Debug, Deserialize)]
pub struct OperationError {
    pub code: Option<i64>,
    pub message: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOperationResponse {
    #[serde(default)]
    pub generated_videos: Vec<GeneratedVideo>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedVideo {
    pub video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
pub struct VideoRef {
    pub uri: Option<String>,
}

pub(crate) fn extract_video_uri(operation: &VideoOperation) -> Option<String> {
    operation
        .response
        .as_ref()?
        .generated_videos
        .iter()
        .find_map(|generated| generated.video.as_ref()?.uri.clone())
}

pub(crate) fn effective_video_prompt(prompt: &str) -> &str {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        DEFAULT_VIDEO_PROMPT
    } else {
        trimmed
    }
}

/// Waits for a long-running operation, polling at the policy cadence. Poll
/// failures end the wait immediately; so do cancellation and the attempt
/// bound. Errors carried by the completed operation are the caller's to
/// classify.
pub(crate) async fn poll_until_done<F, Fut>(
    initial: VideoOperation,
    mut fetch: F,
    policy: PollPolicy,
    mut cancel: CancelToken,
) -> Result<VideoOperation>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<VideoOperation>>,
{
    let mut operation = initial;
    let mut attempts = 0usize;
    while !operation.done {
        if attempts >= policy.max_attempts {
            return Err(StudioError::VideoTimedOut { attempts });
        }
        attempts += 1;

        tokio::select! {
            _ = tokio::time::sleep(policy.interval) => {}
            _ = cancel.cancelled() => return Err(StudioError::Cancelled),
        }

        operation = fetch().await?;
        debug!(target: "genai", attempts, done = operation.done, "video operation polled");
    }
    Ok(operation)
}

impl GeminiClient {
    fn classify_operation_error(&self, error: OperationError) -> StudioError {
        let detail = error
            .message
            .clone()
            .or(error.status.clone())
            .unwrap_or_else(|| "The video operation failed without a message.".to_string());
        if error.code == Some(429) || error.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
            return StudioError::QuotaExceeded;
        }
        self.classify_failure(None, &detail)
    }

    async fn start_video_operation(
        &self,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<VideoOperation> {
        let url = format!(
            "{GEMINI_API_BASE}/models/{}:predictLongRunning",
            self.video_model()
        );
        let payload = json!({
            "instances": [{
                "prompt": prompt,
                "image": {
                    "bytesBase64Encoded": image.base64,
                    "mimeType": image.mime_type
                }
            }],
            "parameters": {
                "sampleCount": 1,
                "resolution": self.video_resolution(),
                "aspectRatio": self.video_aspect_ratio()
            }
        });

        let response = get_http_client()
            .post(&url)
            .header("x-goog-api-key", self.api_key())
            .timeout(self.request_timeout())
            .json(&payload)
            .send()
            .await
            .map_err(|err| self.classify_send_error(err))?;

        self.checked_json(response).await
    }

    async fn fetch_video_operation(&self, name: &str) -> Result<VideoOperation> {
        let url = format!("{GEMINI_API_BASE}/{}", name.trim_start_matches('/'));
        let response = get_http_client()
            .get(&url)
            .header("x-goog-api-key", self.api_key())
            .send()
            .await
            .map_err(|err| self.classify_send_error(err))?;

        self.checked_json(response).await
    }

    /// The completed operation points at the bytes by URI; the download is
    /// a separate authenticated fetch, key carried as a query parameter the
    /// way the service expects for file URIs.
    async fn download_video(&self, uri: &str) -> Result<Vec<u8>> {
        let mut url = Url::parse(uri)
            .map_err(|err| StudioError::Upstream(format!("Invalid video URI: {err}")))?;
        url.query_pairs_mut().append_pair("key", self.api_key());

        let response = get_http_client()
            .get(url)
            .timeout(self.request_timeout())
            .send()
            .await
            .map_err(|err| self.classify_send_error(err))?;

        if !response.status().is_success() {
            return Err(StudioError::Upstream(
                "Failed to download generated video.".to_string(),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.classify_send_error(err))?;
        Ok(bytes.to_vec())
    }

    /// Image-to-video flow: start the long-running operation, wait for it
    /// within the poll policy, then download the finished bytes. At most one
    /// operation should be in flight per caller; the triggering control is
    /// expected to stay disabled while this future is pending.
    pub async fn generate_video(
        &self,
        image: &InlineImage,
        prompt: &str,
        policy: PollPolicy,
        cancel: CancelToken,
    ) -> Result<Vec<u8>> {
        if image.base64.is_empty() {
            return Err(StudioError::validation("Please upload a Subject image."));
        }
        if self.api_key().trim().is_empty() {
            return Err(StudioError::validation(
                "No API key is configured. Set GEMINI_API_KEY before generating.",
            ));
        }

        let prompt = effective_video_prompt(prompt).to_string();
        log_generation_timing(self.video_model(), "generate_video", None, || async {
            let operation = self.start_video_operation(&prompt, image).await?;
            info!(
                "Video operation started (name={:?}, done={})",
                operation.name, operation.done
            );

            let completed = if operation.done {
                operation
            } else {
                let name = operation.name.clone().ok_or_else(|| {
                    StudioError::Upstream(
                        "The video operation handle is missing a name.".to_string(),
                    )
                })?;
                poll_until_done(
                    operation,
                    || self.fetch_video_operation(&name),
                    policy,
                    cancel,
                )
                .await?
            };

            if let Some(error) = completed.error {
                return Err(self.classify_operation_error(error));
            }

            let uri = extract_video_uri(&completed).ok_or(StudioError::NoVideoUri)?;
            self.download_video(&uri).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pending_operation() -> VideoOperation {
        VideoOperation {
            name: Some("models/veo/operations/abc".to_string()),
            done: false,
            error: None,
            response: None,
        }
    }

    fn test_client(api_key: &str) -> GeminiClient {
        let mut config = Config::from_env();
        config.gemini_api_key = api_key.to_string();
        GeminiClient::new(&config)
    }

    #[test]
    fn completed_operation_parses_down_to_the_uri() {
        let operation: VideoOperation = serde_json::from_str(
            r#"{
                "name": "models/veo/operations/abc",
                "done": true,
                "response": {
                    "generatedVideos": [
                        { "video": { "uri": "https://example.com/video.mp4" } }
                    ]
                }
            }"#,
        )
        .unwrap();
        assert!(operation.done);
        assert_eq!(
            extract_video_uri(&operation).as_deref(),
            Some("https://example.com/video.mp4")
        );
    }

    #[test]
    fn done_without_videos_has_no_uri() {
        let operation: VideoOperation =
            serde_json::from_str(r#"{ "name": "op", "done": true, "response": {} }"#).unwrap();
        assert!(extract_video_uri(&operation).is_none());
    }

    #[test]
    fn exhausted_operations_classify_as_quota() {
        let client = test_client("k");
        let err = client.classify_operation_error(OperationError {
            code: Some(429),
            message: Some("too many".to_string()),
            status: None,
        });
        assert!(matches!(err, StudioError::QuotaExceeded));

        let err = client.classify_operation_error(OperationError {
            code: None,
            message: None,
            status: Some("RESOURCE_EXHAUSTED".to_string()),
        });
        assert!(matches!(err, StudioError::QuotaExceeded));
    }

    #[test]
    fn other_operation_errors_surface_their_message() {
        let client = test_client("k");
        let err = client.classify_operation_error(OperationError {
            code: Some(13),
            message: Some("internal failure".to_string()),
            status: Some("INTERNAL".to_string()),
        });
        match err {
            StudioError::Upstream(message) => assert_eq!(message, "internal failure"),
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn empty_video_prompt_falls_back_to_the_default() {
        assert_eq!(effective_video_prompt("  "), DEFAULT_VIDEO_PROMPT);
        assert_eq!(effective_video_prompt("slow zoom"), "slow zoom");
    }

    #[tokio::test(start_paused = true)]
    async fn a_stuck_operation_times_out_instead_of_hanging() {
        let policy = PollPolicy {
            interval: Duration::from_secs(10),
            max_attempts: 3,
        };
        let polls = AtomicUsize::new(0);
        let (_handle, token) = cancel_pair();

        let result = poll_until_done(
            pending_operation(),
            || {
                polls.fetch_add(1, Ordering::SeqCst);
                async { Ok(pending_operation()) }
            },
            policy,
            token,
        )
        .await;

        assert!(matches!(
            result,
            Err(StudioError::VideoTimedOut { attempts: 3 })
        ));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_stops_as_soon_as_the_operation_completes() {
        let policy = PollPolicy {
            interval: Duration::from_secs(10),
            max_attempts: 10,
        };
        let polls = AtomicUsize::new(0);
        let (_handle, token) = cancel_pair();

        let result = poll_until_done(
            pending_operation(),
            || {
                let count = polls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    Ok(VideoOperation {
                        name: Some("op".to_string()),
                        done: count >= 2,
                        error: None,
                        response: None,
                    })
                }
            },
            policy,
            token,
        )
        .await
        .unwrap();

        assert!(result.done);
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_ends_the_wait_between_polls() {
        let policy = PollPolicy {
            interval: Duration::from_secs(3600),
            max_attempts: 100,
        };
        let (handle, token) = cancel_pair();
        handle.cancel();

        let result = poll_until_done(
            pending_operation(),
            || async { Ok(pending_operation()) },
            policy,
            token,
        )
        .await;

        assert!(matches!(result, Err(StudioError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failures_terminate_the_loop_immediately() {
        let policy = PollPolicy {
            interval: Duration::from_secs(10),
            max_attempts: 100,
        };
        let polls = AtomicUsize::new(0);
        let (_handle, token) = cancel_pair();

        let result = poll_until_done(
            pending_operation(),
            || {
                polls.fetch_add(1, Ordering::SeqCst);
                async { Err(StudioError::Upstream("poll failed".to_string())) }
            },
            policy,
            token,
        )
        .await;

        assert!(matches!(result, Err(StudioError::Upstream(_))));
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }
}
