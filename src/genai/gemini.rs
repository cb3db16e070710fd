use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::editor::presets::DEFAULT_MERGE_STYLE;
use crate::error::{Result, StudioError};
use crate::media::IngestedImage;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_generation_timing;

pub(crate) const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One image as the generation service accepts it inline: base64 payload
/// plus its MIME type.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub base64: String,
    pub mime_type: String,
}

impl InlineImage {
    #[allow(dead_code)]
    pub fn new(base64: impl Into<String>, mime_type: impl Into<String>) -> Self {
        InlineImage {
            base64: base64.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn from_ingested(image: &IngestedImage) -> Self {
        InlineImage {
            base64: image.base64_payload.clone(),
            mime_type: image.mime_type.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        #[allow(dead_code)]
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = value.pointer("/error/message").and_then(|v| v.as_str()) {
            return message.to_string();
        }
    }

    truncate_for_log(trimmed, 2000)
}

/// First response part carrying inline image data; the rest (text
/// commentary, extra images) is ignored.
pub(crate) fn first_inline_image(response: GenerateContentResponse) -> Option<String> {
    for candidate in response.candidates.unwrap_or_default() {
        let parts = candidate.content.and_then(|content| content.parts);
        for part in parts.unwrap_or_default() {
            if let Part::InlineData { inline_data } = part {
                if inline_data.mime_type.starts_with("image/") {
                    return Some(inline_data.data);
                }
            }
        }
    }
    None
}

pub(crate) fn merge_instruction(style: &str, remove_background: bool) -> String {
    let bg_instruction = if remove_background {
        "extracting the main subject from the first image (remove its original background) and placing it"
    } else {
        "placing the first image (without removing its background)"
    };
    format!(
        "Create a new image by {bg_instruction} into the scene/background of the second image. \
         Apply the following style/description to the final image: \"{style}\". \
         Ensure the lighting and perspective match for a cohesive result."
    )
}

pub(crate) fn effective_merge_style(style: &str) -> &str {
    let trimmed = style.trim();
    if trimmed.is_empty() {
        DEFAULT_MERGE_STYLE
    } else {
        trimmed
    }
}

fn inline_part(image: &InlineImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.base64
        }
    })
}

/// Client for the remote generation service. Holds the credential it was
/// constructed with and attaches it to every call; nothing here reads
/// process-global state. One network call per invocation, no internal
/// retries; callers decide whether to re-invoke.
pub struct GeminiClient {
    api_key: String,
    image_model: String,
    video_model: String,
    request_timeout: std::time::Duration,
    video_resolution: String,
    video_aspect_ratio: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        GeminiClient {
            api_key: config.gemini_api_key.clone(),
            image_model: config.gemini_image_model.clone(),
            video_model: config.gemini_video_model.clone(),
            request_timeout: config.request_timeout(),
            video_resolution: config.video_resolution.clone(),
            video_aspect_ratio: config.video_aspect_ratio.clone(),
        }
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn video_model(&self) -> &str {
        &self.video_model
    }

    pub(crate) fn video_resolution(&self) -> &str {
        &self.video_resolution
    }

    pub(crate) fn video_aspect_ratio(&self) -> &str {
        &self.video_aspect_ratio
    }

    pub(crate) fn request_timeout(&self) -> std::time::Duration {
        self.request_timeout
    }

    pub(crate) fn redact(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn ensure_credential(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(StudioError::validation(
                "No API key is configured. Set GEMINI_API_KEY before generating.",
            ));
        }
        Ok(())
    }

    /// The one place generation failures are classified, shared by the edit,
    /// merge and video paths: a 429 or a RESOURCE_EXHAUSTED marker means the
    /// quota is gone; anything else passes through as an upstream failure.
    pub(crate) fn classify_failure(&self, status: Option<StatusCode>, detail: &str) -> StudioError {
        if status == Some(StatusCode::TOO_MANY_REQUESTS)
            || detail.contains("RESOURCE_EXHAUSTED")
            || detail.contains("429")
        {
            return StudioError::QuotaExceeded;
        }
        StudioError::Upstream(self.redact(detail))
    }

    pub(crate) fn classify_send_error(&self, err: reqwest::Error) -> StudioError {
        self.classify_failure(err.status(), &err.to_string())
    }

    pub(crate) async fn checked_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(Some(status), &summarize_error_body(&body)));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| self.classify_send_error(err))
    }

    async fn generate_content(&self, parts: Vec<Value>) -> Result<GenerateContentResponse> {
        let url = format!(
            "{GEMINI_API_BASE}/models/{}:generateContent",
            self.image_model
        );
        debug!(target: "genai", model = %self.image_model, parts = parts.len(), "submitting generateContent request");
        let payload = json!({
            "contents": [{ "role": "user", "parts": parts }]
        });

        let response = get_http_client()
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| self.classify_send_error(err))?;

        self.checked_json(response).await
    }

    /// Single-image edit: the composed instruction and the uploaded payload
    /// travel together as one multimodal prompt. Returns the base64 PNG of
    /// the first image part in the response.
    pub async fn generate_edited_image(
        &self,
        image: &InlineImage,
        prompt: &str,
    ) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(StudioError::validation(
                "Please verify the prompt is not empty.",
            ));
        }
        if image.base64.is_empty() {
            return Err(StudioError::validation("Please upload an image first."));
        }
        self.ensure_credential()?;

        let parts = vec![json!({ "text": prompt }), inline_part(image)];
        log_generation_timing(&self.image_model, "generate_edited_image", None, || async {
            let response = self.generate_content(parts).await?;
            first_inline_image(response).ok_or(StudioError::NoImageData)
        })
        .await
    }

    /// Two-image merge: the instruction is synthesized from the
    /// `remove_background` flag, then the subject and scene follow as inline
    /// parts in that order.
    pub async fn generate_merge_image(
        &self,
        subject: &InlineImage,
        scene: &InlineImage,
        style: &str,
        remove_background: bool,
    ) -> Result<String> {
        if subject.base64.is_empty() || scene.base64.is_empty() {
            return Err(StudioError::validation(
                "Please upload both a Subject image and a Scene image.",
            ));
        }
        self.ensure_credential()?;

        let prompt = merge_instruction(effective_merge_style(style), remove_background);
        let parts = vec![
            json!({ "text": prompt }),
            inline_part(subject),
            inline_part(scene),
        ];
        log_generation_timing(
            &self.image_model,
            "generate_merge_image",
            Some(json!({ "removeBackground": remove_background })),
            || async {
                let response = self.generate_content(parts).await?;
                first_inline_image(response).ok_or(StudioError::NoImageData)
            },
        )
        .await
    }
}
