use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use tracing::info;

use crate::editor::adjust::{effective_filter, Adjustments, EffectiveFilter};
use crate::editor::presets::{compose_prompt, ClothingSelection, UNBLUR_PROMPT};
use crate::error::{Result, StudioError};
use crate::export::{self, ExportFormat};
use crate::genai::{GeminiClient, InlineImage};
use crate::media::IngestedImage;

/// Preview crop choice. Display-only: export always renders the natural,
/// uncropped dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    Original,
    ThreeByTwo,
    #[default]
    TwoByThree,
    Square,
}

impl AspectRatio {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "original" => Some(AspectRatio::Original),
            "3x2" => Some(AspectRatio::ThreeByTwo),
            "2x3" => Some(AspectRatio::TwoByThree),
            "1x1" => Some(AspectRatio::Square),
            _ => None,
        }
    }
}

/// The editor's only shared mutable state: current upload, selections,
/// adjustments, last generation result and the user-facing message pair.
/// Owned by one session and mutated only from its handlers; generation
/// futures borrow it exclusively for their duration.
pub struct EditorSession {
    upload_seq: u64,
    upload: Option<IngestedImage>,
    background_id: String,
    clothing: ClothingSelection,
    prompt_text: String,
    adjustments: Adjustments,
    aspect_ratio: AspectRatio,
    generated_base64: Option<String>,
    error_message: Option<String>,
    success_message: Option<String>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl EditorSession {
    pub fn new() -> Self {
        let background_id = "white".to_string();
        let clothing = ClothingSelection::None;
        let prompt_text = compose_prompt(&background_id, &clothing);
        EditorSession {
            upload_seq: 0,
            upload: None,
            background_id,
            clothing,
            prompt_text,
            adjustments: Adjustments::default(),
            aspect_ratio: AspectRatio::default(),
            generated_base64: None,
            error_message: None,
            success_message: None,
        }
    }

    /// Stamps a new upload attempt. The returned ticket must accompany the
    /// finished ingest; a ticket from a superseded attempt is refused, so
    /// overlapping ingests can never interleave stale data into the session.
    pub fn begin_upload(&mut self) -> u64 {
        self.upload_seq += 1;
        self.upload_seq
    }

    pub fn apply_upload(&mut self, ticket: u64, image: IngestedImage) -> bool {
        if ticket != self.upload_seq {
            info!(
                "Discarding superseded upload {} (current ticket {})",
                image.file_name, self.upload_seq
            );
            return false;
        }
        self.adjustments.reset();
        self.generated_base64 = None;
        self.error_message = None;
        self.success_message = None;
        // Replacing the record drops the previous one, releasing its
        // preview asset.
        self.upload = Some(image);
        true
    }

    pub fn upload(&self) -> Option<&IngestedImage> {
        self.upload.as_ref()
    }

    pub fn select_background(&mut self, id: &str) {
        self.background_id = id.to_string();
        self.recompose_prompt();
    }

    pub fn select_uniform(&mut self, id: &str) {
        self.clothing = ClothingSelection::uniform(id);
        self.recompose_prompt();
    }

    pub fn select_state_uniform(&mut self, id: &str) {
        self.clothing = ClothingSelection::state_uniform(id);
        self.recompose_prompt();
    }

    /// Any selection change recomputes the prompt wholesale; manual edits
    /// do not survive it (last selection wins).
    fn recompose_prompt(&mut self) {
        self.prompt_text = compose_prompt(&self.background_id, &self.clothing);
    }

    pub fn set_prompt_text(&mut self, text: impl Into<String>) {
        self.prompt_text = text.into();
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn background_id(&self) -> &str {
        &self.background_id
    }

    pub fn uniform_id(&self) -> &str {
        self.clothing.uniform_id()
    }

    pub fn state_uniform_id(&self) -> &str {
        self.clothing.state_uniform_id()
    }

    pub fn adjustments(&self) -> &Adjustments {
        &self.adjustments
    }

    pub fn apply_auto_adjust(&mut self) {
        self.adjustments.apply_auto();
    }

    pub fn reset_adjustments(&mut self) {
        self.adjustments.reset();
    }

    pub fn set_adjustment(&mut self, knob: &str, value: f32) -> Result<()> {
        let adj = &mut self.adjustments;
        match knob {
            "brightness" => adj.brightness = value,
            "contrast" => adj.contrast = value,
            "exposure" => adj.exposure = value,
            "highlights" => adj.highlights = value,
            "shadows" => adj.shadows = value,
            "whites" => adj.whites = value,
            "blacks" => adj.blacks = value,
            "texture" => adj.texture = value,
            "clarity" => adj.clarity = value,
            "dehaze" => adj.dehaze = value,
            other => {
                return Err(StudioError::validation(format!(
                    "Unknown adjustment '{other}'."
                )))
            }
        }
        Ok(())
    }

    /// What the preview surface should apply right now.
    pub fn effective_filter(&self) -> EffectiveFilter {
        effective_filter(&self.adjustments)
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        self.aspect_ratio = ratio;
    }

    pub fn generated_image_base64(&self) -> Option<&str> {
        self.generated_base64.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn success_message(&self) -> Option<&str> {
        self.success_message.as_deref()
    }

    /// Runs one edit generation against the current upload. Both messages
    /// are cleared up front and exactly one is set afterwards. A success
    /// resets the adjustments so the preview filter is not stacked on top
    /// of the freshly generated image.
    async fn run_generation(&mut self, client: &GeminiClient, prompt: String, success: &str) {
        self.error_message = None;
        self.success_message = None;

        let Some(upload) = self.upload.as_ref() else {
            self.error_message = Some("Please upload an image first.".to_string());
            return;
        };
        let image = InlineImage::from_ingested(upload);

        match client.generate_edited_image(&image, &prompt).await {
            Ok(base64_png) => {
                self.generated_base64 = Some(base64_png);
                self.success_message = Some(success.to_string());
                self.adjustments.reset();
            }
            Err(err) => {
                self.error_message = Some(err.to_string());
            }
        }
    }

    pub async fn generate(&mut self, client: &GeminiClient) {
        if self.prompt_text.trim().is_empty() {
            self.error_message = Some("Please verify the prompt is not empty.".to_string());
            self.success_message = None;
            return;
        }
        let prompt = self.prompt_text.clone();
        self.run_generation(client, prompt, "Image generated successfully!")
            .await;
    }

    pub async fn unblur(&mut self, client: &GeminiClient) {
        self.run_generation(
            client,
            UNBLUR_PROMPT.to_string(),
            "Image successfully unblurred and enhanced!",
        )
        .await;
    }

    /// Full-resolution save of the last generated image with the current
    /// adjustments baked in.
    pub fn export(&self, format: ExportFormat, out_dir: &Path) -> Result<PathBuf> {
        let base64_png = self
            .generated_base64
            .as_deref()
            .ok_or_else(|| StudioError::validation("Generate an image before saving."))?;
        let bytes = general_purpose::STANDARD.decode(base64_png).map_err(|err| {
            StudioError::Upstream(format!("Generated image payload was not valid base64: {err}"))
        })?;
        export::export_image(&bytes, &self.adjustments, format, out_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::media::ingest;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn test_client() -> GeminiClient {
        let mut config = Config::from_env();
        config.gemini_api_key = String::new();
        GeminiClient::new(&config)
    }

    async fn ingest_test_png(tag: &str) -> IngestedImage {
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        let path = std::env::temp_dir().join(format!(
            "younan-session-{}-{tag}.png",
            std::process::id()
        ));
        std::fs::write(&path, buffer.into_inner()).unwrap();
        let ingested = ingest(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();
        ingested
    }

    #[test]
    fn selections_stay_mutually_exclusive_and_recompose_the_prompt() {
        let mut session = EditorSession::new();
        session.select_uniform("men");
        assert_eq!(session.uniform_id(), "men");
        assert_eq!(session.state_uniform_id(), "none");

        session.select_state_uniform("police");
        assert_eq!(session.uniform_id(), "none");
        assert_eq!(session.state_uniform_id(), "police");
        assert!(session.prompt_text().contains("Cambodian National Police"));

        session.select_uniform("women");
        assert_eq!(session.state_uniform_id(), "none");
        assert!(session.prompt_text().contains("office uniform jacket for a woman"));
    }

    #[test]
    fn selection_changes_overwrite_manual_prompt_edits() {
        let mut session = EditorSession::new();
        session.set_prompt_text("my own carefully tuned prompt");
        session.select_background("blue");
        assert!(session.prompt_text().starts_with("Remove background and replace with specifically sky-blue"));
    }

    #[tokio::test]
    async fn superseded_uploads_are_discarded() {
        let mut session = EditorSession::new();
        let first_ticket = session.begin_upload();
        let second_ticket = session.begin_upload();

        let stale = ingest_test_png("stale").await;
        assert!(!session.apply_upload(first_ticket, stale));
        assert!(session.upload().is_none());

        let fresh = ingest_test_png("fresh").await;
        assert!(session.apply_upload(second_ticket, fresh));
        assert!(session.upload().is_some());
    }

    #[tokio::test]
    async fn a_new_upload_resets_adjustments_and_messages() {
        let mut session = EditorSession::new();
        session.apply_auto_adjust();
        session.set_prompt_text("");
        session.generate(&test_client()).await;
        assert!(session.error_message().is_some());

        let ticket = session.begin_upload();
        let image = ingest_test_png("reset").await;
        assert!(session.apply_upload(ticket, image));
        assert_eq!(session.adjustments(), &Adjustments::default());
        assert!(session.error_message().is_none());
        assert!(session.success_message().is_none());
    }

    #[tokio::test]
    async fn generating_without_an_upload_reports_a_validation_message() {
        let mut session = EditorSession::new();
        session.generate(&test_client()).await;
        assert_eq!(session.error_message(), Some("Please upload an image first."));
        assert!(session.success_message().is_none());
    }

    #[tokio::test]
    async fn an_empty_prompt_never_reaches_the_client() {
        let mut session = EditorSession::new();
        let ticket = session.begin_upload();
        let image = ingest_test_png("empty-prompt").await;
        session.apply_upload(ticket, image);
        session.set_prompt_text("   ");
        session.generate(&test_client()).await;
        assert_eq!(
            session.error_message(),
            Some("Please verify the prompt is not empty.")
        );
    }

    #[test]
    fn export_before_generation_is_refused() {
        let session = EditorSession::new();
        let err = session
            .export(ExportFormat::Png, std::env::temp_dir().as_path())
            .unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
    }

    #[test]
    fn aspect_ratio_parses_the_offered_choices() {
        assert_eq!(AspectRatio::parse("original"), Some(AspectRatio::Original));
        assert_eq!(AspectRatio::parse("3x2"), Some(AspectRatio::ThreeByTwo));
        assert_eq!(AspectRatio::parse("2x3"), Some(AspectRatio::TwoByThree));
        assert_eq!(AspectRatio::parse("1x1"), Some(AspectRatio::Square));
        assert_eq!(AspectRatio::parse("16x9"), None);
    }
}
