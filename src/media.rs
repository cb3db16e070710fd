use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use base64::{engine::general_purpose, Engine as _};
use tracing::warn;

use crate::error::{Result, StudioError};

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

static PREVIEW_SEQ: AtomicU64 = AtomicU64::new(0);

fn preview_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "img",
    }
}

/// Locally addressable display copy of the uploaded bytes, the stand-in for
/// a browser object URL. Owned by exactly one `IngestedImage`; the backing
/// file is deleted when the owner is dropped or superseded, never leaked.
#[derive(Debug)]
pub struct PreviewAsset {
    path: PathBuf,
}

impl PreviewAsset {
    fn create(bytes: &[u8], mime_type: &str) -> Result<Self> {
        let seq = PREVIEW_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = env::temp_dir().join(format!(
            "younan-preview-{}-{}.{}",
            std::process::id(),
            seq,
            preview_extension(mime_type)
        ));
        fs::write(&path, bytes).map_err(|err| StudioError::io(&path, err))?;
        Ok(PreviewAsset { path })
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PreviewAsset {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove preview file {}: {err}", self.path.display());
            }
        }
    }
}

/// Everything the rest of the pipeline needs from one uploaded file: the
/// preview asset, the wire payload, and the probed natural dimensions.
#[derive(Debug)]
pub struct IngestedImage {
    pub file_name: String,
    pub mime_type: String,
    pub base64_payload: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: String,
    pub preview: PreviewAsset,
}

/// Reads, validates and unpacks one image file. The dimension probe and the
/// base64 encode run as independent blocking tasks; the record is only
/// returned once both have landed, so a request can never be built from a
/// partially encoded payload.
pub async fn ingest(path: &Path) -> Result<IngestedImage> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| StudioError::io(path, err))?;

    let mime_type = match detect_mime_type(&bytes) {
        Some(mime) if mime.starts_with("image/") => mime,
        _ => {
            return Err(StudioError::validation(
                "Please upload a valid image (JPG or PNG).",
            ))
        }
    };

    let preview = PreviewAsset::create(&bytes, &mime_type)?;

    let probe_bytes = bytes.clone();
    let probe = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&probe_bytes).map(|img| (img.width(), img.height()))
    });
    let encode = tokio::task::spawn_blocking(move || general_purpose::STANDARD.encode(&bytes));

    let (dims, base64_payload) = tokio::join!(probe, encode);
    let (width, height) = dims.expect("image probe task panicked")?;
    let base64_payload = base64_payload.expect("base64 encode task panicked");

    Ok(IngestedImage {
        file_name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        mime_type,
        base64_payload,
        width,
        height,
        aspect_ratio: format!("{width} / {height}"),
        preview,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn write_test_png(width: u32, height: u32) -> PathBuf {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        let path = env::temp_dir().join(format!(
            "younan-test-{}-{}x{}.png",
            std::process::id(),
            width,
            height
        ));
        fs::write(&path, buffer.into_inner()).unwrap();
        path
    }

    #[tokio::test]
    async fn ingest_produces_payload_and_aspect_ratio() {
        let path = write_test_png(4, 2);
        let ingested = ingest(&path).await.unwrap();
        assert_eq!(ingested.mime_type, "image/png");
        assert_eq!(ingested.aspect_ratio, "4 / 2");
        assert_eq!(ingested.width, 4);
        assert_eq!(ingested.height, 2);

        let decoded = general_purpose::STANDARD
            .decode(&ingested.base64_payload)
            .unwrap();
        assert_eq!(decoded, fs::read(&path).unwrap());
        assert!(!ingested.base64_payload.contains(','));

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn non_image_files_are_rejected_before_any_work() {
        let path = env::temp_dir().join(format!("younan-test-{}.txt", std::process::id()));
        fs::write(&path, b"not an image at all").unwrap();
        let err = ingest(&path).await.unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn preview_file_is_released_on_drop() {
        let path = write_test_png(1, 1);
        let ingested = ingest(&path).await.unwrap();
        let preview_path = ingested.preview.path().to_path_buf();
        assert!(preview_path.exists());
        drop(ingested);
        assert!(!preview_path.exists());
        fs::remove_file(&path).unwrap();
    }
}
