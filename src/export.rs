use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage, RgbaImage};
use tracing::info;

use crate::editor::adjust::{effective_filter, Adjustments, EffectiveFilter};
use crate::error::{Result, StudioError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Jpg,
    Png,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ExportFormat::Jpg),
            "png" => Some(ExportFormat::Png),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Jpg => "jpg",
            ExportFormat::Png => "png",
        }
    }
}

/// Applies the two-channel transform with CSS-filter semantics: brightness
/// scales each channel, contrast pivots around mid-gray, in that order.
/// Negative percentages floor to zero here; this is the rendering layer
/// the adjustment engine leaves clamping to. Alpha is untouched.
pub(crate) fn apply_filter(img: &mut RgbaImage, filter: &EffectiveFilter) {
    let brightness = (filter.brightness_pct / 100.0).max(0.0);
    let contrast = (filter.contrast_pct / 100.0).max(0.0);
    for pixel in img.pixels_mut() {
        for channel in 0..3 {
            let mut value = f32::from(pixel[channel]) * brightness;
            value = (value - 128.0) * contrast + 128.0;
            pixel[channel] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// JPEG carries no alpha; transparency is flattened onto an opaque white
/// backing rather than defaulting to black.
fn flatten_onto_white(img: &RgbaImage) -> RgbImage {
    let mut flattened = RgbImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let alpha = f32::from(pixel[3]) / 255.0;
        let mut out = image::Rgb([0u8; 3]);
        for channel in 0..3 {
            let value = f32::from(pixel[channel]) * alpha + 255.0 * (1.0 - alpha);
            out[channel] = value.round().clamp(0.0, 255.0) as u8;
        }
        flattened.put_pixel(x, y, out);
    }
    flattened
}

/// Re-applies the adjustment transform at the image's natural resolution
/// (never the cropped preview) and encodes the result. JPEG flattens onto
/// white at maximum quality; PNG keeps per-pixel alpha losslessly.
pub fn composite_image(
    image_bytes: &[u8],
    adjustments: &Adjustments,
    format: ExportFormat,
) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(image_bytes)?;
    let mut rgba = decoded.to_rgba8();
    apply_filter(&mut rgba, &effective_filter(adjustments));

    let mut buffer = Cursor::new(Vec::new());
    match format {
        ExportFormat::Png => {
            DynamicImage::ImageRgba8(rgba).write_to(&mut buffer, image::ImageFormat::Png)?;
        }
        ExportFormat::Jpg => {
            let flattened = flatten_onto_white(&rgba);
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, 100);
            encoder.encode_image(&flattened)?;
        }
    }
    Ok(buffer.into_inner())
}

pub(crate) fn timestamp_token(now: DateTime<Local>) -> String {
    now.format("%Y%m%d-%H%M%S").to_string()
}

fn write_output(out_dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(out_dir).map_err(|err| StudioError::io(out_dir, err))?;
    let path = out_dir.join(file_name);
    fs::write(&path, bytes).map_err(|err| StudioError::io(&path, err))?;
    info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

/// Editor save: full-resolution composite of the generated image with the
/// current adjustments baked in.
pub fn export_image(
    image_bytes: &[u8],
    adjustments: &Adjustments,
    format: ExportFormat,
    out_dir: &Path,
) -> Result<PathBuf> {
    let bytes = composite_image(image_bytes, adjustments, format)?;
    let file_name = format!(
        "YouNan-{}-Full.{}",
        timestamp_token(Local::now()),
        format.extension()
    );
    write_output(out_dir, &file_name, &bytes)
}

/// Merge-studio download: no adjustment pass, just the format conversion.
pub fn export_merge_image(
    image_bytes: &[u8],
    format: ExportFormat,
    out_dir: &Path,
) -> Result<PathBuf> {
    let bytes = composite_image(image_bytes, &Adjustments::default(), format)?;
    let file_name = format!(
        "YouNan-{}.{}",
        timestamp_token(Local::now()),
        format.extension()
    );
    write_output(out_dir, &file_name, &bytes)
}

pub fn save_video(video_bytes: &[u8], out_dir: &Path) -> Result<PathBuf> {
    let file_name = format!("YouNan-Video-{}.mp4", timestamp_token(Local::now()));
    write_output(out_dir, &file_name, video_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;

    fn png_bytes(img: RgbaImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn brightness_scales_before_contrast_pivots() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([100, 100, 100, 255]));
        apply_filter(
            &mut img,
            &EffectiveFilter {
                brightness_pct: 150.0,
                contrast_pct: 100.0,
            },
        );
        assert_eq!(img.get_pixel(0, 0)[0], 150);

        let mut img = RgbaImage::from_pixel(1, 1, Rgba([100, 100, 100, 255]));
        apply_filter(
            &mut img,
            &EffectiveFilter {
                brightness_pct: 100.0,
                contrast_pct: 200.0,
            },
        );
        assert_eq!(img.get_pixel(0, 0)[0], 72);
    }

    #[test]
    fn negative_brightness_renders_as_black() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([200, 200, 200, 64]));
        apply_filter(
            &mut img,
            &EffectiveFilter {
                brightness_pct: -40.0,
                contrast_pct: 100.0,
            },
        );
        let pixel = img.get_pixel(0, 0);
        assert_eq!([pixel[0], pixel[1], pixel[2]], [0, 0, 0]);
        assert_eq!(pixel[3], 64);
    }

    #[test]
    fn jpg_export_flattens_transparency_onto_white_at_full_size() {
        let mut img = RgbaImage::from_pixel(3, 5, Rgba([0, 0, 0, 0]));
        img.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        let bytes = composite_image(
            &png_bytes(img),
            &Adjustments::default(),
            ExportFormat::Jpg,
        )
        .unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 5));
        let rgb = decoded.to_rgb8();
        // Fully transparent source pixels come out white, not black.
        let corner = rgb.get_pixel(2, 4);
        assert!(corner[0] >= 240 && corner[1] >= 240 && corner[2] >= 240);
    }

    #[test]
    fn png_export_preserves_alpha_exactly() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([120, 40, 200, 255]));
        img.put_pixel(1, 1, Rgba([120, 40, 200, 37]));
        let original = img.clone();

        let bytes = composite_image(
            &png_bytes(img),
            &Adjustments::default(),
            ExportFormat::Png,
        )
        .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.as_raw(), original.as_raw());
    }

    #[test]
    fn adjustments_change_the_exported_pixels() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([100, 100, 100, 255]));
        let brightened = Adjustments {
            exposure: 50.0,
            ..Adjustments::default()
        };
        let bytes = composite_image(&png_bytes(img), &brightened, ExportFormat::Png).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0)[0], 150);
    }

    #[test]
    fn timestamp_token_is_sortable_and_collision_resistant() {
        let moment = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(timestamp_token(moment), "20240307-090502");
    }

    #[test]
    fn format_parsing_accepts_common_spellings() {
        assert_eq!(ExportFormat::parse("JPEG"), Some(ExportFormat::Jpg));
        assert_eq!(ExportFormat::parse(" png "), Some(ExportFormat::Png));
        assert_eq!(ExportFormat::parse("gif"), None);
    }
}
