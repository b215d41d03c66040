//! Production image compression.
//!
//! PNG is re-compressed losslessly with oxipng, JPEG is re-encoded, SVG has
//! comments and inter-tag whitespace stripped. The original bytes are kept
//! whenever compression does not make the file smaller.

use super::{Transform, TransformError};
use crate::build::{BuildContext, SourceFile};
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use regex::Regex;
use std::sync::LazyLock;

/// Quality used when re-encoding JPEG images.
pub const JPEG_QUALITY: u8 = 85;

/// oxipng optimisation preset.
const PNG_PRESET: u8 = 2;

fn compress_png(data: &[u8]) -> Result<Vec<u8>, TransformError> {
    oxipng::optimize_from_memory(data, &oxipng::Options::from_preset(PNG_PRESET))
        .map_err(|e| TransformError::Image(e.to_string()))
}

fn compress_jpeg(data: &[u8]) -> Result<Vec<u8>, TransformError> {
    let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map_err(|e| TransformError::Image(e.to_string()))?;
    let rgb = decoded.to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| TransformError::Image(e.to_string()))?;
    Ok(out)
}

static SVG_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->").expect("BUG: invalid SVG_COMMENT_RE regex literal")
});

static TAG_GAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("BUG: invalid TAG_GAP_RE regex literal"));

fn compress_svg(data: &[u8]) -> Result<Vec<u8>, TransformError> {
    let text = std::str::from_utf8(data)?;
    let stripped = SVG_COMMENT_RE.replace_all(text, "");
    let stripped = TAG_GAP_RE.replace_all(&stripped, "><");
    Ok(stripped.trim().as_bytes().to_vec())
}

/// Compress image bytes by extension, keeping the smaller of the result and
/// the input. Unknown formats (including GIF) pass through.
pub fn compress_image(extension: &str, data: &[u8]) -> Result<Vec<u8>, TransformError> {
    let compressed = match extension {
        "png" => compress_png(data)?,
        "jpg" | "jpeg" => compress_jpeg(data)?,
        "svg" => compress_svg(data)?,
        _ => return Ok(data.to_vec()),
    };
    if compressed.len() < data.len() {
        Ok(compressed)
    } else {
        Ok(data.to_vec())
    }
}

/// Compression stage for production builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compress;

impl Transform for Compress {
    fn name(&self) -> &'static str {
        "imagemin"
    }

    fn apply(&self, mut file: SourceFile, _ctx: &BuildContext) -> Result<SourceFile, TransformError> {
        let extension = file.extension().unwrap_or_default();
        let before = file.contents.len();
        file.contents = compress_image(&extension, &file.contents)?;
        tracing::debug!(
            file = %file.relative.display(),
            before,
            after = file.contents.len(),
            "compressed"
        );
        Ok(file)
    }
}
