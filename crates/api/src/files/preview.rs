//! Image transcoding for previews and channel extraction.
//!
//! Nothing here persists anything: every function re-encodes to an
//! in-memory byte buffer. Formats are constrained to an allow-list;
//! anything else silently downgrades to WebP, as do all alpha-channel
//! requests (JPEG cannot carry alpha).

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};

use weft_core::error::CoreError;
use weft_events::PreviewFormat;

/// Default encode quality when the request does not carry one.
const DEFAULT_QUALITY: u8 = 90;

/// Quality used for preview-event frames.
const PREVIEW_EVENT_QUALITY: u8 = 95;

/// Allow-listed on-the-fly transcode formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedFormat {
    WebP,
    Jpeg,
}

impl RequestedFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestedFormat::WebP => "image/webp",
            RequestedFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Parsed `preview=<format>;<quality>` request parameter.
#[derive(Debug, Clone, Copy)]
pub struct PreviewParams {
    pub format: RequestedFormat,
    pub quality: u8,
}

impl PreviewParams {
    /// Parse the raw parameter. Formats outside the allow-list, and any
    /// request that also extracts an alpha channel, downgrade to WebP.
    pub fn parse(raw: &str, channel: Option<&str>) -> Self {
        let mut parts = raw.split(';');
        let format_str = parts.next().unwrap_or("");
        let wants_alpha = channel.is_some_and(|c| c.contains('a'));

        let format = match format_str {
            "jpeg" if !wants_alpha => RequestedFormat::Jpeg,
            "webp" => RequestedFormat::WebP,
            _ => RequestedFormat::WebP,
        };

        let quality = raw
            .split(';')
            .next_back()
            .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUALITY);

        Self { format, quality }
    }
}

/// Which channels of the source to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSelect {
    Rgba,
    Rgb,
    Alpha,
}

impl ChannelSelect {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("rgb") => ChannelSelect::Rgb,
            Some("a") => ChannelSelect::Alpha,
            _ => ChannelSelect::Rgba,
        }
    }
}

/// Re-encode an image file per the preview parameters.
///
/// Returns the encoded bytes and their content type.
pub fn transcode(
    path: &Path,
    params: PreviewParams,
    channel: Option<&str>,
) -> Result<(Vec<u8>, &'static str), CoreError> {
    let img = open(path)?;
    let force_rgb = params.format == RequestedFormat::Jpeg || channel == Some("rgb");

    let bytes = match params.format {
        RequestedFormat::Jpeg => encode_jpeg(&img, params.quality)?,
        RequestedFormat::WebP => {
            if force_rgb {
                encode_webp(&DynamicImage::ImageRgb8(img.to_rgb8()))?
            } else {
                encode_webp(&img)?
            }
        }
    };
    Ok((bytes, params.format.content_type()))
}

/// Drop the alpha channel and serve as PNG.
pub fn extract_rgb(path: &Path) -> Result<Vec<u8>, CoreError> {
    let img = open(path)?;
    encode_png(&DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Serve the alpha plane as PNG: RGB zeroed, alpha from the source, or a
/// synthesized fully-opaque plane when the source has no alpha channel.
pub fn extract_alpha(path: &Path) -> Result<Vec<u8>, CoreError> {
    let img = open(path)?;
    let (width, height) = (img.width(), img.height());

    let mut out = image::RgbaImage::new(width, height);
    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
            dst.0[3] = src.0[3];
        }
    } else {
        for pixel in out.pixels_mut() {
            pixel.0[3] = u8::MAX;
        }
    }

    encode_png(&DynamicImage::ImageRgba8(out))
}

/// Encode a preview-event image: bound it to `max_size` (preserving
/// aspect ratio), then encode as JPEG or PNG.
pub fn encode_preview_image(
    data: &[u8],
    format: PreviewFormat,
    max_size: Option<u32>,
) -> Result<Vec<u8>, CoreError> {
    let mut img = image::load_from_memory(data)
        .map_err(|e| CoreError::Internal(format!("preview decode failed: {e}")))?;

    if let Some(max) = max_size {
        img = img.thumbnail(max, max);
    }

    match format {
        PreviewFormat::Jpeg => encode_jpeg(&img, PREVIEW_EVENT_QUALITY),
        PreviewFormat::Png => encode_png(&img),
    }
}

// ---- encoding primitives ----

fn open(path: &Path) -> Result<DynamicImage, CoreError> {
    image::open(path)
        .map_err(|e| CoreError::Internal(format!("failed to decode {}: {e}", path.display())))
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    // JPEG carries no alpha.
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| CoreError::Internal(format!("jpeg encode failed: {e}")))?;
    Ok(buf)
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    let encoder = WebPEncoder::new_lossless(&mut buf);
    // The lossless encoder accepts 8-bit RGB/RGBA only.
    let result = if img.color().has_alpha() {
        img.to_rgba8().write_with_encoder(encoder)
    } else {
        img.to_rgb8().write_with_encoder(encoder)
    };
    result.map_err(|e| CoreError::Internal(format!("webp encode failed: {e}")))?;
    Ok(buf)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, CoreError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| CoreError::Internal(format!("png encode failed: {e}")))?;
    Ok(buf.into_inner())
}
