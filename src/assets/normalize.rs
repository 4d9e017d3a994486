use std::{io::Cursor, sync::Arc};

use anyhow::Context;
use image::{ImageEncoder as _, codecs::jpeg::JpegEncoder, imageops::FilterType};

use crate::foundation::error::{TicketDocError, TicketDocResult};

/// JPEG quality used for every normalized image.
pub const JPEG_QUALITY: u8 = 85;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Resized, 3-channel, JPEG-encoded image ready for embedding.
pub struct NormalizedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Baseline JPEG bytes (RGB).
    pub jpeg: Arc<Vec<u8>>,
}

/// Aspect-preserving fit of `(w, h)` into `(max_w, max_h)`.
///
/// `scale = min(max_w / w, max_h / h)`, dimensions are floored and clamped to at least one
/// pixel. Upscaling is allowed when the source is smaller than the box.
pub fn fit_dimensions(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (0, 0);
    }
    let scale = (f64::from(max_w) / f64::from(w)).min(f64::from(max_h) / f64::from(h));
    let nw = (f64::from(w) * scale).floor() as u32;
    let nh = (f64::from(h) * scale).floor() as u32;
    (nw.clamp(1, max_w.max(1)), nh.clamp(1, max_h.max(1)))
}

/// Decode `bytes`, resize into the `max_w` x `max_h` box keeping aspect ratio, convert to RGB
/// and re-encode as JPEG at [`JPEG_QUALITY`].
///
/// Pure: no IO. Corrupt input is an error here; generation callers turn it into a placeholder.
pub fn normalize_image(bytes: &[u8], max_w: u32, max_h: u32) -> TicketDocResult<NormalizedImage> {
    if max_w == 0 || max_h == 0 {
        return Err(TicketDocError::validation(
            "normalize bounding box must be non-empty",
        ));
    }
    let img = image::load_from_memory(bytes).context("decode image from memory")?;
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(TicketDocError::validation("image has zero dimensions"));
    }

    let (nw, nh) = fit_dimensions(w, h, max_w, max_h);
    let resized = if (nw, nh) == (w, h) {
        img
    } else {
        img.resize_exact(nw, nh, FilterType::Lanczos3)
    };
    let rgb = resized.to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), JPEG_QUALITY)
        .write_image(rgb.as_raw(), nw, nh, image::ExtendedColorType::Rgb8)
        .context("encode jpeg")?;

    Ok(NormalizedImage {
        width: nw,
        height: nh,
        jpeg: Arc::new(jpeg),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/assets/normalize.rs"]
mod tests;
