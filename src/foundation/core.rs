use crate::foundation::error::{TicketDocError, TicketDocResult};

pub use kurbo::{Point, Rect, Size};

/// PostScript points per inch.
pub const PT_PER_INCH: f64 = 72.0;

/// Convert inches to points.
pub const fn inch(v: f64) -> f64 {
    v * PT_PER_INCH
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Opaque 8-bit RGB color.
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const WHITE: Rgb8 = Rgb8::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (leading `#` optional).
    pub fn from_hex(s: &str) -> TicketDocResult<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(TicketDocError::validation(format!(
                "color '{s}' must be #rrggbb"
            )));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| TicketDocError::validation(format!("color '{s}' is not hex")))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Channels as `0.0..=1.0` for PDF color operators.
    pub fn unit(self) -> [f64; 3] {
        [
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Page geometry in points with per-side margins.
pub struct PageSize {
    pub width: f64,
    pub height: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
}

impl PageSize {
    /// US Letter with the ticket layout's margins (0.3in sides, 0.5in top/bottom).
    pub const fn letter() -> Self {
        Self {
            width: inch(8.5),
            height: inch(11.0),
            margin_left: inch(0.3),
            margin_right: inch(0.3),
            margin_top: inch(0.5),
            margin_bottom: inch(0.5),
        }
    }

    pub fn content_width(&self) -> f64 {
        (self.width - self.margin_left - self.margin_right).max(0.0)
    }

    pub fn content_height(&self) -> f64 {
        (self.height - self.margin_top - self.margin_bottom).max(0.0)
    }

    /// Content area in top-left-origin coordinates.
    pub fn content_rect(&self) -> Rect {
        Rect::new(
            self.margin_left,
            self.margin_top,
            self.width - self.margin_right,
            self.height - self.margin_bottom,
        )
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::letter()
    }
}

/// Largest rect with the aspect ratio `w:h` that fits in `bounds`, centered horizontally and
/// anchored to the top.
pub fn fit_rect_top_center(bounds: Rect, w: f64, h: f64) -> Rect {
    if w <= 0.0 || h <= 0.0 || bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return Rect::from_origin_size(bounds.origin(), Size::ZERO);
    }
    let scale = (bounds.width() / w).min(bounds.height() / h);
    let fw = w * scale;
    let fh = h * scale;
    let x0 = bounds.x0 + (bounds.width() - fw) / 2.0;
    Rect::new(x0, bounds.y0, x0 + fw, bounds.y0 + fh)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
