use std::sync::Arc;

use crate::{
    assets::normalize::NormalizedImage,
    document::fonts::Font,
    foundation::core::{PageSize, Point, Rect, Rgb8},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Index into [`DocumentPlan::images`].
pub struct ImageId(pub u32);

#[derive(Clone, Debug, PartialEq)]
/// Draw operation in page space (points, top-left origin, y down).
pub enum DrawOp {
    FillRect {
        rect: Rect,
        color: Rgb8,
    },
    StrokeRect {
        rect: Rect,
        color: Rgb8,
        width: f64,
    },
    Line {
        from: Point,
        to: Point,
        color: Rgb8,
        width: f64,
    },
    /// Single line of text; `origin` is the left end of the baseline.
    Text {
        origin: Point,
        text: String,
        font: Font,
        size: f64,
        color: Rgb8,
    },
    /// Image stretched to `rect`; callers size `rect` to the image's aspect ratio.
    Image { image: ImageId, rect: Rect },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

#[derive(Clone, Debug, PartialEq)]
/// What one image cell of a ticket row ended up showing.
pub enum CellContent {
    Image { image: ImageId, rect: Rect },
    Placeholder(String),
}

#[derive(Clone, Debug, PartialEq)]
/// Placement record of one ticket row, in input order.
pub struct RowRecord {
    pub ticket_number: String,
    /// Zero-based page index.
    pub page: usize,
    pub rect: Rect,
    pub poster: CellContent,
    pub qr: CellContent,
}

#[derive(Clone, Debug, PartialEq)]
/// Backend-agnostic document: pages of draw ops plus a shared image table.
///
/// The PDF writer serializes this without making layout decisions of its own.
pub struct DocumentPlan {
    pub page_size: PageSize,
    pub pages: Vec<Page>,
    /// Deduplicated images referenced by [`DrawOp::Image`].
    pub images: Vec<NormalizedImage>,
    pub rows: Vec<RowRecord>,
}

impl DocumentPlan {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            pages: vec![Page::default()],
            images: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Register `image`, reusing the existing id when the same bytes were added before.
    pub fn add_image(&mut self, image: &NormalizedImage) -> ImageId {
        let existing = self.images.iter().position(|known| {
            Arc::ptr_eq(&known.jpeg, &image.jpeg)
                || (known.width == image.width
                    && known.height == image.height
                    && known.jpeg == image.jpeg)
        });
        let idx = existing.unwrap_or_else(|| {
            self.images.push(image.clone());
            self.images.len() - 1
        });
        ImageId(idx as u32)
    }

    pub fn image(&self, id: ImageId) -> Option<&NormalizedImage> {
        self.images.get(id.0 as usize)
    }

    /// Every text run in draw order, across pages.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().flat_map(|p| {
            p.ops.iter().filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/plan.rs"]
mod tests;
