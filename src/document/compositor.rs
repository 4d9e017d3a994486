use crate::{
    assets::normalize::NormalizedImage,
    config::Branding,
    document::{
        fonts::{Font, text_width, truncate_to_width, wrap_text},
        model::{
            BookingDocumentRequest, POSTER_PLACEHOLDER, QR_PLACEHOLDER, ResolvedAsset,
            TicketRenderBlock, format_event_time, format_order_time, format_price,
        },
        plan::{CellContent, DocumentPlan, DrawOp, Page, RowRecord},
    },
    foundation::{
        core::{PageSize, Point, Rect, Rgb8, fit_rect_top_center, inch},
        error::{TicketDocError, TicketDocResult},
    },
};

/// Pixel box posters are normalized into before embedding.
pub const POSTER_PIXELS: (u32, u32) = (180, 252);
/// Pixel box QR codes are normalized into before embedding.
pub const QR_PIXELS: (u32, u32) = (158, 158);
/// Pixel box the header logo is normalized into before embedding.
pub const LOGO_PIXELS: (u32, u32) = (108, 36);

const BRAND_BLUE: Rgb8 = Rgb8::new(0x27, 0xaa, 0xe2);
const BRAND_BLUE_DARK: Rgb8 = Rgb8::new(0x1e, 0x8b, 0xb8);
const TEXT_DARK: Rgb8 = Rgb8::new(0x33, 0x33, 0x33);
const TEXT_MUTED: Rgb8 = Rgb8::new(0x66, 0x66, 0x66);
const CELL_SHADE: Rgb8 = Rgb8::new(0xf5, 0xf5, 0xf5);
const GRID: Rgb8 = Rgb8::new(0xe0, 0xe0, 0xe0);

const HEADER_HEIGHT: f64 = inch(0.6);
const LOGO_BOX: (f64, f64) = (inch(1.5), inch(0.5));
const FOOTER_HEIGHT: f64 = inch(0.8);
const ROW_HEIGHT: f64 = inch(4.0);
const SEPARATOR_GAP: f64 = inch(0.3);
const BLOCK_GAP: f64 = inch(0.1);
const FOOTER_GAP: f64 = inch(0.2);
const COLUMN_RATIOS: [f64; 3] = [2.8, 3.5, 2.5];
const CELL_PAD_X: f64 = 10.0;
const CELL_PAD_Y: f64 = 15.0;
const POSTER_CAP: (f64, f64) = (inch(2.5), inch(3.5));
const QR_SIDE: f64 = inch(2.2);
const TITLE_MAX_LINES: usize = 3;
const LEADING: f64 = 1.2;
const BASELINE: f64 = 0.8;
const EPS: f64 = 1e-6;

/// Everything the compositor draws for one booking. All assets are already resolved.
#[derive(Clone, Copy, Debug)]
pub struct DocumentInput<'a> {
    pub request: &'a BookingDocumentRequest,
    pub branding: &'a Branding,
    pub logo: Option<&'a NormalizedImage>,
    pub poster: &'a ResolvedAsset,
    /// One block per ticket, in ticket order.
    pub blocks: &'a [TicketRenderBlock],
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Align {
    Left,
    Right,
}

/// Top-down flow over pages; a block that does not fit starts a new page.
struct Flow {
    plan: DocumentPlan,
    y: f64,
}

impl Flow {
    fn new(page_size: PageSize) -> Self {
        Self {
            y: page_size.content_rect().y0,
            plan: DocumentPlan::new(page_size),
        }
    }

    fn area(&self) -> Rect {
        self.plan.page_size.content_rect()
    }

    fn page_index(&self) -> usize {
        self.plan.pages.len() - 1
    }

    fn ops(&mut self) -> &mut Vec<DrawOp> {
        let idx = self.page_index();
        &mut self.plan.pages[idx].ops
    }

    fn ensure(&mut self, height: f64) -> TicketDocResult<()> {
        let area = self.area();
        if height > area.height() + EPS {
            return Err(TicketDocError::document(format!(
                "block of {height:.1}pt exceeds page content height {:.1}pt",
                area.height()
            )));
        }
        if self.y + height > area.y1 + EPS && self.y > area.y0 + EPS {
            self.plan.pages.push(Page::default());
            self.y = area.y0;
        }
        Ok(())
    }

    /// Claim `height` points and return the block's top edge.
    fn reserve(&mut self, height: f64) -> TicketDocResult<f64> {
        self.ensure(height)?;
        let top = self.y;
        self.y += height;
        Ok(top)
    }

    fn space(&mut self, height: f64) {
        self.y += height;
    }
}

fn push_text(
    ops: &mut Vec<DrawOp>,
    x: f64,
    baseline: f64,
    text: &str,
    font: Font,
    size: f64,
    color: Rgb8,
) {
    if text.is_empty() {
        return;
    }
    ops.push(DrawOp::Text {
        origin: Point::new(x, baseline),
        text: text.to_string(),
        font,
        size,
        color,
    });
}

fn push_centered(
    ops: &mut Vec<DrawOp>,
    span: (f64, f64),
    baseline: f64,
    text: &str,
    font: Font,
    size: f64,
    color: Rgb8,
) {
    let text = truncate_to_width(font, size, text, span.1 - span.0);
    let x = span.0 + (span.1 - span.0 - text_width(font, size, &text)) / 2.0;
    push_text(ops, x, baseline, &text, font, size, color);
}

/// Vertical cursor inside the info cell. Lines that would overflow the cell are dropped.
struct InfoCursor<'o> {
    ops: &'o mut Vec<DrawOp>,
    x0: f64,
    x1: f64,
    y: f64,
    bottom: f64,
}

impl InfoCursor<'_> {
    fn fits(&self, line_height: f64) -> bool {
        self.y + line_height <= self.bottom + EPS
    }

    fn label(&mut self, text: &str) {
        let size = 9.0;
        if !self.fits(size * LEADING) {
            return;
        }
        push_text(
            self.ops,
            self.x0,
            self.y + size * BASELINE,
            text,
            Font::HelveticaBold,
            size,
            TEXT_MUTED,
        );
        self.y += size * LEADING + 2.0;
    }

    fn title(&mut self, text: &str) {
        let size = 18.0;
        let width = self.x1 - self.x0;
        let mut lines = wrap_text(Font::HelveticaBold, size, text, width);
        if lines.len() > TITLE_MAX_LINES {
            let rest = lines.split_off(TITLE_MAX_LINES - 1).join(" ");
            lines.push(truncate_to_width(Font::HelveticaBold, size, &rest, width));
        }
        for line in &lines {
            if !self.fits(size * LEADING) {
                return;
            }
            push_text(
                self.ops,
                self.x0,
                self.y + size * BASELINE,
                line,
                Font::HelveticaBold,
                size,
                TEXT_DARK,
            );
            self.y += size * LEADING;
        }
        self.y += 8.0;
    }

    /// `<b>label</b> value` on one line.
    fn field(&mut self, label: &str, value: &str, align: Align) {
        let size = 11.0;
        if !self.fits(size * LEADING) {
            tracing::debug!(%label, "info cell full; field dropped");
            return;
        }
        let label_w = text_width(Font::HelveticaBold, size, label);
        let gap = text_width(Font::Helvetica, size, " ");
        let value = truncate_to_width(
            Font::Helvetica,
            size,
            value,
            (self.x1 - self.x0 - label_w - gap).max(0.0),
        );
        let value_w = text_width(Font::Helvetica, size, &value);
        let x = match align {
            Align::Left => self.x0,
            Align::Right => self.x1 - label_w - gap - value_w,
        };
        let baseline = self.y + size * BASELINE;
        push_text(self.ops, x, baseline, label, Font::HelveticaBold, size, TEXT_DARK);
        push_text(
            self.ops,
            x + label_w + gap,
            baseline,
            &value,
            Font::Helvetica,
            size,
            TEXT_DARK,
        );
        self.y += size * LEADING + 8.0;
    }
}

/// Stateless layout of the ticket document into a [`DocumentPlan`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentCompositor {
    page_size: PageSize,
}

impl DocumentCompositor {
    pub fn new(page_size: PageSize) -> Self {
        Self { page_size }
    }

    /// Lay out header, disclaimer, one row per block (separated), and footer.
    ///
    /// Unresolved assets become placeholder text in their own cell; only geometry that cannot
    /// fit a page is an error.
    pub fn compose(&self, input: &DocumentInput<'_>) -> TicketDocResult<DocumentPlan> {
        if self.page_size.content_width() <= 2.0 * CELL_PAD_X * COLUMN_RATIOS.len() as f64 {
            return Err(TicketDocError::document("page content area is too narrow"));
        }
        let mut flow = Flow::new(self.page_size);

        self.header(&mut flow, input)?;
        flow.space(BLOCK_GAP);
        self.disclaimer(&mut flow, &input.branding.disclaimer)?;
        flow.space(BLOCK_GAP);

        for (idx, block) in input.blocks.iter().enumerate() {
            if idx > 0 {
                flow.ensure(2.0 * SEPARATOR_GAP + ROW_HEIGHT)?;
                flow.space(SEPARATOR_GAP);
                let area = flow.area();
                let y = flow.y;
                flow.ops().push(DrawOp::Line {
                    from: Point::new(area.x0, y),
                    to: Point::new(area.x1, y),
                    color: TEXT_MUTED,
                    width: 0.5,
                });
                flow.space(SEPARATOR_GAP);
            }
            self.row(&mut flow, input, block)?;
        }

        flow.space(FOOTER_GAP);
        self.footer(&mut flow, &input.branding.footer_lines)?;

        tracing::debug!(
            pages = flow.plan.pages.len(),
            rows = flow.plan.rows.len(),
            images = flow.plan.images.len(),
            "composed ticket document"
        );
        Ok(flow.plan)
    }

    fn header(&self, flow: &mut Flow, input: &DocumentInput<'_>) -> TicketDocResult<()> {
        let top = flow.reserve(HEADER_HEIGHT)?;
        let area = flow.area();
        let band = Rect::new(area.x0, top, area.x1, top + HEADER_HEIGHT);
        flow.ops().push(DrawOp::FillRect {
            rect: band,
            color: BRAND_BLUE,
        });

        let center = band.center();
        match input.logo {
            Some(logo) => {
                let bounds = Rect::new(
                    center.x - LOGO_BOX.0 / 2.0,
                    center.y - LOGO_BOX.1 / 2.0,
                    center.x + LOGO_BOX.0 / 2.0,
                    center.y + LOGO_BOX.1 / 2.0,
                );
                let fitted =
                    fit_rect_top_center(bounds, f64::from(logo.width), f64::from(logo.height));
                let rect = fitted + kurbo::Vec2::new(0.0, (bounds.height() - fitted.height()) / 2.0);
                let image = flow.plan.add_image(logo);
                flow.ops().push(DrawOp::Image { image, rect });
            }
            None => {
                let size = 10.0;
                push_centered(
                    flow.ops(),
                    (band.x0, band.x1),
                    center.y + size * 0.35,
                    &input.branding.title,
                    Font::HelveticaBold,
                    size,
                    Rgb8::WHITE,
                );
            }
        }
        Ok(())
    }

    fn disclaimer(&self, flow: &mut Flow, text: &str) -> TicketDocResult<()> {
        let size = 9.0;
        let width = flow.area().width();
        let lines = wrap_text(Font::Helvetica, size, text, width);
        for line in lines {
            let top = flow.reserve(size * LEADING)?;
            let area = flow.area();
            push_centered(
                flow.ops(),
                (area.x0, area.x1),
                top + size * BASELINE,
                &line,
                Font::Helvetica,
                size,
                TEXT_MUTED,
            );
        }
        Ok(())
    }

    fn columns(&self, area: Rect, top: f64) -> [Rect; 3] {
        let total: f64 = COLUMN_RATIOS.iter().sum();
        let mut x = area.x0;
        COLUMN_RATIOS.map(|r| {
            let w = area.width() * r / total;
            let cell = Rect::new(x, top, x + w, top + ROW_HEIGHT);
            x += w;
            cell
        })
    }

    fn row(
        &self,
        flow: &mut Flow,
        input: &DocumentInput<'_>,
        block: &TicketRenderBlock,
    ) -> TicketDocResult<()> {
        let top = flow.reserve(ROW_HEIGHT)?;
        let area = flow.area();
        let [poster_cell, info_cell, qr_cell] = self.columns(area, top);
        let row_rect = Rect::new(area.x0, top, area.x1, top + ROW_HEIGHT);

        let ops = flow.ops();
        for (cell, color) in [
            (poster_cell, CELL_SHADE),
            (info_cell, Rgb8::WHITE),
            (qr_cell, CELL_SHADE),
        ] {
            ops.push(DrawOp::FillRect { rect: cell, color });
        }
        ops.push(DrawOp::StrokeRect {
            rect: row_rect,
            color: GRID,
            width: 1.0,
        });
        for x in [info_cell.x0, qr_cell.x0] {
            ops.push(DrawOp::Line {
                from: Point::new(x, top),
                to: Point::new(x, top + ROW_HEIGHT),
                color: GRID,
                width: 0.5,
            });
        }

        let poster = self.poster_cell(flow, input.poster, inset(poster_cell));
        self.info_cell(flow.ops(), input, block, inset(info_cell));
        let qr = self.qr_cell(flow, block, inset(qr_cell));

        let page = flow.page_index();
        flow.plan.rows.push(RowRecord {
            ticket_number: block.ticket_number.clone(),
            page,
            rect: row_rect,
            poster,
            qr,
        });
        Ok(())
    }

    fn poster_cell(&self, flow: &mut Flow, poster: &ResolvedAsset, inner: Rect) -> CellContent {
        match poster {
            ResolvedAsset::Image(img) => {
                let cap_w = inner.width().min(POSTER_CAP.0);
                let cap_h = inner.height().min(POSTER_CAP.1);
                let cx = inner.center().x;
                let bounds = Rect::new(cx - cap_w / 2.0, inner.y0, cx + cap_w / 2.0, inner.y0 + cap_h);
                let rect = fit_rect_top_center(bounds, f64::from(img.width), f64::from(img.height));
                let image = flow.plan.add_image(img);
                flow.ops().push(DrawOp::Image { image, rect });
                CellContent::Image { image, rect }
            }
            ResolvedAsset::Unresolved { .. } => {
                let size = 9.0;
                push_centered(
                    flow.ops(),
                    (inner.x0, inner.x1),
                    inner.center().y,
                    POSTER_PLACEHOLDER,
                    Font::HelveticaOblique,
                    size,
                    TEXT_MUTED,
                );
                CellContent::Placeholder(POSTER_PLACEHOLDER.to_string())
            }
        }
    }

    fn info_cell(
        &self,
        ops: &mut Vec<DrawOp>,
        input: &DocumentInput<'_>,
        block: &TicketRenderBlock,
        inner: Rect,
    ) {
        let req = input.request;
        let event = &req.event;
        let mut cur = InfoCursor {
            ops,
            x0: inner.x0,
            x1: inner.x1,
            y: inner.y0,
            bottom: inner.y1,
        };

        cur.label("Event Ticket For:");
        cur.title(&event.title);
        cur.field("Start:", &format_event_time(&event.start), Align::Left);
        if let Some(end) = &event.end {
            cur.field("End:", &format_event_time(end), Align::Left);
        }
        cur.field("Venue:", event.venue_label(), Align::Left);
        cur.field("Ticket Order Ref:", &req.booking_number, Align::Right);
        cur.field("Ticket Type:", &block.ticket_type, Align::Left);
        cur.field(
            "Price:",
            &format_price(req.total_amount, &input.branding.currency),
            Align::Right,
        );
        cur.field("Purchased by:", &req.purchaser_name, Align::Left);
        let ordered = req.ordered_at.as_ref().map(format_order_time).unwrap_or_default();
        cur.field("Order Date:", &ordered, Align::Right);
    }

    fn qr_cell(&self, flow: &mut Flow, block: &TicketRenderBlock, inner: Rect) -> CellContent {
        let span = (inner.x0, inner.x1);
        let number = format!("#{}", block.ticket_number);
        let label_size = 9.0;
        let number_size = 20.0;

        let (content, label, mut y) = match &block.qr {
            ResolvedAsset::Image(img) => {
                let side = QR_SIDE.min(inner.width());
                let cx = inner.center().x;
                let bounds = Rect::new(cx - side / 2.0, inner.y0, cx + side / 2.0, inner.y0 + side);
                let rect = fit_rect_top_center(bounds, f64::from(img.width), f64::from(img.height));
                let image = flow.plan.add_image(img);
                flow.ops().push(DrawOp::Image { image, rect });
                (
                    CellContent::Image { image, rect },
                    ("Ticket No:", Font::HelveticaBold),
                    rect.y1 + 6.0,
                )
            }
            ResolvedAsset::Unresolved { .. } => (
                CellContent::Placeholder(QR_PLACEHOLDER.to_string()),
                (QR_PLACEHOLDER, Font::Helvetica),
                inner.y0,
            ),
        };

        let ops = flow.ops();
        push_centered(
            ops,
            span,
            y + label_size * BASELINE,
            label.0,
            label.1,
            label_size,
            TEXT_MUTED,
        );
        y += label_size * LEADING + 2.0;
        push_centered(
            ops,
            span,
            y + number_size * BASELINE,
            &number,
            Font::HelveticaBold,
            number_size,
            BRAND_BLUE,
        );
        content
    }

    fn footer(&self, flow: &mut Flow, lines: &[String]) -> TicketDocResult<()> {
        let top = flow.reserve(FOOTER_HEIGHT)?;
        let area = flow.area();
        let band = Rect::new(area.x0, top, area.x1, top + FOOTER_HEIGHT);
        let ops = flow.ops();
        ops.push(DrawOp::FillRect {
            rect: band,
            color: BRAND_BLUE_DARK,
        });

        let size = 8.0;
        let step = size * LEADING + 2.0;
        let mut y = band.center().y - step * lines.len() as f64 / 2.0;
        for line in lines {
            push_centered(
                ops,
                (band.x0, band.x1),
                y + size * BASELINE,
                line,
                Font::Helvetica,
                size,
                Rgb8::WHITE,
            );
            y += step;
        }
        Ok(())
    }
}

fn inset(cell: Rect) -> Rect {
    Rect::new(
        cell.x0 + CELL_PAD_X,
        cell.y0 + CELL_PAD_Y,
        cell.x1 - CELL_PAD_X,
        cell.y1 - CELL_PAD_Y,
    )
}

#[cfg(test)]
#[path = "../../tests/unit/document/compositor.rs"]
mod tests;
