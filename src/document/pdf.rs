//! PDF 1.4 serializer for [`DocumentPlan`]s, built on `lopdf`.
//!
//! Text uses the standard-14 Helvetica family with WinAnsi encoding (no embedded fonts);
//! images are embedded as JPEG (DCT) XObjects. Content streams are left uncompressed.

use lopdf::{
    Dictionary, Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};

use crate::{
    document::{
        fonts::{Font, encode_win_ansi},
        plan::{DocumentPlan, DrawOp},
    },
    foundation::{
        core::{Rect, Rgb8},
        error::{TicketDocError, TicketDocResult},
    },
};

/// Serialize `plan` into a complete PDF file.
pub fn write_pdf(plan: &DocumentPlan) -> TicketDocResult<Vec<u8>> {
    if plan.pages.is_empty() {
        return Err(TicketDocError::document("document has no pages"));
    }
    let page_height = plan.page_size.height;

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for font in Font::ALL {
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_name(),
            "Encoding" => "WinAnsiEncoding"
        });
        fonts.set(font.resource_name(), id);
    }

    let mut xobjects = Dictionary::new();
    for (i, image) in plan.images.iter().enumerate() {
        if image.jpeg.is_empty() || image.width == 0 || image.height == 0 {
            return Err(TicketDocError::document(format!("image {i} is empty")));
        }
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode"
            },
            image.jpeg.to_vec(),
        )
        .with_compression(false);
        xobjects.set(format!("Im{i}"), doc.add_object(stream));
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => fonts,
        "XObject" => xobjects
    });

    let mut kids = Vec::with_capacity(plan.pages.len());
    for page in &plan.pages {
        let mut operations = Vec::with_capacity(page.ops.len() * 4);
        for op in &page.ops {
            render_op(&mut operations, op, page_height, plan.images.len())?;
        }
        let data = Content { operations }
            .encode()
            .map_err(|e| TicketDocError::document(format!("encode page content: {e}")))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), data));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                real(plan.page_size.width),
                real(page_height)
            ]
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| TicketDocError::document(format!("serialize pdf: {e}")))?;
    Ok(out)
}

fn render_op(
    out: &mut Vec<Operation>,
    op: &DrawOp,
    page_height: f64,
    image_count: usize,
) -> TicketDocResult<()> {
    match op {
        DrawOp::FillRect { rect, color } => {
            out.push(color_op("rg", *color));
            out.push(Operation::new("re", rect_operands(rect, page_height)));
            out.push(Operation::new("f", vec![]));
        }
        DrawOp::StrokeRect { rect, color, width } => {
            out.push(Operation::new("q", vec![]));
            out.push(color_op("RG", *color));
            out.push(Operation::new("w", vec![real(*width)]));
            out.push(Operation::new("re", rect_operands(rect, page_height)));
            out.push(Operation::new("S", vec![]));
            out.push(Operation::new("Q", vec![]));
        }
        DrawOp::Line {
            from,
            to,
            color,
            width,
        } => {
            out.push(Operation::new("q", vec![]));
            out.push(color_op("RG", *color));
            out.push(Operation::new("w", vec![real(*width)]));
            out.push(Operation::new(
                "m",
                vec![real(from.x), real(page_height - from.y)],
            ));
            out.push(Operation::new("l", vec![real(to.x), real(page_height - to.y)]));
            out.push(Operation::new("S", vec![]));
            out.push(Operation::new("Q", vec![]));
        }
        DrawOp::Text {
            origin,
            text,
            font,
            size,
            color,
        } => {
            out.push(Operation::new("BT", vec![]));
            out.push(Operation::new(
                "Tf",
                vec![Object::from(font.resource_name()), real(*size)],
            ));
            out.push(color_op("rg", *color));
            out.push(Operation::new(
                "Td",
                vec![real(origin.x), real(page_height - origin.y)],
            ));
            out.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_win_ansi(text))],
            ));
            out.push(Operation::new("ET", vec![]));
        }
        DrawOp::Image { image, rect } => {
            if image.0 as usize >= image_count {
                return Err(TicketDocError::document(format!(
                    "draw op references unknown image {}",
                    image.0
                )));
            }
            out.push(Operation::new("q", vec![]));
            out.push(Operation::new(
                "cm",
                vec![
                    real(rect.width()),
                    Object::Integer(0),
                    Object::Integer(0),
                    real(rect.height()),
                    real(rect.x0),
                    real(page_height - rect.y1),
                ],
            ));
            out.push(Operation::new(
                "Do",
                vec![Object::from(format!("Im{}", image.0).as_str())],
            ));
            out.push(Operation::new("Q", vec![]));
        }
    }
    Ok(())
}

/// `x y w h` of a top-left rect, flipped into bottom-left PDF space.
fn rect_operands(rect: &Rect, page_height: f64) -> Vec<Object> {
    vec![
        real(rect.x0),
        real(page_height - rect.y1),
        real(rect.width()),
        real(rect.height()),
    ]
}

fn color_op(operator: &str, c: Rgb8) -> Operation {
    let [r, g, b] = c.unit();
    Operation::new(
        operator,
        vec![rounded(r, 1000.0), rounded(g, 1000.0), rounded(b, 1000.0)],
    )
}

fn real(v: f64) -> Object {
    rounded(v, 100.0)
}

fn rounded(v: f64, scale: f64) -> Object {
    Object::Real(((v * scale).round() / scale) as f32)
}

#[cfg(test)]
#[path = "../../tests/unit/document/pdf.rs"]
mod tests;
