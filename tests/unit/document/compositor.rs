use std::sync::Arc;

use chrono::NaiveDate;

use super::*;
use crate::document::model::{EventSnapshot, TicketRecord};

fn image(w: u32, h: u32, tag: u8) -> NormalizedImage {
    NormalizedImage {
        width: w,
        height: h,
        jpeg: Arc::new(vec![0xff, 0xd8, tag]),
    }
}

fn request(n: usize, amount: f64) -> BookingDocumentRequest {
    let start = NaiveDate::from_ymd_opt(2026, 3, 5)
        .unwrap()
        .and_hms_opt(18, 30, 0)
        .unwrap();
    BookingDocumentRequest {
        booking_number: "BK-0042".to_string(),
        total_amount: amount,
        purchaser_name: "Wanjiku Kamau".to_string(),
        ordered_at: None,
        event: EventSnapshot {
            title: "Nairobi Jazz Night".to_string(),
            start,
            end: None,
            venue: Some("KICC".to_string()),
            poster: None,
        },
        tickets: (1..=n)
            .map(|i| TicketRecord {
                ticket_number: format!("T{i}"),
                ticket_type: None,
                qr: None,
            })
            .collect(),
    }
}

fn blocks(req: &BookingDocumentRequest, qr: impl Fn(usize) -> ResolvedAsset) -> Vec<TicketRenderBlock> {
    req.tickets
        .iter()
        .enumerate()
        .map(|(i, t)| TicketRenderBlock {
            ticket_number: t.ticket_number.clone(),
            ticket_type: t.ticket_type_label().to_string(),
            qr: qr(i),
        })
        .collect()
}

fn compose(
    req: &BookingDocumentRequest,
    logo: Option<&NormalizedImage>,
    poster: &ResolvedAsset,
    blocks: &[TicketRenderBlock],
) -> DocumentPlan {
    let branding = Branding::default();
    DocumentCompositor::default()
        .compose(&DocumentInput {
            request: req,
            branding: &branding,
            logo,
            poster,
            blocks,
        })
        .unwrap()
}

#[test]
fn rows_follow_ticket_order() {
    let req = request(5, 1500.0);
    let qr = image(158, 158, 1);
    let b = blocks(&req, |_| ResolvedAsset::Image(qr.clone()));
    let plan = compose(&req, None, &ResolvedAsset::placeholder("Event Image"), &b);

    let numbers: Vec<_> = plan.rows.iter().map(|r| r.ticket_number.as_str()).collect();
    assert_eq!(numbers, vec!["T1", "T2", "T3", "T4", "T5"]);
    assert!(plan.rows.windows(2).all(|w| w[0].page <= w[1].page));
    assert!(plan.pages.len() >= 3);
    // Same QR bytes everywhere: embedded once.
    assert_eq!(plan.images.len(), 1);
}

#[test]
fn unresolved_qr_keeps_ticket_number_visible() {
    let req = request(2, 0.0);
    let qr = image(158, 158, 1);
    let b = blocks(&req, |i| {
        if i == 0 {
            ResolvedAsset::Image(qr.clone())
        } else {
            ResolvedAsset::placeholder("QR Code")
        }
    });
    let poster = ResolvedAsset::Image(image(180, 252, 2));
    let plan = compose(&req, None, &poster, &b);

    assert_eq!(plan.rows.len(), 2);
    assert!(matches!(plan.rows[0].poster, CellContent::Image { .. }));
    assert!(matches!(plan.rows[0].qr, CellContent::Image { .. }));
    assert_eq!(
        plan.rows[1].qr,
        CellContent::Placeholder("QR Code".to_string())
    );

    let texts: Vec<_> = plan.texts().collect();
    assert!(texts.contains(&"QR Code"));
    assert!(texts.contains(&"#T1"));
    assert!(texts.contains(&"#T2"));
    assert!(texts.contains(&"Ticket No:"));
    assert!(texts.contains(&"Free"));
    assert!(texts.contains(&"NIKO FREE"));
    assert!(texts.contains(&"This ticket must be presented for admittance to the event."));
    assert!(texts.contains(&"For support, contact: support@niko-free.com"));
}

#[test]
fn poster_is_fitted_without_stretching() {
    let req = request(1, 10.0);
    let poster = ResolvedAsset::Image(image(180, 120, 3));
    let b = blocks(&req, |_| ResolvedAsset::placeholder("QR Code"));
    let plan = compose(&req, None, &poster, &b);

    let CellContent::Image { rect, .. } = plan.rows[0].poster else {
        panic!("poster should be an image");
    };
    assert!((rect.width() / rect.height() - 1.5).abs() < 1e-9);
    assert!(rect.width() <= inch(2.5) + 1e-9);
    assert!(rect.height() <= inch(3.5) + 1e-9);
    assert!(plan.rows[0].rect.contains(rect.origin()));
}

#[test]
fn missing_poster_shows_placeholder_text() {
    let req = request(1, 10.0);
    let b = blocks(&req, |_| ResolvedAsset::placeholder("QR Code"));
    let plan = compose(&req, None, &ResolvedAsset::placeholder("Event Image"), &b);
    assert_eq!(
        plan.rows[0].poster,
        CellContent::Placeholder("Event Image".to_string())
    );
    assert!(plan.texts().any(|t| t == "Event Image"));
    assert!(plan.images.is_empty());
}

#[test]
fn info_fields_appear_in_order_with_right_alignment() {
    let req = request(1, 2500.5);
    let b = blocks(&req, |_| ResolvedAsset::placeholder("QR Code"));
    let plan = compose(&req, None, &ResolvedAsset::placeholder("Event Image"), &b);

    let texts: Vec<_> = plan.texts().collect();
    let pos = |s: &str| texts.iter().position(|t| *t == s).unwrap();
    assert!(pos("Event Ticket For:") < pos("Nairobi Jazz Night"));
    assert!(pos("Start:") < pos("Venue:"));
    assert!(pos("Venue:") < pos("Ticket Order Ref:"));
    assert!(pos("Ticket Order Ref:") < pos("Ticket Type:"));
    assert!(pos("Ticket Type:") < pos("Price:"));
    assert!(pos("Price:") < pos("Purchased by:"));
    assert!(pos("Purchased by:") < pos("Order Date:"));
    assert!(texts.contains(&"March 05, 2026 at 18:30"));
    assert!(texts.contains(&"2,500.50 KSh"));
    assert!(texts.contains(&"General Admission"));
    assert!(!texts.contains(&"End:"));

    // The booking reference value ends flush with the info cell's right padding.
    let row = plan.rows[0].rect;
    let total: f64 = 2.8 + 3.5 + 2.5;
    let info_right = row.x0 + row.width() * (2.8 + 3.5) / total - 10.0;
    let end = plan.pages[0]
        .ops
        .iter()
        .find_map(|op| match op {
            DrawOp::Text {
                origin,
                text,
                font,
                size,
                ..
            } if text == "BK-0042" => Some(origin.x + text_width(*font, *size, text)),
            _ => None,
        })
        .unwrap();
    assert!((end - info_right).abs() < 1e-6, "{end} vs {info_right}");
}

#[test]
fn zero_tickets_still_produce_header_and_footer() {
    let req = request(0, 0.0);
    let plan = compose(&req, None, &ResolvedAsset::placeholder("Event Image"), &[]);
    assert!(plan.rows.is_empty());
    assert_eq!(plan.pages.len(), 1);
    let texts: Vec<_> = plan.texts().collect();
    assert!(texts.contains(&"NIKO FREE"));
    assert!(texts.contains(&"Thank you for using Niko Free!"));
}

#[test]
fn logo_replaces_title_text() {
    let req = request(1, 0.0);
    let logo = image(108, 36, 9);
    let b = blocks(&req, |_| ResolvedAsset::placeholder("QR Code"));
    let plan = compose(&req, Some(&logo), &ResolvedAsset::placeholder("Event Image"), &b);
    assert!(!plan.texts().any(|t| t == "NIKO FREE"));
    let logo_rect = plan.pages[0]
        .ops
        .iter()
        .find_map(|op| match op {
            DrawOp::Image { rect, .. } => Some(*rect),
            _ => None,
        })
        .unwrap();
    assert!((logo_rect.width() - inch(1.5)).abs() < 1e-9);
    assert!((logo_rect.height() - inch(0.5)).abs() < 1e-9);
}

#[test]
fn pages_too_small_for_a_row_are_rejected() {
    let req = request(1, 0.0);
    let b = blocks(&req, |_| ResolvedAsset::placeholder("QR Code"));
    let branding = Branding::default();
    let small = PageSize {
        height: inch(4.0),
        ..PageSize::letter()
    };
    let err = DocumentCompositor::new(small)
        .compose(&DocumentInput {
            request: &req,
            branding: &branding,
            logo: None,
            poster: &ResolvedAsset::placeholder("Event Image"),
            blocks: &b,
        })
        .unwrap_err();
    assert!(matches!(err, TicketDocError::DocumentBuild(_)), "{err}");
}
