use chrono::NaiveDate;

use super::*;

fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(hh, mm, 0)
        .unwrap()
}

fn request(numbers: &[&str]) -> BookingDocumentRequest {
    BookingDocumentRequest {
        booking_number: "BK-2026-0042".to_string(),
        total_amount: 1500.0,
        purchaser_name: "Wanjiku Kamau".to_string(),
        ordered_at: Some(at(2026, 3, 1, 9, 15)),
        event: EventSnapshot {
            title: "Nairobi Jazz Night".to_string(),
            start: at(2026, 3, 5, 18, 30),
            end: None,
            venue: None,
            poster: None,
        },
        tickets: numbers
            .iter()
            .map(|n| TicketRecord {
                ticket_number: n.to_string(),
                ticket_type: None,
                qr: None,
            })
            .collect(),
    }
}

#[test]
fn price_uses_grouping_and_two_decimals() {
    assert_eq!(format_price(0.0, "KSh"), "Free");
    assert_eq!(format_price(5.0, "KSh"), "5.00 KSh");
    assert_eq!(format_price(999.999, "KSh"), "1,000.00 KSh");
    assert_eq!(format_price(1234567.5, "KSh"), "1,234,567.50 KSh");
    assert_eq!(format_price(100000.0, "USD"), "100,000.00 USD");
}

#[test]
fn timestamps_follow_ticket_formats() {
    let t = at(2026, 3, 5, 18, 30);
    assert_eq!(format_event_time(&t), "March 05, 2026 at 18:30");
    assert_eq!(format_order_time(&t), "05/03/2026 18:30");
}

#[test]
fn labels_fall_back_to_defaults() {
    let mut r = request(&["1"]);
    assert_eq!(r.event.venue_label(), "Online Event");
    assert_eq!(r.tickets[0].ticket_type_label(), "General Admission");
    r.event.venue = Some("KICC".to_string());
    r.tickets[0].ticket_type = Some("  ".to_string());
    assert_eq!(r.event.venue_label(), "KICC");
    assert_eq!(r.tickets[0].ticket_type_label(), "General Admission");
}

#[test]
fn validation_rejects_duplicates_and_bad_amounts() {
    assert!(request(&["1", "2"]).validate().is_ok());
    assert!(request(&[]).validate().is_ok());
    assert!(matches!(
        request(&["7", "7"]).validate(),
        Err(TicketDocError::Validation(_))
    ));

    let mut r = request(&["1"]);
    r.total_amount = f64::NAN;
    assert!(r.validate().is_err());
    r.total_amount = -1.0;
    assert!(r.validate().is_err());
}

#[test]
fn request_json_accepts_string_references() {
    let json = r#"{
        "booking_number": "BK/1",
        "total_amount": 0,
        "purchaser_name": "A",
        "event": {
            "title": "T",
            "start": "2026-03-05T18:30:00",
            "poster": "/uploads/events/p.png"
        },
        "tickets": [
            {"ticket_number": "1", "qr": "https://acct.blob.core.windows.net/uploads/qr/1.png?sp=r"}
        ]
    }"#;
    let r = BookingDocumentRequest::from_json_str(json).unwrap();
    assert_eq!(
        r.event.poster,
        Some(AssetReference::local("/uploads/events/p.png"))
    );
    assert!(r.tickets[0].qr.as_ref().unwrap().is_remote());
    assert_eq!(r.document_file_name(), "ticket_BK_1.pdf");

    assert!(matches!(
        BookingDocumentRequest::from_json_str("{}"),
        Err(TicketDocError::Serde(_))
    ));
}

#[test]
fn blank_or_malformed_asset_strings_read_as_missing() {
    let json = r#"{
        "booking_number": "BK-2",
        "total_amount": 250,
        "purchaser_name": "A",
        "event": { "title": "T", "start": "2026-03-05T18:30:00", "poster": "https://" },
        "tickets": [
            { "ticket_number": "1", "qr": "" },
            { "ticket_number": "2", "qr": "   " },
            { "ticket_number": "3", "qr": null },
            { "ticket_number": "4", "qr": "/uploads/qrcodes/4.png" }
        ]
    }"#;
    let r = BookingDocumentRequest::from_json_str(json).unwrap();
    assert_eq!(r.event.poster, None);
    assert_eq!(r.tickets[0].qr, None);
    assert_eq!(r.tickets[1].qr, None);
    assert_eq!(r.tickets[2].qr, None);
    assert_eq!(
        r.tickets[3].qr,
        Some(AssetReference::local("/uploads/qrcodes/4.png"))
    );
}

#[test]
fn price_ties_round_to_even() {
    assert_eq!(format_price(0.125, "KSh"), "0.12 KSh");
    assert_eq!(format_price(0.375, "KSh"), "0.38 KSh");
    assert_eq!(format_price(2500.5, "KSh"), "2,500.50 KSh");
    assert_eq!(format_price(0.001, "KSh"), "0.00 KSh");
}
