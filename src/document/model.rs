use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
    assets::{
        normalize::NormalizedImage,
        reference::{AssetReference, deserialize_lenient},
    },
    foundation::error::{TicketDocError, TicketDocResult},
};

/// Shown in the info cell when a ticket has no type.
pub const DEFAULT_TICKET_TYPE: &str = "General Admission";
/// Shown in the info cell when the event has no venue.
pub const DEFAULT_VENUE: &str = "Online Event";
pub const POSTER_PLACEHOLDER: &str = "Event Image";
pub const QR_PLACEHOLDER: &str = "QR Code";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Unique within the booking.
    pub ticket_number: String,
    #[serde(default)]
    pub ticket_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub qr: Option<AssetReference>,
}

impl TicketRecord {
    pub fn ticket_type_label(&self) -> &str {
        self.ticket_type
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_TICKET_TYPE)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub title: String,
    pub start: NaiveDateTime,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub poster: Option<AssetReference>,
}

impl EventSnapshot {
    pub fn venue_label(&self) -> &str {
        self.venue
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_VENUE)
    }
}

/// Read-only view of one booking, handed in by the caller per generation.
///
/// Ticket order is preserved into the document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingDocumentRequest {
    pub booking_number: String,
    pub total_amount: f64,
    pub purchaser_name: String,
    #[serde(default)]
    pub ordered_at: Option<NaiveDateTime>,
    pub event: EventSnapshot,
    #[serde(default)]
    pub tickets: Vec<TicketRecord>,
}

impl BookingDocumentRequest {
    pub fn from_json_str(text: &str) -> TicketDocResult<Self> {
        serde_json::from_str(text).map_err(|e| TicketDocError::serde(e.to_string()))
    }

    pub fn validate(&self) -> TicketDocResult<()> {
        if self.booking_number.trim().is_empty() {
            return Err(TicketDocError::validation("booking number must be non-empty"));
        }
        if !self.total_amount.is_finite() || self.total_amount < 0.0 {
            return Err(TicketDocError::validation(format!(
                "total amount {} must be a finite, non-negative number",
                self.total_amount
            )));
        }
        let mut seen = BTreeSet::new();
        for t in &self.tickets {
            if !seen.insert(t.ticket_number.as_str()) {
                return Err(TicketDocError::validation(format!(
                    "ticket number '{}' appears twice in booking '{}'",
                    t.ticket_number, self.booking_number
                )));
            }
        }
        Ok(())
    }

    /// File name used when the document is stored.
    pub fn document_file_name(&self) -> String {
        let safe: String = self
            .booking_number
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("ticket_{safe}.pdf")
    }
}

/// Outcome of resolving and normalizing one image.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedAsset {
    Image(NormalizedImage),
    Unresolved { placeholder: String },
}

impl ResolvedAsset {
    pub fn placeholder(label: impl Into<String>) -> Self {
        Self::Unresolved {
            placeholder: label.into(),
        }
    }

    pub fn image(&self) -> Option<&NormalizedImage> {
        match self {
            ResolvedAsset::Image(img) => Some(img),
            ResolvedAsset::Unresolved { .. } => None,
        }
    }
}

/// Per-ticket input of the compositor.
#[derive(Clone, Debug, PartialEq)]
pub struct TicketRenderBlock {
    pub ticket_number: String,
    pub ticket_type: String,
    pub qr: ResolvedAsset,
}

/// `1,234.50 KSh`, or `Free` for zero.
pub fn format_price(amount: f64, currency: &str) -> String {
    if amount <= 0.0 {
        return "Free".to_string();
    }
    // `{:.2}` rounds ties to even on the exact binary value.
    let fixed = format!("{amount:.2}");
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{grouped}.{cents} {currency}")
}

/// `March 05, 2026 at 18:30`
pub fn format_event_time(t: &NaiveDateTime) -> String {
    t.format("%B %d, %Y at %H:%M").to_string()
}

/// `05/03/2026 18:30`
pub fn format_order_time(t: &NaiveDateTime) -> String {
    t.format("%d/%m/%Y %H:%M").to_string()
}

#[cfg(test)]
#[path = "../../tests/unit/document/model.rs"]
mod tests;
