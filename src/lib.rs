//! Ticketdoc produces printable ticket documents for event bookings and stores uploaded assets.
//!
//! - Configure storage with a [`BackendConfig`] and build a [`BackendSelector`]
//! - Resolve stored [`AssetReference`]s with an [`AssetLocator`]
//! - Generate a PDF (one row per ticket: poster, details, QR) with a [`TicketDocumentGenerator`]
#![forbid(unsafe_code)]

mod foundation;

/// Asset references, lookup, and image normalization.
pub mod assets;
/// Storage and branding configuration.
pub mod config;
/// Document model, layout, and PDF serialization.
pub mod document;
/// Generation orchestration.
pub mod pipeline;
/// Storage backends and the write-time selector.
pub mod storage;

pub use crate::foundation::core::{PageSize, Point, Rect, Rgb8, Size, inch};
pub use crate::foundation::error::{TicketDocError, TicketDocResult, Unresolved};

pub use crate::assets::locator::{AssetLocator, HttpFetcher, LocalLayout, RemoteFetcher};
pub use crate::assets::normalize::{NormalizedImage, normalize_image};
pub use crate::assets::reference::AssetReference;
pub use crate::config::{BackendConfig, BackendKind, Branding, Credentials};
pub use crate::document::compositor::DocumentCompositor;
pub use crate::document::model::{
    BookingDocumentRequest, EventSnapshot, ResolvedAsset, TicketRecord,
};
pub use crate::document::pdf::write_pdf;
pub use crate::document::plan::DocumentPlan;
pub use crate::pipeline::{DEFAULT_DOCUMENT_FOLDER, GenerationThreading, TicketDocumentGenerator};
pub use crate::storage::backend::{LocalBackend, ObjectKey, StorageBackend, create_backend};
pub use crate::storage::migrate::{AssetMigrator, MigrationReport};
pub use crate::storage::selector::BackendSelector;
