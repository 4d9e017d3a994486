use std::path::Path;

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{
    assets::{
        locator::AssetLocator,
        normalize::{NormalizedImage, normalize_image},
        reference::AssetReference,
    },
    config::Branding,
    document::{
        compositor::{DocumentCompositor, DocumentInput, LOGO_PIXELS, POSTER_PIXELS, QR_PIXELS},
        model::{
            BookingDocumentRequest, POSTER_PLACEHOLDER, QR_PLACEHOLDER, ResolvedAsset,
            TicketRecord, TicketRenderBlock,
        },
        pdf::write_pdf,
        plan::DocumentPlan,
    },
    foundation::error::{TicketDocError, TicketDocResult},
    storage::selector::BackendSelector,
};

/// Folder generated documents are stored under by default.
pub const DEFAULT_DOCUMENT_FOLDER: &str = "documents";

#[derive(Clone, Debug)]
/// Threading controls for per-ticket asset resolution.
pub struct GenerationThreading {
    /// Resolve QR codes in parallel when `true`.
    pub parallel: bool,
    /// Optional explicit worker thread count.
    pub threads: Option<usize>,
}

impl Default for GenerationThreading {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
        }
    }
}

/// Turns a [`BookingDocumentRequest`] into a finished PDF.
///
/// Pipeline:
/// 1. resolve + normalize the poster and branding logo
/// 2. resolve + normalize every ticket's QR code (optionally in parallel, order preserved)
/// 3. [`DocumentCompositor::compose`]
/// 4. [`write_pdf`]
///
/// Asset failures never fail generation; they become placeholders.
#[derive(Clone, Debug)]
pub struct TicketDocumentGenerator {
    locator: AssetLocator,
    branding: Branding,
    compositor: DocumentCompositor,
    threading: GenerationThreading,
}

impl TicketDocumentGenerator {
    pub fn new(locator: AssetLocator, branding: Branding) -> Self {
        Self {
            locator,
            branding,
            compositor: DocumentCompositor::default(),
            threading: GenerationThreading::default(),
        }
    }

    pub fn with_threading(mut self, threading: GenerationThreading) -> Self {
        self.threading = threading;
        self
    }

    pub fn with_compositor(mut self, compositor: DocumentCompositor) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    /// Resolve and normalize one optional asset, degrading to `placeholder`.
    pub fn resolve_asset(
        &self,
        reference: Option<&AssetReference>,
        max: (u32, u32),
        placeholder: &str,
    ) -> ResolvedAsset {
        let Some(reference) = reference else {
            return ResolvedAsset::placeholder(placeholder);
        };
        let bytes = match self.locator.resolve(reference) {
            Ok(bytes) => bytes,
            Err(_) => return ResolvedAsset::placeholder(placeholder),
        };
        match normalize_image(&bytes, max.0, max.1) {
            Ok(img) => ResolvedAsset::Image(img),
            Err(e) => {
                tracing::warn!(%reference, error = %e, "asset could not be decoded; using placeholder");
                ResolvedAsset::placeholder(placeholder)
            }
        }
    }

    fn ticket_blocks(
        &self,
        request: &BookingDocumentRequest,
    ) -> TicketDocResult<Vec<TicketRenderBlock>> {
        let block = |t: &TicketRecord| TicketRenderBlock {
            ticket_number: t.ticket_number.clone(),
            ticket_type: t.ticket_type_label().to_string(),
            qr: self.resolve_asset(t.qr.as_ref(), QR_PIXELS, QR_PLACEHOLDER),
        };

        if !self.threading.parallel || request.tickets.len() < 2 {
            return Ok(request.tickets.iter().map(block).collect());
        }
        let pool = build_thread_pool(self.threading.threads)?;
        Ok(pool.install(|| request.tickets.par_iter().map(block).collect()))
    }

    /// Resolve everything and lay the document out, without serializing it.
    #[tracing::instrument(
        skip_all,
        fields(booking = %request.booking_number, tickets = request.tickets.len())
    )]
    pub fn generate_plan(&self, request: &BookingDocumentRequest) -> TicketDocResult<DocumentPlan> {
        request.validate()?;

        let poster = self.resolve_asset(
            request.event.poster.as_ref(),
            POSTER_PIXELS,
            POSTER_PLACEHOLDER,
        );
        let logo: Option<NormalizedImage> = self
            .branding
            .logo
            .as_ref()
            .and_then(|r| self.resolve_asset(Some(r), LOGO_PIXELS, "").image().cloned());
        let blocks = self.ticket_blocks(request)?;

        self.compositor.compose(&DocumentInput {
            request,
            branding: &self.branding,
            logo: logo.as_ref(),
            poster: &poster,
            blocks: &blocks,
        })
    }

    /// Generate the PDF bytes for `request`. Nothing is persisted.
    #[tracing::instrument(skip_all, fields(booking = %request.booking_number))]
    pub fn generate(&self, request: &BookingDocumentRequest) -> TicketDocResult<Vec<u8>> {
        let plan = self.generate_plan(request)?;
        let pdf = write_pdf(&plan)?;
        tracing::info!(
            pages = plan.pages.len(),
            rows = plan.rows.len(),
            bytes = pdf.len(),
            "generated ticket document"
        );
        Ok(pdf)
    }

    /// Generate and write to `path`, creating parent directories.
    pub fn generate_to_file(
        &self,
        request: &BookingDocumentRequest,
        path: impl AsRef<Path>,
    ) -> TicketDocResult<()> {
        let path = path.as_ref();
        let pdf = self.generate(request)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))
                .map_err(|e| TicketDocError::filesystem(format!("{e:#}")))?;
        }
        std::fs::write(path, &pdf)
            .with_context(|| format!("write document '{}'", path.display()))
            .map_err(|e| TicketDocError::filesystem(format!("{e:#}")))?;
        Ok(())
    }

    /// Generate and persist through `selector` as `ticket_<booking>.pdf` in `folder`.
    pub fn generate_and_store(
        &self,
        request: &BookingDocumentRequest,
        selector: &BackendSelector,
        folder: &str,
    ) -> TicketDocResult<AssetReference> {
        let pdf = self.generate(request)?;
        selector.put(&request.document_file_name(), &pdf, folder)
    }
}

fn build_thread_pool(threads: Option<usize>) -> TicketDocResult<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(TicketDocError::validation(
            "generation threading 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| TicketDocError::document(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../tests/unit/pipeline.rs"]
mod tests;
