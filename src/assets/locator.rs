use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::Utc;

use crate::{
    assets::reference::AssetReference,
    config::BackendConfig,
    foundation::error::{TicketDocError, TicketDocResult, Unresolved},
};

/// Largest remote body the locator will buffer.
pub const MAX_FETCH_BYTES: u64 = 25 * 1024 * 1024;

/// Network seam used for `Remote` references.
pub trait RemoteFetcher: Send + Sync {
    /// Fetch the full body at `url`. Any failure is a [`TicketDocError::NetworkFetch`].
    fn fetch(&self, url: &str) -> TicketDocResult<Vec<u8>>;
}

/// Blocking HTTP fetcher with a bounded per-request timeout.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> TicketDocResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TicketDocError::configuration(format!("build http client: {e}")))?;
        Ok(Self {
            client,
            max_bytes: MAX_FETCH_BYTES,
        })
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> TicketDocResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TicketDocError::network(format!("GET failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TicketDocError::network(format!("GET returned {status}")));
        }
        if response.content_length().is_some_and(|n| n > self.max_bytes) {
            return Err(TicketDocError::network(format!(
                "body exceeds {} bytes",
                self.max_bytes
            )));
        }
        let body = response
            .bytes()
            .map_err(|e| TicketDocError::network(format!("read body: {e}")))?;
        if body.len() as u64 > self.max_bytes {
            return Err(TicketDocError::network(format!(
                "body exceeds {} bytes",
                self.max_bytes
            )));
        }
        Ok(body.to_vec())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Filesystem layout local references are interpreted against.
pub struct LocalLayout {
    /// Directory local writes land in.
    pub root: PathBuf,
    /// Canonical leading segment of local references (`uploads`).
    pub upload_prefix: String,
    /// Roots used by older deployments, searched last.
    pub legacy_roots: Vec<PathBuf>,
}

impl LocalLayout {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            root: config.local_root.clone(),
            upload_prefix: config.upload_prefix.trim_matches('/').to_string(),
            legacy_roots: config.legacy_roots.clone(),
        }
    }

    fn prefix_dir(&self) -> String {
        format!("{}/", self.upload_prefix)
    }

    /// `reference` without leading separators, using `/` throughout.
    fn relative(reference: &str) -> String {
        reference.replace('\\', "/").trim_start_matches('/').to_string()
    }

    fn with_prefix(&self, rel: &str) -> String {
        if self.upload_prefix.is_empty() || rel.starts_with(&self.prefix_dir()) {
            rel.to_string()
        } else {
            format!("{}{rel}", self.prefix_dir())
        }
    }

    fn without_prefix<'a>(&self, rel: &'a str) -> Option<&'a str> {
        if self.upload_prefix.is_empty() {
            return None;
        }
        rel.strip_prefix(&self.prefix_dir())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// One way of turning a local reference into candidate filesystem paths.
///
/// Strategies are pure; the locator probes their candidates in [`LOCAL_STRATEGIES`] order and
/// the first existing file wins.
pub enum LocalStrategy {
    /// A root-relative reference joined onto the root. References that start with a
    /// separator are left to [`LocalStrategy::StripLeadingSeparator`].
    AsGiven,
    /// A single leading separator stripped, then joined onto the root.
    StripLeadingSeparator,
    /// The canonical upload prefix stripped, for roots that are the upload folder itself.
    StripUploadPrefix,
    /// The canonical upload prefix added when missing.
    AddUploadPrefix,
    /// Prefixed path and bare file name under each legacy root.
    LegacyRoots,
}

pub const LOCAL_STRATEGIES: [LocalStrategy; 5] = [
    LocalStrategy::AsGiven,
    LocalStrategy::StripLeadingSeparator,
    LocalStrategy::StripUploadPrefix,
    LocalStrategy::AddUploadPrefix,
    LocalStrategy::LegacyRoots,
];

impl LocalStrategy {
    /// Candidate paths for `reference` under `layout`. Never touches the filesystem.
    pub fn candidates(self, reference: &str, layout: &LocalLayout) -> Vec<PathBuf> {
        let rel = LocalLayout::relative(reference);
        if rel.is_empty() {
            return Vec::new();
        }
        match self {
            LocalStrategy::AsGiven => {
                if reference.starts_with(['/', '\\']) || Path::new(reference).has_root() {
                    Vec::new()
                } else {
                    vec![layout.root.join(reference)]
                }
            }
            LocalStrategy::StripLeadingSeparator => {
                match reference
                    .strip_prefix('/')
                    .or_else(|| reference.strip_prefix('\\'))
                {
                    Some(stripped) if !stripped.is_empty() => vec![layout.root.join(stripped)],
                    _ => Vec::new(),
                }
            }
            LocalStrategy::StripUploadPrefix => layout
                .without_prefix(&rel)
                .filter(|rest| !rest.is_empty())
                .map(|rest| vec![layout.root.join(rest)])
                .unwrap_or_default(),
            LocalStrategy::AddUploadPrefix => {
                if layout.without_prefix(&rel).is_some() || layout.upload_prefix.is_empty() {
                    Vec::new()
                } else {
                    vec![layout.root.join(layout.with_prefix(&rel))]
                }
            }
            LocalStrategy::LegacyRoots => {
                let prefixed = layout.with_prefix(&rel);
                let file_name = Path::new(&rel).file_name().map(PathBuf::from);
                let mut out = Vec::with_capacity(layout.legacy_roots.len() * 2);
                for root in &layout.legacy_roots {
                    out.push(root.join(&prefixed));
                    if let Some(name) = &file_name {
                        out.push(root.join(&layout.upload_prefix).join(name));
                    }
                }
                out
            }
        }
    }
}

fn has_parent_traversal(reference: &str) -> bool {
    Path::new(&reference.replace('\\', "/"))
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Resolves [`AssetReference`]s to raw bytes.
///
/// Resolution is a pure read: references are never mutated and failures come back as
/// [`Unresolved`] instead of errors.
#[derive(Clone)]
pub struct AssetLocator {
    layout: LocalLayout,
    fetcher: Arc<dyn RemoteFetcher>,
}

impl std::fmt::Debug for AssetLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLocator")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl AssetLocator {
    /// Locator over the config's local layout with an [`HttpFetcher`] bounded by
    /// `fetch_timeout_secs`.
    pub fn new(config: &BackendConfig) -> TicketDocResult<Self> {
        let fetcher = HttpFetcher::new(config.fetch_timeout())?;
        Ok(Self::with_fetcher(
            LocalLayout::from_config(config),
            Arc::new(fetcher),
        ))
    }

    pub fn with_fetcher(layout: LocalLayout, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self { layout, fetcher }
    }

    pub fn layout(&self) -> &LocalLayout {
        &self.layout
    }

    /// Fetch or read the bytes behind `reference`.
    pub fn resolve(&self, reference: &AssetReference) -> Result<Vec<u8>, Unresolved> {
        match reference {
            AssetReference::Remote { url, .. } => {
                if reference.is_expired_at(Utc::now()) {
                    tracing::debug!(%url, "remote access token looks expired; fetching anyway");
                }
                self.fetcher.fetch(url).map_err(|e| {
                    tracing::warn!(%url, error = %e, "remote asset unresolved");
                    Unresolved::from(e)
                })
            }
            AssetReference::Local { path } => {
                let Some(found) = self.locate_local(path) else {
                    tracing::warn!(reference = %path, "local asset not found");
                    return Err(Unresolved::new(format!("no file found for '{path}'")));
                };
                std::fs::read(&found).map_err(|e| {
                    tracing::warn!(path = %found.display(), error = %e, "local asset unreadable");
                    Unresolved::new(format!("read '{}': {e}", found.display()))
                })
            }
        }
    }

    /// First existing file among the strategy candidates for a local reference.
    pub fn locate_local(&self, reference: &str) -> Option<PathBuf> {
        if has_parent_traversal(reference) {
            tracing::warn!(%reference, "refusing local reference with '..'");
            return None;
        }
        for strategy in LOCAL_STRATEGIES {
            for candidate in strategy.candidates(reference, &self.layout) {
                if candidate.is_file() {
                    tracing::debug!(?strategy, path = %candidate.display(), "local asset found");
                    return Some(candidate);
                }
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/locator.rs"]
mod tests;
