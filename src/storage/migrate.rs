use serde::Serialize;

use crate::{
    assets::{locator::AssetLocator, reference::AssetReference},
    foundation::error::{TicketDocError, TicketDocResult},
    storage::{
        backend::StorageBackend,
        content_type::{normalize_folder, strip_unique_suffix},
        selector::BackendSelector,
    },
};

/// Folder used when none can be inferred from a local reference.
pub const DEFAULT_MIGRATION_FOLDER: &str = "general";

#[derive(Clone, Debug, Serialize)]
pub struct MigrationFailure {
    pub reference: String,
    pub error: String,
}

/// Outcome of one migration run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MigrationReport {
    /// `(old, new)` for every uploaded reference, in input order.
    pub migrated: Vec<(AssetReference, AssetReference)>,
    /// Remote references left as they are.
    pub skipped: usize,
    pub failed: Vec<MigrationFailure>,
}

/// Copies locally stored assets to the selector's remote backend.
///
/// There is no local fallback here: a failed upload is recorded and the old reference stays
/// valid.
#[derive(Debug)]
pub struct AssetMigrator<'a> {
    selector: &'a BackendSelector,
    locator: &'a AssetLocator,
}

impl<'a> AssetMigrator<'a> {
    pub fn new(selector: &'a BackendSelector, locator: &'a AssetLocator) -> Self {
        Self { selector, locator }
    }

    /// Folder a local reference was stored under (`/uploads/events/x.png` -> `events`).
    pub fn infer_folder(&self, reference: &str) -> String {
        let prefix = &self.locator.layout().upload_prefix;
        let rel = reference.replace('\\', "/");
        let mut parts: Vec<&str> = rel.split('/').filter(|p| !p.is_empty()).collect();
        if parts.first().is_some_and(|p| *p == prefix.as_str()) {
            parts.remove(0);
        }
        parts.pop();
        if parts.is_empty() {
            return DEFAULT_MIGRATION_FOLDER.to_string();
        }
        normalize_folder(&parts.join("/")).unwrap_or_else(|_| DEFAULT_MIGRATION_FOLDER.to_string())
    }

    #[tracing::instrument(skip_all, fields(count = references.len()))]
    pub fn migrate(&self, references: &[AssetReference]) -> TicketDocResult<MigrationReport> {
        let remote = self.selector.remote()?;
        let mut report = MigrationReport::default();

        for reference in references {
            let AssetReference::Local { path } = reference else {
                report.skipped += 1;
                continue;
            };
            match self.migrate_one(remote, path) {
                Ok(new) => {
                    tracing::info!(old = %reference, new = %new, "migrated asset");
                    report.migrated.push((reference.clone(), new));
                }
                Err(e) => {
                    tracing::warn!(reference = %reference, error = %e, "asset not migrated");
                    report.failed.push(MigrationFailure {
                        reference: reference.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn migrate_one(
        &self,
        remote: &dyn StorageBackend,
        path: &str,
    ) -> TicketDocResult<AssetReference> {
        let Some(file) = self.locator.locate_local(path) else {
            return Err(TicketDocError::filesystem(format!(
                "no file found for '{path}'"
            )));
        };
        let bytes = std::fs::read(&file).map_err(|e| {
            TicketDocError::filesystem(format!("read '{}': {e}", file.display()))
        })?;
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path);
        let file_name = strip_unique_suffix(file_name);
        let (key, content_type) = self
            .selector
            .object_key(&file_name, &self.infer_folder(path))?;
        remote.put(&key, &bytes, content_type)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/migrate.rs"]
mod tests;
