use std::collections::BTreeSet;

use crate::{
    assets::reference::AssetReference,
    config::{BackendConfig, BackendKind},
    foundation::error::{TicketDocError, TicketDocResult},
    storage::{
        backend::{LocalBackend, ObjectKey, StorageBackend, create_backend},
        content_type::{check_allowed, content_type_for, normalize_folder, unique_file_name},
    },
};

#[derive(Debug)]
enum Preferred {
    Local,
    Remote(Box<dyn StorageBackend>),
    /// Remote kind selected without usable credentials; every write fails with this reason.
    Misconfigured { kind: BackendKind, reason: String },
}

/// Single write/delete entry point over the configured backends.
///
/// Writes go to the preferred backend; a failed remote write is retried on the local backend
/// and logged. Callers never branch on the backend kind.
#[derive(Debug)]
pub struct BackendSelector {
    allowed: BTreeSet<String>,
    preferred: Preferred,
    local: LocalBackend,
}

impl BackendSelector {
    /// Build from configuration. Missing remote credentials do not fail here; they fail the
    /// first `put` with [`TicketDocError::Configuration`].
    pub fn new(config: &BackendConfig) -> Self {
        let preferred = match config.kind {
            BackendKind::Local => Preferred::Local,
            kind => match create_backend(config) {
                Ok(backend) => Preferred::Remote(backend),
                Err(e) => {
                    tracing::warn!(?kind, error = %e, "remote backend is not usable");
                    Preferred::Misconfigured {
                        kind,
                        reason: e.to_string(),
                    }
                }
            },
        };
        Self {
            allowed: config.allowed_extensions.clone(),
            preferred,
            local: LocalBackend::from_config(config),
        }
    }

    /// Selector over explicit backends. `remote = None` means local-only.
    pub fn with_backends(
        allowed_extensions: BTreeSet<String>,
        remote: Option<Box<dyn StorageBackend>>,
        local: LocalBackend,
    ) -> Self {
        Self {
            allowed: allowed_extensions,
            preferred: remote.map_or(Preferred::Local, Preferred::Remote),
            local,
        }
    }

    /// Kind writes are attempted on first.
    pub fn preferred_kind(&self) -> BackendKind {
        match &self.preferred {
            Preferred::Local => BackendKind::Local,
            Preferred::Remote(b) => b.kind(),
            Preferred::Misconfigured { kind, .. } => *kind,
        }
    }

    pub fn local(&self) -> &LocalBackend {
        &self.local
    }

    /// The configured remote backend, or the configuration error that prevented building it.
    pub fn remote(&self) -> TicketDocResult<&dyn StorageBackend> {
        match &self.preferred {
            Preferred::Remote(b) => Ok(b.as_ref()),
            Preferred::Local => Err(TicketDocError::configuration(
                "no remote backend is configured",
            )),
            Preferred::Misconfigured { reason, .. } => {
                Err(TicketDocError::configuration(reason.clone()))
            }
        }
    }

    /// Validate `file_name` and `folder` and derive the object key and content type.
    /// Performs no IO.
    pub fn object_key(
        &self,
        file_name: &str,
        folder: &str,
    ) -> TicketDocResult<(ObjectKey, &'static str)> {
        let ext = check_allowed(file_name, &self.allowed)?;
        let key = ObjectKey {
            folder: normalize_folder(folder)?,
            name: unique_file_name(file_name),
        };
        Ok((key, content_type_for(&ext)))
    }

    /// Store `bytes` (named `file_name` by the client) under `folder`.
    #[tracing::instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub fn put(
        &self,
        file_name: &str,
        bytes: &[u8],
        folder: &str,
    ) -> TicketDocResult<AssetReference> {
        let (key, content_type) = self.object_key(file_name, folder)?;
        match &self.preferred {
            Preferred::Local => self.local.put(&key, bytes, content_type),
            Preferred::Misconfigured { reason, .. } => {
                Err(TicketDocError::configuration(reason.clone()))
            }
            Preferred::Remote(remote) => match remote.put(&key, bytes, content_type) {
                Ok(reference) => Ok(reference),
                Err(e) => {
                    tracing::warn!(
                        backend = ?remote.kind(),
                        key = %key.path(),
                        error = %e,
                        "remote write failed; falling back to local storage"
                    );
                    self.local.put(&key, bytes, content_type)
                }
            },
        }
    }

    /// Delete the object behind `reference`. `Ok(false)` when it was already gone.
    ///
    /// Remote references only reach the backend whose host matches; any other host is
    /// [`TicketDocError::UnknownBackend`] and nothing is touched.
    pub fn delete(&self, reference: &AssetReference) -> TicketDocResult<bool> {
        if !reference.is_remote() {
            return self.local.delete(reference);
        }
        match &self.preferred {
            Preferred::Remote(remote) if remote.owns(reference) => remote.delete(reference),
            _ => Err(TicketDocError::UnknownBackend {
                host: reference.host().unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/selector.rs"]
mod tests;
