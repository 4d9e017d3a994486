use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;

use crate::{
    assets::reference::AssetReference,
    config::{BackendConfig, BackendKind},
    foundation::error::{TicketDocError, TicketDocResult},
    storage::{azure::AzureBlobBackend, s3::S3Backend},
};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Location of a new object: validated folder plus unique file name.
pub struct ObjectKey {
    pub folder: String,
    pub name: String,
}

impl ObjectKey {
    /// `<folder>/<name>`
    pub fn path(&self) -> String {
        format!("{}/{}", self.folder, self.name)
    }
}

/// A storage target that can write new objects and delete existing ones.
///
/// Callers normally go through [`crate::BackendSelector`], which validates names, picks the
/// backend and handles fallback; backends only move bytes.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Write `bytes` at `key` and return the reference to read them back.
    fn put(
        &self,
        key: &ObjectKey,
        bytes: &[u8],
        content_type: &str,
    ) -> TicketDocResult<AssetReference>;

    /// Delete the object behind `reference`. `Ok(false)` when it did not exist.
    fn delete(&self, reference: &AssetReference) -> TicketDocResult<bool>;

    /// Whether `reference` points into this backend (host match for remote backends).
    fn owns(&self, reference: &AssetReference) -> bool;
}

/// Create the backend for `config.kind`.
///
/// Remote kinds require credentials; their absence is a [`TicketDocError::Configuration`].
pub fn create_backend(config: &BackendConfig) -> TicketDocResult<Box<dyn StorageBackend>> {
    match config.kind {
        BackendKind::Local => Ok(Box::new(LocalBackend::from_config(config))),
        BackendKind::AzureBlob => Ok(Box::new(AzureBlobBackend::from_config(config)?)),
        BackendKind::S3 => Ok(Box::new(S3Backend::from_config(config)?)),
    }
}

/// Blocking HTTP client shared by the remote backends.
pub(crate) fn remote_client(config: &BackendConfig) -> TicketDocResult<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(config.fetch_timeout())
        .connect_timeout(config.fetch_timeout())
        .build()
        .map_err(|e| TicketDocError::configuration(format!("build http client: {e}")))
}

#[derive(Clone, Debug)]
/// Files under `<root>/<folder>/<name>`, referenced as `/<prefix>/<folder>/<name>`.
pub struct LocalBackend {
    root: PathBuf,
    upload_prefix: String,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>, upload_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            upload_prefix: upload_prefix.into().trim_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.local_root.clone(), config.upload_prefix.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn reference_for(&self, key: &ObjectKey) -> AssetReference {
        if self.upload_prefix.is_empty() {
            AssetReference::local(format!("/{}", key.path()))
        } else {
            AssetReference::local(format!("/{}/{}", self.upload_prefix, key.path()))
        }
    }

    /// Filesystem path a local reference written by this backend maps to.
    pub fn path_for(&self, reference: &str) -> TicketDocResult<PathBuf> {
        let rel = reference.replace('\\', "/");
        let rel = rel.trim_start_matches('/');
        let rel = if self.upload_prefix.is_empty() {
            rel
        } else {
            rel.strip_prefix(&format!("{}/", self.upload_prefix))
                .unwrap_or(rel)
        };
        let rel_path = Path::new(rel);
        if rel.is_empty()
            || rel_path
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(TicketDocError::validation(format!(
                "local reference '{reference}' does not name a file under the upload root"
            )));
        }
        Ok(self.root.join(rel_path))
    }
}

impl StorageBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn put(
        &self,
        key: &ObjectKey,
        bytes: &[u8],
        _content_type: &str,
    ) -> TicketDocResult<AssetReference> {
        let dir = self.root.join(&key.folder);
        let path = dir.join(&key.name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create upload dir '{}'", dir.display()))
            .and_then(|()| {
                std::fs::write(&path, bytes)
                    .with_context(|| format!("write upload '{}'", path.display()))
            })
            .map_err(|e| TicketDocError::filesystem(format!("{e:#}")))?;

        let reference = self.reference_for(key);
        tracing::info!(%reference, bytes = bytes.len(), "stored asset locally");
        Ok(reference)
    }

    fn delete(&self, reference: &AssetReference) -> TicketDocResult<bool> {
        let AssetReference::Local { path } = reference else {
            return Err(TicketDocError::validation(
                "local backend cannot delete remote references",
            ));
        };
        let file = self.path_for(path)?;
        if !file.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(&file)
            .with_context(|| format!("remove '{}'", file.display()))
            .map_err(|e| TicketDocError::filesystem(format!("{e:#}")))?;
        tracing::info!(%reference, "deleted local asset");
        Ok(true)
    }

    fn owns(&self, reference: &AssetReference) -> bool {
        !reference.is_remote()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/backend.rs"]
mod tests;
