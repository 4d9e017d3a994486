//! Storage and document configuration.
//!
//! A [`BackendConfig`] is loaded from a JSON file (every field optional) and/or from
//! `TICKETDOC_*` environment variables, then passed explicitly into the backend selector and
//! the asset locator. Nothing in the crate reads global configuration on its own.

use std::{
    collections::BTreeSet,
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::{
    assets::reference::{AssetReference, deserialize_lenient},
    foundation::error::{TicketDocError, TicketDocResult},
};

const ENV_PREFIX: &str = "TICKETDOC_";

/// Storage backend variants a write may be routed to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Files under the configured local root.
    #[default]
    Local,
    /// Azure Blob Storage, authenticated with the account shared key (SAS tokens).
    AzureBlob,
    /// Amazon S3 (or compatible), authenticated with SigV4.
    S3,
}

impl BackendKind {
    pub fn is_remote(self) -> bool {
        !matches!(self, BackendKind::Local)
    }

    fn parse(s: &str) -> TicketDocResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "azure" | "azure_blob" | "azureblob" => Ok(Self::AzureBlob),
            "s3" => Ok(Self::S3),
            other => Err(TicketDocError::configuration(format!(
                "unknown backend kind '{other}'"
            ))),
        }
    }
}

/// Credentials for the remote backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// Azure storage account name + base64 account key.
    AzureSharedKey {
        account_name: String,
        account_key: String,
    },
    /// Azure connection string (`AccountName=..;AccountKey=..;...`).
    AzureConnectionString { value: String },
    /// AWS access key pair and region.
    S3 {
        access_key_id: String,
        secret_access_key: String,
        region: String,
    },
}

impl Credentials {
    fn redacted(&self) -> Self {
        const MASK: &str = "***";
        match self {
            Credentials::AzureSharedKey { account_name, .. } => Credentials::AzureSharedKey {
                account_name: account_name.clone(),
                account_key: MASK.to_string(),
            },
            Credentials::AzureConnectionString { .. } => Credentials::AzureConnectionString {
                value: MASK.to_string(),
            },
            Credentials::S3 {
                access_key_id,
                region,
                ..
            } => Credentials::S3 {
                access_key_id: access_key_id.clone(),
                secret_access_key: MASK.to_string(),
                region: region.clone(),
            },
        }
    }
}

/// Where uploads go and how existing references are found again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Preferred backend for writes.
    pub kind: BackendKind,
    /// Remote credentials; required when `kind` is remote.
    pub credentials: Option<Credentials>,
    /// Azure container or S3 bucket name.
    pub container: String,
    /// Lower-case extensions (no dot) accepted by `put`.
    pub allowed_extensions: BTreeSet<String>,
    /// Directory local writes land in (`<local_root>/<folder>/<name>`).
    pub local_root: PathBuf,
    /// Leading path segment of local references (`/<upload_prefix>/<folder>/<name>`).
    pub upload_prefix: String,
    /// Additional roots searched for local references written by older deployments.
    pub legacy_roots: Vec<PathBuf>,
    /// Bound on every remote request (fetch, put, delete).
    pub fetch_timeout_secs: u64,
    /// Validity of the read token appended to remote references.
    pub sas_validity_days: i64,
    /// Override of the remote base URL (emulators, tests). `None` uses the public endpoint.
    pub endpoint: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            credentials: None,
            container: "uploads".to_string(),
            allowed_extensions: default_allowed_extensions(),
            local_root: PathBuf::from("uploads"),
            upload_prefix: "uploads".to_string(),
            legacy_roots: default_legacy_roots(),
            fetch_timeout_secs: 10,
            sas_validity_days: 365,
            endpoint: None,
        }
    }
}

fn default_allowed_extensions() -> BTreeSet<String> {
    ["png", "jpg", "jpeg", "gif", "pdf"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_legacy_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        roots.push(cwd);
    }
    if let Some(parent) = env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
    {
        roots.push(parent.to_path_buf());
    }
    roots
}

impl BackendConfig {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> TicketDocResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> TicketDocResult<Self> {
        let mut cfg: Self =
            serde_json::from_str(text).map_err(|e| TicketDocError::serde(e.to_string()))?;
        cfg.normalize_extensions();
        Ok(cfg)
    }

    /// Defaults overlaid with `TICKETDOC_*` environment variables.
    pub fn from_env() -> TicketDocResult<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// Overlay `TICKETDOC_*` variables onto this config.
    pub fn apply_env_overrides(&mut self) -> TicketDocResult<()> {
        self.apply_overrides(|key| env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    pub(crate) fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> TicketDocResult<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(kind) = get("BACKEND") {
            self.kind = BackendKind::parse(&kind)?;
        }
        if let Some(v) = get("CONTAINER") {
            self.container = v;
        }
        if let Some(v) = get("LOCAL_ROOT") {
            self.local_root = PathBuf::from(v);
        }
        if let Some(v) = get("UPLOAD_PREFIX") {
            self.upload_prefix = v.trim_matches('/').to_string();
        }
        if let Some(v) = get("ALLOWED_EXTENSIONS") {
            self.allowed_extensions = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get("FETCH_TIMEOUT_SECS") {
            self.fetch_timeout_secs = v.trim().parse().map_err(|_| {
                TicketDocError::configuration(format!("FETCH_TIMEOUT_SECS '{v}' is not a number"))
            })?;
        }
        if let Some(v) = get("ENDPOINT") {
            self.endpoint = Some(v);
        }

        if let Some(value) = get("AZURE_CONNECTION_STRING") {
            self.credentials = Some(Credentials::AzureConnectionString { value });
        } else if let (Some(account_name), Some(account_key)) =
            (get("AZURE_ACCOUNT_NAME"), get("AZURE_ACCOUNT_KEY"))
        {
            self.credentials = Some(Credentials::AzureSharedKey {
                account_name,
                account_key,
            });
        } else if let (Some(access_key_id), Some(secret_access_key)) =
            (get("S3_ACCESS_KEY_ID"), get("S3_SECRET_ACCESS_KEY"))
        {
            self.credentials = Some(Credentials::S3 {
                access_key_id,
                secret_access_key,
                region: get("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            });
        }

        self.normalize_extensions();
        Ok(())
    }

    fn normalize_extensions(&mut self) {
        self.allowed_extensions = std::mem::take(&mut self.allowed_extensions)
            .into_iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// Copy of this config with secrets masked, for diagnostics.
    pub fn redacted(&self) -> Self {
        Self {
            credentials: self.credentials.as_ref().map(Credentials::redacted),
            ..self.clone()
        }
    }
}

/// Static text and artwork of the ticket document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    /// Header text, shown when no logo resolves.
    pub title: String,
    /// Header logo; resolved like any other asset.
    #[serde(deserialize_with = "deserialize_lenient")]
    pub logo: Option<AssetReference>,
    pub disclaimer: String,
    pub footer_lines: Vec<String>,
    /// Suffix of formatted prices.
    pub currency: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            title: "NIKO FREE".to_string(),
            logo: None,
            disclaimer: "This ticket must be presented for admittance to the event.".to_string(),
            footer_lines: vec![
                "Thank you for using Niko Free!".to_string(),
                "Present this ticket or QR code at the event entrance".to_string(),
                "For support, contact: support@niko-free.com".to_string(),
            ],
            currency: "KSh".to_string(),
        }
    }
}

impl Branding {
    pub fn from_path(path: impl AsRef<Path>) -> TicketDocResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read branding '{}'", path.display()))?;
        serde_json::from_str(&text).map_err(|e| TicketDocError::serde(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
