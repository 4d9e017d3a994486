//! Azure Blob Storage backend.
//!
//! Every request is authorized with an account SAS signed locally from the shared key; no
//! Azure SDK is involved. Writes use a short-lived create/write token, and the returned
//! reference carries a long-lived read token so it can be fetched without credentials.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use reqwest::{StatusCode, Url};

use crate::{
    assets::reference::AssetReference,
    config::{BackendConfig, BackendKind, Credentials},
    foundation::error::{TicketDocError, TicketDocResult},
    storage::{
        backend::{ObjectKey, StorageBackend, remote_client},
        signing::hmac_sha256,
    },
};

/// Storage service version the SAS string-to-sign layout follows.
pub const SAS_VERSION: &str = "2019-12-12";

const SAS_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const WRITE_TOKEN_TTL_MINUTES: i64 = 60;

/// Fields of an Azure storage connection string this backend understands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: String,
    pub blob_endpoint: Option<String>,
    pub protocol: Option<String>,
    pub endpoint_suffix: Option<String>,
}

impl ConnectionString {
    /// Parse `Key=Value;Key=Value`. Values may themselves contain `=` (base64 keys).
    pub fn parse(raw: &str) -> TicketDocResult<Self> {
        let mut out = Self::default();
        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(TicketDocError::configuration(
                    "connection string segment is not Key=Value",
                ));
            };
            let value = value.trim().to_string();
            match key.trim() {
                "AccountName" => out.account_name = value,
                "AccountKey" => out.account_key = value,
                "BlobEndpoint" => out.blob_endpoint = Some(value),
                "DefaultEndpointsProtocol" => out.protocol = Some(value),
                "EndpointSuffix" => out.endpoint_suffix = Some(value),
                _ => {}
            }
        }
        if out.account_name.is_empty() || out.account_key.is_empty() {
            return Err(TicketDocError::configuration(
                "connection string must contain AccountName and AccountKey",
            ));
        }
        Ok(out)
    }

    fn blob_endpoint(&self) -> String {
        if let Some(ep) = &self.blob_endpoint {
            return ep.clone();
        }
        format!(
            "{}://{}.blob.{}",
            self.protocol.as_deref().unwrap_or("https"),
            self.account_name,
            self.endpoint_suffix.as_deref().unwrap_or("core.windows.net")
        )
    }
}

/// Blob storage under one container.
#[derive(Clone)]
pub struct AzureBlobBackend {
    account_name: String,
    account_key: Vec<u8>,
    endpoint: Url,
    container: String,
    read_validity: Duration,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for AzureBlobBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobBackend")
            .field("account_name", &self.account_name)
            .field("endpoint", &self.endpoint.as_str())
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

impl AzureBlobBackend {
    /// Build from shared-key or connection-string credentials.
    ///
    /// Endpoint precedence: `config.endpoint`, then the connection string's `BlobEndpoint`,
    /// then `https://<account>.blob.core.windows.net`.
    pub fn from_config(config: &BackendConfig) -> TicketDocResult<Self> {
        let (account_name, account_key, cs_endpoint) = match &config.credentials {
            Some(Credentials::AzureSharedKey {
                account_name,
                account_key,
            }) => (account_name.clone(), account_key.clone(), None),
            Some(Credentials::AzureConnectionString { value }) => {
                let cs = ConnectionString::parse(value)?;
                let endpoint = cs.blob_endpoint();
                (cs.account_name, cs.account_key, Some(endpoint))
            }
            Some(_) => {
                return Err(TicketDocError::configuration(
                    "azure_blob backend needs azure credentials",
                ));
            }
            None => {
                return Err(TicketDocError::configuration(
                    "azure_blob backend selected but no credentials are configured",
                ));
            }
        };
        if account_name.trim().is_empty() {
            return Err(TicketDocError::configuration("azure account name is empty"));
        }
        let key = STANDARD
            .decode(account_key.trim())
            .map_err(|e| TicketDocError::configuration(format!("azure account key: {e}")))?;
        if config.container.trim().is_empty() {
            return Err(TicketDocError::configuration("azure container is empty"));
        }

        let endpoint = config
            .endpoint
            .clone()
            .or(cs_endpoint)
            .unwrap_or_else(|| format!("https://{account_name}.blob.core.windows.net"));
        let endpoint = Url::parse(endpoint.trim_end_matches('/')).map_err(|e| {
            TicketDocError::configuration(format!("azure endpoint '{endpoint}': {e}"))
        })?;
        if endpoint.host_str().is_none() {
            return Err(TicketDocError::configuration("azure endpoint has no host"));
        }

        Ok(Self {
            account_name,
            account_key: key,
            endpoint,
            container: config.container.trim().to_string(),
            read_validity: Duration::days(config.sas_validity_days.max(1)),
            client: remote_client(config)?,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    fn endpoint_base(&self) -> &str {
        self.endpoint.as_str().trim_end_matches('/')
    }

    fn endpoint_segments(&self) -> Vec<&str> {
        self.endpoint
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default()
    }

    fn protocol(&self) -> &'static str {
        if self.endpoint.scheme() == "https" {
            "https"
        } else {
            "https,http"
        }
    }

    /// Unsigned URL of `blob` inside `container`.
    pub fn blob_url(&self, container: &str, blob: &str) -> String {
        let blob: Vec<_> = blob
            .split('/')
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!(
            "{}/{}/{}",
            self.endpoint_base(),
            urlencoding::encode(container),
            blob.join("/")
        )
    }

    /// Account SAS query string (blob service, object resources) expiring at `expiry`.
    pub fn account_sas(&self, permissions: &str, expiry: DateTime<Utc>) -> TicketDocResult<String> {
        let se = expiry.format(SAS_TIME_FORMAT).to_string();
        let spr = self.protocol();
        let string_to_sign = format!(
            "{}\n{permissions}\nb\no\n\n{se}\n\n{spr}\n{SAS_VERSION}\n",
            self.account_name
        );
        let sig = STANDARD.encode(hmac_sha256(&self.account_key, string_to_sign.as_bytes())?);
        Ok(format!(
            "sv={SAS_VERSION}&ss=b&srt=o&sp={permissions}&se={}&spr={}&sig={}",
            urlencoding::encode(&se),
            urlencoding::encode(spr),
            urlencoding::encode(&sig)
        ))
    }

    /// `(container, blob)` of a reference served by this account, `None` otherwise.
    pub fn blob_location(&self, reference: &AssetReference) -> Option<(String, String)> {
        if !self.owns(reference) {
            return None;
        }
        let segments = reference.remote_segments()?;
        let prefix = self.endpoint_segments();
        if segments.len() < prefix.len() + 2
            || segments.iter().zip(&prefix).any(|(a, b)| a.as_str() != *b)
        {
            return None;
        }
        let rest = &segments[prefix.len()..];
        Some((rest[0].clone(), rest[1..].join("/")))
    }
}

impl StorageBackend for AzureBlobBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::AzureBlob
    }

    #[tracing::instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    fn put(
        &self,
        key: &ObjectKey,
        bytes: &[u8],
        content_type: &str,
    ) -> TicketDocResult<AssetReference> {
        let now = Utc::now();
        let url = self.blob_url(&self.container, &key.path());
        let write_sas = self.account_sas("cw", now + Duration::minutes(WRITE_TOKEN_TTL_MINUTES))?;

        let response = self
            .client
            .put(format!("{url}?{write_sas}"))
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", SAS_VERSION)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .map_err(|e| TicketDocError::backend_write(format!("azure PUT {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TicketDocError::backend_write(format!(
                "azure PUT {url} returned {status}"
            )));
        }

        let read_sas = self.account_sas("r", now + self.read_validity)?;
        let reference = AssetReference::parse(&format!("{url}?{read_sas}"))?;
        tracing::info!(%url, "stored asset in azure blob storage");
        Ok(reference)
    }

    fn delete(&self, reference: &AssetReference) -> TicketDocResult<bool> {
        let Some((container, blob)) = self.blob_location(reference) else {
            return Err(TicketDocError::validation(format!(
                "'{reference}' is not a blob of this storage account"
            )));
        };
        let url = self.blob_url(&container, &blob);
        let sas = self.account_sas("d", Utc::now() + Duration::minutes(WRITE_TOKEN_TTL_MINUTES))?;
        let response = self
            .client
            .delete(format!("{url}?{sas}"))
            .header("x-ms-version", SAS_VERSION)
            .send()
            .map_err(|e| TicketDocError::backend_write(format!("azure DELETE {url}: {e}")))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => {
                tracing::info!(%url, "deleted azure blob");
                Ok(true)
            }
            s => Err(TicketDocError::backend_write(format!(
                "azure DELETE {url} returned {s}"
            ))),
        }
    }

    fn owns(&self, reference: &AssetReference) -> bool {
        reference
            .host()
            .zip(self.endpoint.host_str())
            .is_some_and(|(h, ours)| h.eq_ignore_ascii_case(ours))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/azure.rs"]
mod tests;
