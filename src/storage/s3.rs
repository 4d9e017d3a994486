//! Amazon S3 backend, authenticated with AWS Signature Version 4.

use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};

use crate::{
    assets::reference::AssetReference,
    config::{BackendConfig, BackendKind, Credentials},
    foundation::error::{TicketDocError, TicketDocResult},
    storage::{
        backend::{ObjectKey, StorageBackend, remote_client},
        signing::{hex, hmac_sha256, sha256_hex},
    },
};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Objects under one bucket, addressed virtual-hosted style unless an endpoint override is set
/// (then path style: `<endpoint>/<bucket>/<key>`).
#[derive(Clone)]
pub struct S3Backend {
    access_key_id: String,
    secret_access_key: String,
    region: String,
    bucket: String,
    endpoint: Option<Url>,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    pub fn from_config(config: &BackendConfig) -> TicketDocResult<Self> {
        let Some(Credentials::S3 {
            access_key_id,
            secret_access_key,
            region,
        }) = &config.credentials
        else {
            return Err(TicketDocError::configuration(
                "s3 backend selected but no s3 credentials are configured",
            ));
        };
        if access_key_id.trim().is_empty() || secret_access_key.trim().is_empty() {
            return Err(TicketDocError::configuration("s3 access key pair is empty"));
        }
        let bucket = config.container.trim();
        if bucket.is_empty() {
            return Err(TicketDocError::configuration("s3 bucket is empty"));
        }
        let endpoint = config
            .endpoint
            .as_deref()
            .map(|ep| {
                Url::parse(ep.trim_end_matches('/'))
                    .map_err(|e| TicketDocError::configuration(format!("s3 endpoint '{ep}': {e}")))
            })
            .transpose()?;

        Ok(Self {
            access_key_id: access_key_id.trim().to_string(),
            secret_access_key: secret_access_key.trim().to_string(),
            region: if region.trim().is_empty() {
                "us-east-1".to_string()
            } else {
                region.trim().to_string()
            },
            bucket: bucket.to_string(),
            endpoint,
            client: remote_client(config)?,
        })
    }

    fn virtual_host(&self) -> String {
        format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
    }

    /// Unsigned URL of object `key`.
    pub fn object_url(&self, key: &str) -> TicketDocResult<Url> {
        let key: Vec<_> = key
            .split('/')
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        let raw = match &self.endpoint {
            Some(ep) => format!(
                "{}/{}/{}",
                ep.as_str().trim_end_matches('/'),
                self.bucket,
                key.join("/")
            ),
            None => format!("https://{}/{}", self.virtual_host(), key.join("/")),
        };
        Url::parse(&raw).map_err(|e| TicketDocError::validation(format!("object url '{raw}': {e}")))
    }

    /// Object key of a reference this bucket owns.
    pub fn object_key(&self, reference: &AssetReference) -> Option<String> {
        if !self.owns(reference) {
            return None;
        }
        let segments = reference.remote_segments()?;
        let skip = match &self.endpoint {
            Some(ep) => {
                let prefix: Vec<&str> = ep
                    .path_segments()
                    .map(|s| s.filter(|p| !p.is_empty()).collect())
                    .unwrap_or_default();
                let matches_prefix = segments.len() > prefix.len()
                    && segments.iter().zip(&prefix).all(|(a, b)| a.as_str() == *b)
                    && segments[prefix.len()] == self.bucket;
                if !matches_prefix {
                    return None;
                }
                prefix.len() + 1
            }
            None => 0,
        };
        let key = segments[skip..].join("/");
        (!key.is_empty()).then_some(key)
    }

    /// SigV4 headers for a request with no query string.
    ///
    /// Returns `(name, value)` pairs for `authorization`, `x-amz-content-sha256` and
    /// `x-amz-date`. `content_type`, when given, is part of the signed headers and must be sent
    /// unchanged.
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        content_type: Option<&str>,
        payload_sha256: &str,
        now: DateTime<Utc>,
    ) -> TicketDocResult<Vec<(&'static str, String)>> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let host = match url.port() {
            Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        let mut headers: Vec<(&str, &str)> = Vec::with_capacity(4);
        if let Some(ct) = content_type {
            headers.push(("content-type", ct));
        }
        headers.push(("host", host.as_str()));
        headers.push(("x-amz-content-sha256", payload_sha256));
        headers.push(("x-amz-date", amz_date.as_str()));

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{k}:{}\n", v.trim()))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(k, _)| *k)
            .collect::<Vec<_>>()
            .join(";");
        let canonical_request = format!(
            "{method}\n{}\n\n{canonical_headers}\n{signed_headers}\n{payload_sha256}",
            url.path()
        );

        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );

        let k_date = hmac_sha256(
            format!("AWS4{}", self.secret_access_key).as_bytes(),
            date.as_bytes(),
        )?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = hex(&hmac_sha256(&k_signing, string_to_sign.as_bytes())?);

        Ok(vec![
            (
                "authorization",
                format!(
                    "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                    self.access_key_id
                ),
            ),
            ("x-amz-content-sha256", payload_sha256.to_string()),
            ("x-amz-date", amz_date),
        ])
    }

    fn send_signed(
        &self,
        method: reqwest::Method,
        url: &Url,
        content_type: Option<&str>,
        body: Option<&[u8]>,
    ) -> TicketDocResult<reqwest::blocking::Response> {
        let payload_hash = sha256_hex(body.unwrap_or_default());
        let headers = self.sign(
            method.as_str(),
            url,
            content_type,
            &payload_hash,
            Utc::now(),
        )?;
        let mut request = self.client.request(method.clone(), url.clone());
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(ct) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, ct);
        }
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }
        request
            .send()
            .map_err(|e| TicketDocError::backend_write(format!("s3 {method} {url}: {e}")))
    }
}

impl StorageBackend for S3Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    #[tracing::instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    fn put(
        &self,
        key: &ObjectKey,
        bytes: &[u8],
        content_type: &str,
    ) -> TicketDocResult<AssetReference> {
        let url = self.object_url(&key.path())?;
        let response =
            self.send_signed(reqwest::Method::PUT, &url, Some(content_type), Some(bytes))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TicketDocError::backend_write(format!(
                "s3 PUT {url} returned {status}"
            )));
        }
        tracing::info!(%url, "stored asset in s3");
        AssetReference::parse(url.as_str())
    }

    fn delete(&self, reference: &AssetReference) -> TicketDocResult<bool> {
        let Some(key) = self.object_key(reference) else {
            return Err(TicketDocError::validation(format!(
                "'{reference}' is not an object of bucket '{}'",
                self.bucket
            )));
        };
        let url = self.object_url(&key)?;

        // S3 answers DELETE with 204 whether or not the key existed.
        let head = self.send_signed(reqwest::Method::HEAD, &url, None, None)?;
        match head.status() {
            StatusCode::NOT_FOUND => return Ok(false),
            s if !s.is_success() => {
                return Err(TicketDocError::backend_write(format!(
                    "s3 HEAD {url} returned {s}"
                )));
            }
            _ => {}
        }

        let response = self.send_signed(reqwest::Method::DELETE, &url, None, None)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TicketDocError::backend_write(format!(
                "s3 DELETE {url} returned {status}"
            )));
        }
        tracing::info!(%url, "deleted s3 object");
        Ok(true)
    }

    fn owns(&self, reference: &AssetReference) -> bool {
        let Some(host) = reference.host() else {
            return false;
        };
        match &self.endpoint {
            Some(ep) => ep
                .host_str()
                .is_some_and(|ours| host.eq_ignore_ascii_case(ours)),
            None => {
                host.eq_ignore_ascii_case(&self.virtual_host())
                    || host.eq_ignore_ascii_case(&format!("{}.s3.amazonaws.com", self.bucket))
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/s3.rs"]
mod tests;
