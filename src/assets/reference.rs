use chrono::{DateTime, Utc};
use reqwest::Url;

use crate::foundation::error::{TicketDocError, TicketDocResult};

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
/// Immutable pointer to previously stored binary content.
///
/// Textual forms:
/// - local: `/<upload-prefix>/<folder>/<unique-name>.<ext>` (any non-URL string is local)
/// - remote: `https://<host>/<container>/<folder>/<unique-name>.<ext>[?<access-token>]`
pub enum AssetReference {
    /// Path relative to the local upload root.
    Local { path: String },
    /// Absolute URL, possibly carrying a time-bounded access token in its query.
    Remote {
        url: String,
        expires_at: Option<DateTime<Utc>>,
    },
}

impl AssetReference {
    /// Parse a stored reference string. URLs (`http://`, `https://`) are remote.
    pub fn parse(raw: &str) -> TicketDocResult<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(TicketDocError::validation("asset reference must be non-empty"));
        }
        if !is_url(s) {
            return Ok(Self::Local {
                path: s.to_string(),
            });
        }

        let url = Url::parse(s)
            .map_err(|e| TicketDocError::validation(format!("invalid reference url '{s}': {e}")))?;
        if url.host_str().is_none() {
            return Err(TicketDocError::validation(format!(
                "reference url '{s}' has no host"
            )));
        }
        let expires_at = url
            .query_pairs()
            .find(|(k, _)| k == "se")
            .and_then(|(_, v)| DateTime::parse_from_rfc3339(&v).ok())
            .map(|t| t.with_timezone(&Utc));
        Ok(Self::Remote {
            url: s.to_string(),
            expires_at,
        })
    }

    pub fn local(path: impl Into<String>) -> Self {
        Self::Local { path: path.into() }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AssetReference::Local { path } => path,
            AssetReference::Remote { url, .. } => url,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, AssetReference::Remote { .. })
    }

    /// Host of a remote reference (lower-cased), `None` for local ones.
    pub fn host(&self) -> Option<String> {
        match self {
            AssetReference::Local { .. } => None,
            AssetReference::Remote { url, .. } => Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_ascii_lowercase)),
        }
    }

    /// Decoded path segments of a remote reference, with any access-token query dropped.
    pub fn remote_segments(&self) -> Option<Vec<String>> {
        let AssetReference::Remote { url, .. } = self else {
            return None;
        };
        let url = Url::parse(url).ok()?;
        let segments = url
            .path_segments()?
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s)
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
            .collect();
        Some(segments)
    }

    /// Whether a remote access token has expired at `now`. References without a known expiry
    /// never report expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            AssetReference::Remote {
                expires_at: Some(t),
                ..
            } => *t <= now,
            _ => false,
        }
    }
}

/// `deserialize_with` target for optional reference fields: blank or malformed strings
/// become `None` (with a warning) instead of failing the whole document.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<AssetReference>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = <Option<String> as serde::Deserialize>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| {
        if raw.trim().is_empty() {
            return None;
        }
        match AssetReference::parse(&raw) {
            Ok(reference) => Some(reference),
            Err(err) => {
                tracing::warn!(reference = %raw, error = %err, "ignoring malformed asset reference");
                None
            }
        }
    }))
}

fn is_url(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl std::fmt::Display for AssetReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssetReference {
    type Err = TicketDocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AssetReference {
    type Error = TicketDocError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AssetReference> for String {
    fn from(value: AssetReference) -> Self {
        match value {
            AssetReference::Local { path } => path,
            AssetReference::Remote { url, .. } => url,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/reference.rs"]
mod tests;
