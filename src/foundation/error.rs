/// Convenience result type used across ticketdoc.
pub type TicketDocResult<T> = Result<T, TicketDocError>;

/// Top-level error taxonomy for storage and document generation.
///
/// Asset-level failures never surface through this type during generation: they are absorbed
/// as [`Unresolved`] and rendered as placeholders. Everything here means the artifact could not
/// be produced or stored correctly.
#[derive(thiserror::Error, Debug)]
pub enum TicketDocError {
    /// A backend was selected but the configuration needed to use it is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The file extension is outside the configured allow-set.
    #[error("unsupported asset type: '{extension}'")]
    UnsupportedAssetType {
        /// Lower-cased extension without the dot (empty when the name has none).
        extension: String,
    },

    /// Remote fetch failed (timeout, bad status, DNS, oversized body).
    #[error("network fetch error: {0}")]
    NetworkFetch(String),

    /// A remote write or delete was rejected or could not be sent.
    #[error("backend write error: {0}")]
    BackendWrite(String),

    /// Local filesystem write/delete failure.
    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// Failure while assembling or serializing the document itself.
    #[error("document build error: {0}")]
    DocumentBuild(String),

    /// Invalid caller-provided data (paths, references, request fields).
    #[error("validation error: {0}")]
    Validation(String),

    /// A remote reference whose host matches no configured backend.
    #[error("no configured backend owns host '{host}'")]
    UnknownBackend {
        /// Host parsed out of the reference URL.
        host: String,
    },

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TicketDocError {
    /// Build a [`TicketDocError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`TicketDocError::UnsupportedAssetType`] value.
    pub fn unsupported(extension: impl Into<String>) -> Self {
        Self::UnsupportedAssetType {
            extension: extension.into(),
        }
    }

    /// Build a [`TicketDocError::NetworkFetch`] value.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkFetch(msg.into())
    }

    /// Build a [`TicketDocError::BackendWrite`] value.
    pub fn backend_write(msg: impl Into<String>) -> Self {
        Self::BackendWrite(msg.into())
    }

    /// Build a [`TicketDocError::Filesystem`] value.
    pub fn filesystem(msg: impl Into<String>) -> Self {
        Self::Filesystem(msg.into())
    }

    /// Build a [`TicketDocError::DocumentBuild`] value.
    pub fn document(msg: impl Into<String>) -> Self {
        Self::DocumentBuild(msg.into())
    }

    /// Build a [`TicketDocError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TicketDocError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

/// Soft-failure marker for an asset that could not be resolved or decoded.
///
/// Callers branch on it and substitute a placeholder; it is never escalated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unresolved {
    /// Human-readable cause, used for logging only.
    pub reason: String,
}

impl Unresolved {
    /// Build an [`Unresolved`] marker from any displayable cause.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Unresolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unresolved: {}", self.reason)
    }
}

impl From<TicketDocError> for Unresolved {
    fn from(err: TicketDocError) -> Self {
        Self::new(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
