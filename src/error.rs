//! Error types for crd-viz
//!
//! Every failure the catalog, the cluster sources and the web layer can
//! surface. None of them terminate the server; handlers map them to a status
//! code via [`Error::status_code`].

use thiserror::Error;

/// Unified error type
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Cluster Errors
    // =========================================================================
    /// Cluster unreachable, TLS failure or unusable credentials
    #[error("Cluster unreachable: {0}")]
    Connectivity(String),

    /// The API server answered but rejected the request
    #[error("Kubernetes API rejected the request ({code} {reason}): {message}")]
    RemoteApi {
        code: u16,
        reason: String,
        message: String,
    },

    /// The API server answered with a body that is not a CRD list
    #[error("Undecodable API response: {0}")]
    Decode(String),

    /// Work abandoned because the server is shutting down
    #[error("Request cancelled")]
    Cancelled,

    // =========================================================================
    // Catalog Errors
    // =========================================================================
    #[error("Invalid selection: {0}")]
    Validation(String),

    #[error("CustomResourceDefinition not found: {name}")]
    NotFound { name: String },

    #[error("No usable storage schema for {name}: {reason}")]
    SchemaUnavailable { name: String, reason: String },

    // =========================================================================
    // Local Errors
    // =========================================================================
    #[error("Invalid CRD manifest {path}: {reason}")]
    InvalidManifest { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => Error::RemoteApi {
                code: resp.code,
                reason: resp.reason,
                message: resp.message,
            },
            kube::Error::SerdeError(e) => Error::Decode(e.to_string()),
            kube::Error::FromUtf8(e) => Error::Decode(e.to_string()),
            other => Error::Connectivity(other.to_string()),
        }
    }
}

impl Error {
    /// HTTP status a handler should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound { .. } => 404,
            Error::SchemaUnavailable { .. } => 422,
            Error::RemoteApi { .. } | Error::Decode(_) => 502,
            Error::Connectivity(_) | Error::Cancelled => 503,
            _ => 500,
        }
    }

    /// Short machine-readable error code used in JSON bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::Connectivity(_) => "cluster_unreachable",
            Error::RemoteApi { .. } => "remote_api_error",
            Error::Decode(_) => "decode_error",
            Error::Cancelled => "cancelled",
            Error::Validation(_) => "validation_error",
            Error::NotFound { .. } => "not_found",
            Error::SchemaUnavailable { .. } => "schema_unavailable",
            Error::InvalidManifest { .. } => "invalid_manifest",
            Error::Configuration(_) => "configuration_error",
            Error::Template(_) => "template_error",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether the same request may succeed later without operator action
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Connectivity(_) | Error::Cancelled)
            || matches!(self, Error::RemoteApi { code, .. } if *code == 429 || *code >= 500)
    }

    /// Whether the caller supplied a bad selector or asked for something absent
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Result type alias for crd-viz
pub type Result<T> = std::result::Result<T, Error>;
