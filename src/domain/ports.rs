//! Domain Ports - records and the cluster metadata boundary
//!
//! The catalog only needs a snapshot of every registered CRD. Where that
//! snapshot comes from (a live API server, manifests on disk, a fixed set in
//! tests) is the concern of the [`CrdSource`] adapters.

use crate::error::Result;
use crate::schema::SchemaNode;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

// =============================================================================
// CRD Records
// =============================================================================

/// Resource scope of a CRD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum CrdScope {
    #[default]
    Namespaced,
    Cluster,
}

impl CrdScope {
    /// Parse the `spec.scope` value; anything but "Cluster" is namespaced
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("cluster") {
            Self::Cluster
        } else {
            Self::Namespaced
        }
    }
}

impl std::fmt::Display for CrdScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Namespaced => write!(f, "Namespaced"),
            Self::Cluster => write!(f, "Cluster"),
        }
    }
}

/// One served version of a CRD
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdVersion {
    /// Version name (e.g. "v1", "v1beta1")
    pub name: String,
    /// Whether the API server serves this version
    pub served: bool,
    /// Whether this is the version persisted in etcd
    pub storage: bool,
    /// Whether this version is deprecated
    pub deprecated: bool,
    /// Root of the OpenAPI v3 schema, if the version carries one
    #[serde(skip)]
    pub schema: Option<SchemaNode>,
}

/// A registered CustomResourceDefinition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdRecord {
    /// Full name (e.g. "widgets.example.com")
    pub name: String,
    /// API group (e.g. "example.com")
    pub group: String,
    /// Kind (e.g. "Widget")
    pub kind: String,
    /// Plural resource name
    pub plural: String,
    pub scope: CrdScope,
    pub versions: Vec<CrdVersion>,
}

impl CrdRecord {
    /// Versions flagged as storage; exactly one on a well-formed cluster
    pub fn storage_versions(&self) -> impl Iterator<Item = &CrdVersion> {
        self.versions.iter().filter(|v| v.storage)
    }
}

// =============================================================================
// Cluster Metadata Port
// =============================================================================

/// Port for reading the CRDs currently registered in a cluster
#[async_trait]
pub trait CrdSource: Send + Sync {
    /// Fetch every CRD record. No caching, no retries.
    async fn fetch_all_crds(&self) -> Result<Vec<CrdRecord>>;

    /// Short description of where records come from, for logs
    fn describe(&self) -> String;
}

pub type CrdSourceRef = Arc<dyn CrdSource>;
