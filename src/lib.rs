//! crd-viz - Kubernetes CRD browser
//!
//! Lists the API groups owning CustomResourceDefinitions, the CRDs of a
//! group, and renders the OpenAPI schema of a CRD's storage version as a
//! navigable tree.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 Web (axum + minijinja)                    │
//! │       /  /filter  /show  /api/v1/...  /metrics            │
//! └─────────────────────────────┬─────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┴─────────────────────────────┐
//! │                       CRD Catalog                         │
//! │   groups · CRDs by group · storage schema · render        │
//! └──────────────┬──────────────────────────────┬─────────────┘
//!                │                              │
//! ┌──────────────┴──────────────┐ ┌─────────────┴─────────────┐
//! │   Cluster Metadata Client   │ │   Schema Tree Renderer    │
//! │ kube · manifests · static   │ │   depth-bounded, sorted   │
//! └─────────────────────────────┘ └───────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cluster`]: CRD sources (API server, manifest directory, static)
//! - [`catalog`]: group/CRD listings and storage-schema resolution
//! - [`schema`]: schema node model and renderer
//! - [`web`]: HTTP routes, views and metrics
//! - [`domain`]: CRD records and the source port
//! - [`error`]: Error types and handling

pub mod catalog;
pub mod cluster;
pub mod domain;
pub mod error;
pub mod schema;
pub mod web;

// Re-export commonly used types
pub use catalog::{CrdCatalog, CrdSchemaView};

pub use cluster::{ClusterConfig, FileCrdSource, KubeCrdSource, StaticCrdSource};

pub use domain::ports::{CrdRecord, CrdScope, CrdSource, CrdSourceRef, CrdVersion};

pub use error::{Error, Result};

pub use schema::{
    FieldKind, RenderedField, ScalarType, SchemaKind, SchemaNode, SchemaRenderer,
    MAX_RENDER_DEPTH,
};

pub use web::{ServerConfig, WebServer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
