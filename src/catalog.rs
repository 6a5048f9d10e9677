//! CRD Catalog
//!
//! Group listings, group-filtered CRD listings and storage-schema resolution
//! over a fresh snapshot from a [`CrdSource`]. Nothing is cached: every
//! operation fetches again.

use crate::domain::{CrdRecord, CrdScope, CrdSourceRef, CrdVersion};
use crate::error::{Error, Result};
use crate::schema::{RenderedField, SchemaNode, SchemaRenderer};
use serde::Serialize;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

// =============================================================================
// Pure operations over a record set
// =============================================================================

/// Distinct API groups across all records
pub fn api_groups(records: &[CrdRecord]) -> BTreeSet<String> {
    records.iter().map(|r| r.group.clone()).collect()
}

/// Records of exactly `group`, ordered by name
pub fn crds_in_group(records: &[CrdRecord], group: &str) -> Result<Vec<CrdRecord>> {
    require_selector(group, "No API group selected")?;

    let mut crds: Vec<CrdRecord> = records
        .iter()
        .filter(|r| r.group == group)
        .cloned()
        .collect();
    crds.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(crds)
}

/// Record, storage version and schema root of `crd_name`
pub fn storage_version<'a>(
    records: &'a [CrdRecord],
    crd_name: &str,
) -> Result<(&'a CrdRecord, &'a CrdVersion, &'a SchemaNode)> {
    require_selector(crd_name, "No CRD selected")?;

    let record = records
        .iter()
        .find(|r| r.name == crd_name)
        .ok_or_else(|| Error::NotFound {
            name: crd_name.to_string(),
        })?;

    let unavailable = |reason: String| Error::SchemaUnavailable {
        name: crd_name.to_string(),
        reason,
    };

    let mut storage = record.storage_versions();
    let version = match (storage.next(), storage.next()) {
        (Some(version), None) => version,
        (None, _) => return Err(unavailable("no version is marked as storage".into())),
        (Some(_), Some(_)) => {
            return Err(unavailable("more than one version is marked as storage".into()))
        }
    };

    let schema = version
        .schema
        .as_ref()
        .ok_or_else(|| unavailable(format!("storage version {} has no schema", version.name)))?;
    Ok((record, version, schema))
}

/// Schema root of the single storage version of `crd_name`
pub fn storage_schema(records: &[CrdRecord], crd_name: &str) -> Result<SchemaNode> {
    storage_version(records, crd_name).map(|(_, _, schema)| schema.clone())
}

fn require_selector(value: &str, message: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(message.to_string()));
    }
    Ok(())
}

// =============================================================================
// Catalog
// =============================================================================

/// A rendered storage schema together with the CRD it belongs to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdSchemaView {
    pub name: String,
    pub group: String,
    pub kind: String,
    pub scope: CrdScope,
    /// Storage version the schema was taken from
    pub version: String,
    /// Rendered fields, including the root
    pub field_count: usize,
    /// Whether any level was cut at the depth limit
    pub truncated: bool,
    pub root: RenderedField,
}

/// Catalog over a CRD source
#[derive(Clone)]
pub struct CrdCatalog {
    source: CrdSourceRef,
    renderer: SchemaRenderer,
    cancel: CancellationToken,
}

impl CrdCatalog {
    pub fn new(source: CrdSourceRef) -> Self {
        Self {
            source,
            renderer: SchemaRenderer::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a specific renderer (e.g. a different depth ceiling)
    pub fn with_renderer(mut self, renderer: SchemaRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Abandon remote calls once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    pub fn renderer(&self) -> &SchemaRenderer {
        &self.renderer
    }

    /// Whether the catalog stopped accepting work
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn fetch(&self) -> Result<Vec<CrdRecord>> {
        let records = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            result = self.source.fetch_all_crds() => result?,
        };
        debug!("Fetched {} CRD records", records.len());
        Ok(records)
    }

    /// Distinct API groups owning CRDs
    #[instrument(skip(self))]
    pub async fn list_api_groups(&self) -> Result<BTreeSet<String>> {
        Ok(api_groups(&self.fetch().await?))
    }

    /// CRDs of one API group; an empty group is rejected without fetching
    #[instrument(skip(self))]
    pub async fn list_crds(&self, group: &str) -> Result<Vec<CrdRecord>> {
        require_selector(group, "No API group selected")?;
        crds_in_group(&self.fetch().await?, group)
    }

    /// Storage-version schema root of a CRD
    #[instrument(skip(self))]
    pub async fn resolve_storage_schema(&self, crd_name: &str) -> Result<SchemaNode> {
        require_selector(crd_name, "No CRD selected")?;
        storage_schema(&self.fetch().await?, crd_name)
    }

    /// Resolve and render the storage schema, rooted at the CRD name
    pub async fn show_schema(&self, crd_name: &str) -> Result<RenderedField> {
        let schema = self.resolve_storage_schema(crd_name).await?;
        Ok(self.renderer.render_root(&schema, crd_name))
    }

    /// Like [`show_schema`](Self::show_schema), keeping the CRD's identity
    #[instrument(skip(self))]
    pub async fn describe(&self, crd_name: &str) -> Result<CrdSchemaView> {
        require_selector(crd_name, "No CRD selected")?;
        let records = self.fetch().await?;
        let (record, version, schema) = storage_version(&records, crd_name)?;
        let root = self.renderer.render_root(schema, &record.name);
        debug!(
            "Rendered {} fields of {} (height {})",
            root.count(),
            record.name,
            root.height()
        );

        Ok(CrdSchemaView {
            name: record.name.clone(),
            group: record.group.clone(),
            kind: record.kind.clone(),
            scope: record.scope,
            version: version.name.clone(),
            field_count: root.count(),
            truncated: root.is_truncated(),
            root,
        })
    }
}
