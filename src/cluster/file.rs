//! Offline CRD source
//!
//! Reads CRD manifests (`*.yaml` / `*.yml`, multi-document) from a directory
//! tree so the browser works against a checkout of manifests without a
//! cluster. Documents of any other kind are skipped.

use super::convert::crd_record;
use crate::domain::{CrdRecord, CrdSource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CRD_KIND: &str = "CustomResourceDefinition";

/// CRD source reading manifests from disk
#[derive(Debug, Clone)]
pub struct FileCrdSource {
    dir: PathBuf,
}

impl FileCrdSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn manifest_paths(&self) -> Result<Vec<PathBuf>> {
        let pattern = format!("{}/**/*.y*ml", self.dir.display());
        let entries = glob::glob(&pattern)
            .map_err(|e| Error::Configuration(format!("invalid CRD directory: {}", e)))?;

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable path: {}", e),
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Parse every CRD document in a (possibly multi-document) YAML manifest
pub fn parse_manifest(path: &Path, content: &str) -> Result<Vec<CrdRecord>> {
    let invalid = |reason: String| Error::InvalidManifest {
        path: path.display().to_string(),
        reason,
    };

    let mut records = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(document).map_err(|e| invalid(e.to_string()))?;
        if value.get("kind").and_then(|k| k.as_str()) != Some(CRD_KIND) {
            continue;
        }

        let crd: CustomResourceDefinition =
            serde_yaml::from_value(value).map_err(|e| invalid(e.to_string()))?;
        records.push(crd_record(&crd));
    }
    Ok(records)
}

#[async_trait]
impl CrdSource for FileCrdSource {
    async fn fetch_all_crds(&self) -> Result<Vec<CrdRecord>> {
        // Fails with NotFound before globbing an absent directory
        tokio::fs::metadata(&self.dir).await?;

        let mut seen = BTreeSet::new();
        let mut records = Vec::new();
        for path in self.manifest_paths()? {
            let content = tokio::fs::read_to_string(&path).await?;
            for record in parse_manifest(&path, &content)? {
                if seen.insert(record.name.clone()) {
                    records.push(record);
                } else {
                    warn!("Duplicate CRD {} in {}, keeping the first", record.name, path.display());
                }
            }
        }

        debug!("Loaded {} CRDs from {}", records.len(), self.dir.display());
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("manifests in {}", self.dir.display())
    }
}
