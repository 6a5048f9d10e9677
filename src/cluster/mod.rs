//! Cluster Metadata Client
//!
//! Adapters implementing [`CrdSource`]:
//! - [`KubeCrdSource`]: live API server
//! - [`FileCrdSource`]: CRD manifests on disk
//! - [`StaticCrdSource`]: a fixed record set
//!
//! Live list bodies are decoded by [`decode_crd_list`].

pub mod client;
pub mod convert;
pub mod decode;
pub mod file;

pub use client::*;
pub use convert::{crd_record, schema_node};
pub use decode::{decode_crd_list, MAX_DECODE_DEPTH};
pub use file::*;

use crate::domain::{CrdRecord, CrdSource};
use crate::error::Result;
use async_trait::async_trait;

/// CRD source serving a fixed set of records
#[derive(Debug, Clone, Default)]
pub struct StaticCrdSource {
    records: Vec<CrdRecord>,
}

impl StaticCrdSource {
    pub fn new(records: Vec<CrdRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl CrdSource for StaticCrdSource {
    async fn fetch_all_crds(&self) -> Result<Vec<CrdRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("{} static records", self.records.len())
    }
}
