//! HTML views
//!
//! The three pages of the browser, rendered with minijinja from templates
//! compiled into the binary. `.html` templates are auto-escaped.

use crate::catalog::CrdSchemaView;
use crate::domain::CrdRecord;
use crate::error::Result;
use minijinja::{context, Environment};
use std::collections::BTreeSet;

const INDEX: &str = "index.html";
const CRD_SELECT_BOX: &str = "crd-select-box.html";
const CRD_PROPERTIES: &str = "crd-properties.html";

/// Template environment for the browser pages
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(INDEX, include_str!("../../templates/index.html"))?;
        env.add_template(CRD_SELECT_BOX, include_str!("../../templates/crd-select-box.html"))?;
        env.add_template(CRD_PROPERTIES, include_str!("../../templates/crd-properties.html"))?;
        Ok(Self { env })
    }

    /// Landing page with the API group selector
    pub fn index(&self, source: &str, api_groups: &BTreeSet<String>) -> Result<String> {
        let template = self.env.get_template(INDEX)?;
        Ok(template.render(context! { source, api_groups })?)
    }

    /// CRD selector for one API group
    pub fn crd_select_box(&self, api_group: &str, crds: &[CrdRecord]) -> Result<String> {
        let template = self.env.get_template(CRD_SELECT_BOX)?;
        Ok(template.render(context! { api_group, crds })?)
    }

    /// Rendered schema tree of a CRD
    pub fn crd_properties(&self, view: &CrdSchemaView) -> Result<String> {
        let template = self.env.get_template(CRD_PROPERTIES)?;
        Ok(template.render(context! { view })?)
    }
}
