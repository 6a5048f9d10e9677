//! Schema Tree Renderer
//!
//! Turns a [`SchemaNode`] into a presentation-ready [`RenderedField`] tree.
//! Object properties come out in ascending name order, array element schemas
//! appear as a single synthetic `[]` child, and recursion stops at a fixed
//! depth ceiling with a truncation marker in place of the deeper levels.

use super::node::{SchemaKind, SchemaNode, MAX_SCHEMA_DEPTH};
use serde::Serialize;

/// Default depth ceiling for rendering
pub const MAX_RENDER_DEPTH: usize = 32;

/// Field name of the synthetic array element child
pub const ITEMS_FIELD_NAME: &str = "[]";

/// Field name of the truncation marker
pub const TRUNCATED_FIELD_NAME: &str = "…";

// =============================================================================
// Rendered Field
// =============================================================================

/// What a rendered field stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// A named property (or the root)
    Field,
    /// The element schema of an array
    Items,
    /// Placeholder for levels beyond the depth ceiling
    Truncated,
}

/// Presentation-ready view of one schema node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedField {
    pub field_name: String,
    /// Dotted path from the root, for display
    pub path: String,
    /// Unique HTML id; distinct paths never share one
    pub anchor: String,
    pub kind: FieldKind,
    /// Type plus nullability, e.g. "string (nullable)"
    pub type_label: String,
    pub description: Option<String>,
    pub is_required: bool,
    pub format: Option<String>,
    pub enum_values: Vec<String>,
    pub default: Option<String>,
    pub preserve_unknown_fields: bool,
    pub children: Vec<RenderedField>,
}

impl RenderedField {
    fn truncated(parent_path: &str, parent_anchor: &str) -> Self {
        Self {
            field_name: TRUNCATED_FIELD_NAME.to_string(),
            path: join_path(parent_path, TRUNCATED_FIELD_NAME),
            anchor: join_anchor(parent_anchor, TRUNCATED_FIELD_NAME),
            kind: FieldKind::Truncated,
            type_label: "truncated".to_string(),
            description: Some("Nesting exceeds the rendering depth limit".to_string()),
            is_required: false,
            format: None,
            enum_values: Vec::new(),
            default: None,
            preserve_unknown_fields: false,
            children: Vec::new(),
        }
    }

    /// Whether a truncation marker appears anywhere in this subtree
    pub fn is_truncated(&self) -> bool {
        self.kind == FieldKind::Truncated || self.children.iter().any(|c| c.is_truncated())
    }

    /// Number of fields in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(|c| c.count()).sum::<usize>()
    }

    /// Deepest level below this field (0 for a leaf)
    pub fn height(&self) -> usize {
        self.children.iter().map(|c| c.height() + 1).max().unwrap_or(0)
    }

}

#[cfg(test)]
impl RenderedField {
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn child(&self, name: &str) -> Option<&RenderedField> {
        self.children.iter().find(|c| c.field_name == name)
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// Depth-bounded schema renderer
#[derive(Debug, Clone, Copy)]
pub struct SchemaRenderer {
    max_depth: usize,
}

impl Default for SchemaRenderer {
    fn default() -> Self {
        Self {
            max_depth: MAX_RENDER_DEPTH,
        }
    }
}

impl SchemaRenderer {
    /// Renderer with the default depth ceiling
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer with a custom ceiling, kept below the conversion limit
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.min(MAX_SCHEMA_DEPTH - 1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Render the root of a schema
    pub fn render_root(&self, node: &SchemaNode, field_name: &str) -> RenderedField {
        self.render(node, field_name, false, 0)
    }

    /// Render `node` as the field `field_name` found at `depth`.
    pub fn render(
        &self,
        node: &SchemaNode,
        field_name: &str,
        required_by_parent: bool,
        depth: usize,
    ) -> RenderedField {
        let parent = Parent { path: "", anchor: "" };
        self.render_at(node, field_name, parent, FieldKind::Field, required_by_parent, depth)
    }

    fn render_at(
        &self,
        node: &SchemaNode,
        field_name: &str,
        parent: Parent<'_>,
        kind: FieldKind,
        required_by_parent: bool,
        depth: usize,
    ) -> RenderedField {
        let path = join_path(parent.path, field_name);
        let anchor = join_anchor(parent.anchor, field_name);

        // Cut while decoding, or at the ceiling
        let children = if node.truncated || (depth >= self.max_depth && node.has_children()) {
            vec![RenderedField::truncated(&path, &anchor)]
        } else {
            let here = Parent {
                path: &path,
                anchor: &anchor,
            };
            self.render_children(node, here, depth)
        };

        RenderedField {
            field_name: field_name.to_string(),
            kind,
            type_label: type_label(node),
            description: node.description.clone(),
            is_required: required_by_parent,
            format: node.format.clone(),
            enum_values: node.enum_values.clone(),
            default: node.default.clone(),
            preserve_unknown_fields: node.preserve_unknown_fields,
            children,
            path,
            anchor,
        }
    }

    fn render_children(
        &self,
        node: &SchemaNode,
        parent: Parent<'_>,
        depth: usize,
    ) -> Vec<RenderedField> {
        match &node.kind {
            SchemaKind::Object {
                properties: Some(properties),
                required,
            } => properties
                .iter()
                .map(|(name, child)| {
                    self.render_at(
                        child,
                        name,
                        parent,
                        FieldKind::Field,
                        required.contains(name),
                        depth + 1,
                    )
                })
                .collect(),
            SchemaKind::Array { items: Some(items) } => vec![self.render_at(
                items,
                ITEMS_FIELD_NAME,
                parent,
                FieldKind::Items,
                false,
                depth + 1,
            )],
            _ => Vec::new(),
        }
    }
}

/// Human-readable type of a node, with nullability
pub fn type_label(node: &SchemaNode) -> String {
    let name = node.kind.type_name();
    if node.nullable {
        format!("{} (nullable)", name)
    } else {
        name
    }
}

/// Path and anchor of the field being expanded
#[derive(Clone, Copy)]
struct Parent<'a> {
    path: &'a str,
    anchor: &'a str,
}

/// Append `name` to an HTML id. Bytes outside `[A-Za-z0-9_]` become `-xx`
/// hex escapes and levels are joined with `--`, so the mapping is injective.
fn join_anchor(parent: &str, name: &str) -> String {
    let mut anchor = String::with_capacity(parent.len() + name.len() + 2);
    if !parent.is_empty() {
        anchor.push_str(parent);
        anchor.push_str("--");
    }
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            anchor.push(byte as char);
        } else {
            anchor.push_str(&format!("-{:02x}", byte));
        }
    }
    anchor
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}
