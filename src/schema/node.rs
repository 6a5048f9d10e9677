//! Schema node model
//!
//! A CRD's OpenAPI v3 schema reduced to what the renderer walks: objects
//! with named child schemas, arrays with one element schema, and scalars.
//! The shape is dispatched on a single discriminant ([`SchemaKind`]) so each
//! branch only carries the fields that make sense for it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Maximum nesting kept when converting untrusted schema documents
pub const MAX_SCHEMA_DEPTH: usize = 256;

// =============================================================================
// Schema Node
// =============================================================================

/// One node of a schema tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    /// Structural kind and kind-specific children
    pub kind: SchemaKind,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether null is accepted in addition to the type
    #[serde(default)]
    pub nullable: bool,
    /// Format hint (e.g. "date-time", "int32")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Allowed values, as compact JSON text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    /// Default value, as compact JSON text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// x-kubernetes-preserve-unknown-fields
    #[serde(default)]
    pub preserve_unknown_fields: bool,
    /// Children were dropped because the document nested past the decode
    /// or conversion limit
    #[serde(default)]
    pub truncated: bool,
}

/// Structural kind of a schema node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SchemaKind {
    /// Object, or a node whose type is unset
    Object {
        /// Named child schemas; `None` for an open, free-form object
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<BTreeMap<String, SchemaNode>>,
        /// Names of required properties on this level
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        required: BTreeSet<String>,
    },
    /// Array with an optional element schema
    Array {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items: Option<Box<SchemaNode>>,
    },
    /// Leaf value
    Scalar { scalar: ScalarType },
}

impl Default for SchemaKind {
    fn default() -> Self {
        SchemaKind::Object {
            properties: None,
            required: BTreeSet::new(),
        }
    }
}

/// Scalar types, including the Kubernetes int-or-string union
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarType {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    IntOrString,
    /// Any type name the schema uses that is not part of OpenAPI v3
    Other(String),
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarType::String => write!(f, "string"),
            ScalarType::Number => write!(f, "number"),
            ScalarType::Integer => write!(f, "integer"),
            ScalarType::Boolean => write!(f, "boolean"),
            ScalarType::Null => write!(f, "null"),
            ScalarType::IntOrString => write!(f, "int-or-string"),
            ScalarType::Other(name) => write!(f, "{}", name),
        }
    }
}

impl SchemaKind {
    /// Map an OpenAPI `type` value onto a kind with no children yet.
    ///
    /// An unset type is an object; `int_or_string` wins over the type name.
    pub fn from_type_name(type_name: Option<&str>, int_or_string: bool) -> Self {
        if int_or_string {
            return SchemaKind::Scalar {
                scalar: ScalarType::IntOrString,
            };
        }

        let scalar = match type_name {
            None | Some("") | Some("object") => return SchemaKind::default(),
            Some("array") => return SchemaKind::Array { items: None },
            Some("string") => ScalarType::String,
            Some("number") => ScalarType::Number,
            Some("integer") => ScalarType::Integer,
            Some("boolean") => ScalarType::Boolean,
            Some("null") => ScalarType::Null,
            Some(other) => ScalarType::Other(other.to_string()),
        };
        SchemaKind::Scalar { scalar }
    }

    /// Type name as shown to users
    pub fn type_name(&self) -> String {
        match self {
            SchemaKind::Object { .. } => "object".to_string(),
            SchemaKind::Array { .. } => "array".to_string(),
            SchemaKind::Scalar { scalar } => scalar.to_string(),
        }
    }
}

impl SchemaNode {
    /// Node of the given kind with no annotations
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Scalar leaf
    pub fn scalar(scalar: ScalarType) -> Self {
        Self::new(SchemaKind::Scalar { scalar })
    }

    /// String leaf
    pub fn string() -> Self {
        Self::scalar(ScalarType::String)
    }

    /// Integer leaf
    pub fn integer() -> Self {
        Self::scalar(ScalarType::Integer)
    }

    /// Boolean leaf
    pub fn boolean() -> Self {
        Self::scalar(ScalarType::Boolean)
    }

    /// Object with the given properties and required names
    pub fn object<I, S>(properties: BTreeMap<String, SchemaNode>, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SchemaKind::Object {
            properties: Some(properties),
            required: required.into_iter().map(Into::into).collect(),
        })
    }

    /// Free-form object without declared properties
    pub fn open_object() -> Self {
        Self::new(SchemaKind::default())
    }

    /// Array of the given element schema
    pub fn array(items: SchemaNode) -> Self {
        Self::new(SchemaKind::Array {
            items: Some(Box::new(items)),
        })
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the node nullable
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Whether the renderer would descend into this node
    pub fn has_children(&self) -> bool {
        match &self.kind {
            SchemaKind::Object { properties, .. } => {
                properties.as_ref().is_some_and(|p| !p.is_empty())
            }
            SchemaKind::Array { items } => items.is_some(),
            SchemaKind::Scalar { .. } => false,
        }
    }

    /// Check if a property on this level is required
    pub fn is_required(&self, name: &str) -> bool {
        match &self.kind {
            SchemaKind::Object { required, .. } => required.contains(name),
            _ => false,
        }
    }
}

#[cfg(test)]
impl SchemaNode {
    /// Get a nested property by dot-separated path; `[]` steps into array items
    pub(crate) fn get_nested(&self, path: &str) -> Option<&SchemaNode> {
        let mut current = self;
        for part in path.split('.') {
            current = match (&current.kind, part) {
                (SchemaKind::Array { items }, "[]") => items.as_deref()?,
                (SchemaKind::Object { properties, .. }, _) => properties.as_ref()?.get(part)?,
                _ => return None,
            };
        }
        Some(current)
    }
}
