//! CRD list decoding
//!
//! A list response is first split into raw items. Skipping over nested JSON
//! is iterative in serde_json, so no single CRD can fail the whole listing.
//! Each item then goes through the typed k8s-openapi decoder; an item nested
//! too deeply for it falls back to a summary decode with a depth-bounded
//! schema decoder, and an item that fails both is skipped.

use super::convert::crd_record;
use crate::domain::{CrdRecord, CrdScope, CrdVersion};
use crate::error::{Error, Result};
use crate::schema::{SchemaKind, SchemaNode};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use serde_json::value::RawValue;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// Schema levels kept by the bounded decoder. serde_json allows 128 nested
/// containers and one schema level takes at most two.
pub const MAX_DECODE_DEPTH: usize = 48;

// =============================================================================
// List and item decoding
// =============================================================================

#[derive(Deserialize)]
struct RawCrdList {
    #[serde(default)]
    items: Option<Vec<Box<RawValue>>>,
}

/// Decode a `CustomResourceDefinitionList` response body
pub fn decode_crd_list(body: &str) -> Result<Vec<CrdRecord>> {
    let list: RawCrdList = serde_json::from_str(body)
        .map_err(|e| Error::Decode(format!("CustomResourceDefinitionList: {}", e)))?;

    let items = list.items.unwrap_or_default();
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match decode_crd(item.get()) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping CRD #{} of the list: {}", index, e),
        }
    }
    Ok(records)
}

/// Decode one `CustomResourceDefinition` object
fn decode_crd(json: &str) -> Result<CrdRecord> {
    match serde_json::from_str::<CustomResourceDefinition>(json) {
        Ok(crd) => Ok(crd_record(&crd)),
        Err(typed) => {
            let record = decode_summary(json)
                .map_err(|e| Error::Decode(format!("{}; summary: {}", typed, e)))?;
            debug!(
                "Decoded {} with a depth-bounded schema ({})",
                record.name, typed
            );
            Ok(record)
        }
    }
}

// =============================================================================
// Summary fallback
// =============================================================================

#[derive(Deserialize)]
struct CrdSummary {
    #[serde(default)]
    metadata: SummaryMetadata,
    spec: SummarySpec,
}

#[derive(Default, Deserialize)]
struct SummaryMetadata {
    name: Option<String>,
}

#[derive(Deserialize)]
struct SummarySpec {
    group: String,
    names: SummaryNames,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    versions: Vec<SummaryVersion>,
}

#[derive(Deserialize)]
struct SummaryNames {
    kind: String,
    plural: String,
}

#[derive(Deserialize)]
struct SummaryVersion {
    name: String,
    #[serde(default)]
    served: bool,
    #[serde(default)]
    storage: bool,
    #[serde(default)]
    deprecated: bool,
    #[serde(default)]
    schema: Option<SummaryValidation>,
}

#[derive(Deserialize)]
struct SummaryValidation {
    #[serde(rename = "openAPIV3Schema", default)]
    open_api_v3_schema: Option<Box<RawValue>>,
}

fn decode_summary(json: &str) -> serde_json::Result<CrdRecord> {
    let CrdSummary { metadata, spec } = serde_json::from_str(json)?;

    let versions = spec
        .versions
        .into_iter()
        .map(|version| {
            let schema = match version.schema.and_then(|s| s.open_api_v3_schema) {
                Some(raw) => Some(bounded_schema(raw.get())?),
                None => None,
            };
            Ok(CrdVersion {
                name: version.name,
                served: version.served,
                storage: version.storage,
                deprecated: version.deprecated,
                schema,
            })
        })
        .collect::<serde_json::Result<Vec<_>>>()?;

    Ok(CrdRecord {
        name: metadata
            .name
            .unwrap_or_else(|| format!("{}.{}", spec.names.plural, spec.group)),
        group: spec.group,
        kind: spec.names.kind,
        plural: spec.names.plural,
        scope: CrdScope::parse(&spec.scope),
        versions,
    })
}

// =============================================================================
// Depth-bounded schema decoder
// =============================================================================

/// Decode an OpenAPI v3 schema document, keeping [`MAX_DECODE_DEPTH`] levels.
///
/// Deeper levels are skipped without recursion and the node where the cut
/// happened is flagged `truncated`.
fn bounded_schema(json: &str) -> serde_json::Result<SchemaNode> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    let node = BoundedSchema { depth: 0 }.deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(node)
}

/// Compact JSON text of a raw value
fn compact_json(raw: &RawValue) -> String {
    serde_json::from_str::<serde_json::Value>(raw.get())
        .map(|value| value.to_string())
        .unwrap_or_else(|_| raw.get().trim().to_string())
}

#[derive(Clone, Copy)]
struct BoundedSchema {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for BoundedSchema {
    type Value = SchemaNode;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<SchemaNode, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for BoundedSchema {
    type Value = SchemaNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an OpenAPI v3 schema object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<SchemaNode, A::Error>
    where
        A: MapAccess<'de>,
    {
        let descend = self.depth + 1 < MAX_DECODE_DEPTH;
        let child = BoundedSchema {
            depth: self.depth + 1,
        };

        let mut node = SchemaNode::default();
        let mut type_name: Option<String> = None;
        let mut int_or_string = false;
        let mut properties: Option<BTreeMap<String, SchemaNode>> = None;
        let mut items: Option<SchemaNode> = None;
        let mut required = BTreeSet::new();
        let mut cut = false;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "type" => type_name = map.next_value()?,
                "description" => node.description = map.next_value()?,
                "format" => node.format = map.next_value()?,
                "nullable" => node.nullable = map.next_value::<Option<bool>>()?.unwrap_or(false),
                "required" => {
                    required = map
                        .next_value::<Option<BTreeSet<String>>>()?
                        .unwrap_or_default()
                }
                "enum" => {
                    node.enum_values = map
                        .next_value::<Option<Vec<Box<RawValue>>>>()?
                        .unwrap_or_default()
                        .iter()
                        .map(|value| compact_json(value))
                        .collect()
                }
                "default" => {
                    node.default = map
                        .next_value::<Option<Box<RawValue>>>()?
                        .map(|value| compact_json(&value))
                }
                "x-kubernetes-int-or-string" => {
                    int_or_string = map.next_value::<Option<bool>>()?.unwrap_or(false)
                }
                "x-kubernetes-preserve-unknown-fields" => {
                    node.preserve_unknown_fields =
                        map.next_value::<Option<bool>>()?.unwrap_or(false)
                }
                "properties" if descend => {
                    properties = Some(map.next_value_seed(BoundedProperties { child })?)
                }
                "properties" => {
                    let names = map.next_value::<Option<BTreeMap<String, IgnoredAny>>>()?;
                    cut |= names.is_some_and(|names| !names.is_empty());
                }
                "items" if descend => items = map.next_value_seed(BoundedItems { child })?,
                "items" => {
                    cut |= map.next_value::<Option<IgnoredAny>>()?.is_some();
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        node.kind = match SchemaKind::from_type_name(type_name.as_deref(), int_or_string) {
            SchemaKind::Object { .. } => SchemaKind::Object {
                properties,
                required,
            },
            SchemaKind::Array { .. } => SchemaKind::Array {
                items: items.map(Box::new),
            },
            scalar => scalar,
        };
        node.truncated = cut && !matches!(node.kind, SchemaKind::Scalar { .. });
        Ok(node)
    }
}

/// `properties`: field name to child schema
struct BoundedProperties {
    child: BoundedSchema,
}

impl<'de> DeserializeSeed<'de> for BoundedProperties {
    type Value = BTreeMap<String, SchemaNode>;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for BoundedProperties {
    type Value = BTreeMap<String, SchemaNode>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of property schemas")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut properties = BTreeMap::new();
        while let Some(name) = map.next_key::<String>()? {
            let schema = map.next_value_seed(self.child)?;
            properties.insert(name, schema);
        }
        Ok(properties)
    }
}

/// `items`: one schema, or the tuple form whose first entry is used
struct BoundedItems {
    child: BoundedSchema,
}

impl<'de> DeserializeSeed<'de> for BoundedItems {
    type Value = Option<SchemaNode>;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for BoundedItems {
    type Value = Option<SchemaNode>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a schema or a list of schemas")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_map<A>(self, map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        self.child.visit_map(map).map(Some)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let first = seq.next_element_seed(self.child)?;
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ScalarType, SchemaRenderer, MAX_RENDER_DEPTH};
    use assert_matches::assert_matches;
    use serde_json::json;

    fn nested_schema(levels: usize) -> serde_json::Value {
        let mut schema = json!({ "type": "string" });
        for _ in 0..levels {
            schema = json!({ "type": "object", "properties": { "child": schema } });
        }
        schema
    }

    fn crd(name: &str, schema: serde_json::Value) -> serde_json::Value {
        let (plural, group) = name.split_once('.').unwrap();
        json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": { "name": name },
            "spec": {
                "group": group,
                "scope": "Namespaced",
                "names": { "kind": "Thing", "plural": plural },
                "versions": [{
                    "name": "v1",
                    "served": true,
                    "storage": true,
                    "schema": { "openAPIV3Schema": schema }
                }]
            }
        })
    }

    fn list(items: Vec<serde_json::Value>) -> String {
        json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinitionList",
            "metadata": {},
            "items": items
        })
        .to_string()
    }

    fn child_chain(schema: &SchemaNode) -> (usize, &SchemaNode) {
        let mut levels = 0;
        let mut node = schema;
        while let SchemaKind::Object {
            properties: Some(properties),
            ..
        } = &node.kind
        {
            node = &properties["child"];
            levels += 1;
        }
        (levels, node)
    }

    #[test]
    fn test_deep_crd_does_not_fail_the_list() {
        let body = list(vec![
            crd("deeps.example.com", nested_schema(70)),
            crd("widgets.example.com", nested_schema(2)),
        ]);

        let records = decode_crd_list(&body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "deeps.example.com");
        assert_eq!(records[0].group, "example.com");

        let deep = records[0].versions[0].schema.as_ref().unwrap();
        let (levels, cut) = child_chain(deep);
        assert_eq!(levels, MAX_DECODE_DEPTH - 1);
        assert!(cut.truncated);

        let root = SchemaRenderer::new().render_root(deep, "deeps.example.com");
        assert!(root.is_truncated());
        assert_eq!(root.height(), MAX_RENDER_DEPTH + 1);

        let shallow = records[1].versions[0].schema.as_ref().unwrap();
        assert_eq!(child_chain(shallow).0, 2);
        assert!(!shallow.truncated);
    }

    #[test]
    fn test_bounded_decode_keeps_annotations() {
        let schema = bounded_schema(
            &json!({
                "type": "object",
                "required": ["size"],
                "properties": {
                    "size": { "type": "string", "enum": ["small", "large"], "default": "small" },
                    "port": { "x-kubernetes-int-or-string": true },
                    "labels": { "type": "array", "items": [{ "type": "integer" }, { "type": "string" }] },
                    "extra": {
                        "nullable": true,
                        "x-kubernetes-preserve-unknown-fields": true,
                        "additionalProperties": { "type": "string" }
                    }
                }
            })
            .to_string(),
        )
        .unwrap();

        assert!(schema.is_required("size"));
        let size = schema.get_nested("size").unwrap();
        assert_eq!(size.kind, SchemaKind::Scalar { scalar: ScalarType::String });
        assert_eq!(size.enum_values, vec!["\"small\"", "\"large\""]);
        assert_eq!(size.default.as_deref(), Some("\"small\""));

        let port = schema.get_nested("port").unwrap();
        assert_eq!(port.kind.type_name(), "int-or-string");

        assert_eq!(schema.get_nested("labels.[]"), Some(&SchemaNode::integer()));

        let extra = schema.get_nested("extra").unwrap();
        assert!(extra.nullable);
        assert!(extra.preserve_unknown_fields);
        assert!(!extra.has_children());
        assert!(!extra.truncated);
    }

    #[test]
    fn test_deep_arrays_are_cut() {
        let mut schema = json!({ "type": "string" });
        for _ in 0..200 {
            schema = json!({ "type": "array", "items": schema });
        }

        let node = bounded_schema(&schema.to_string()).unwrap();
        let mut levels = 0;
        let mut current = &node;
        while let SchemaKind::Array { items: Some(items) } = &current.kind {
            current = items;
            levels += 1;
        }
        assert_eq!(levels, MAX_DECODE_DEPTH - 1);
        assert!(current.truncated);
    }

    #[test]
    fn test_undecodable_items_are_skipped() {
        let body = list(vec![
            json!({ "kind": "CustomResourceDefinition", "metadata": { "name": "broken" } }),
            crd("widgets.example.com", nested_schema(1)),
        ]);

        let records = decode_crd_list(&body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "widgets.example.com");
    }

    #[test]
    fn test_malformed_list_is_decode_error() {
        assert_matches!(decode_crd_list("not json"), Err(Error::Decode(_)));
        assert!(decode_crd_list(r#"{"items": null}"#).unwrap().is_empty());
    }
}
