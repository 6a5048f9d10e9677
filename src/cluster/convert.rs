//! Conversion from apiextensions/v1 types into domain records
//!
//! Schema documents come from cluster storage and are not trusted: the
//! conversion never fails, and nesting beyond [`MAX_SCHEMA_DEPTH`] is cut off
//! with the cut recorded on the node, so rendering still shows a marker.

use crate::domain::{CrdRecord, CrdScope, CrdVersion};
use crate::schema::{SchemaKind, SchemaNode, MAX_SCHEMA_DEPTH};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionVersion, JSONSchemaProps,
    JSONSchemaPropsOrArray,
};

/// Convert a CRD object into a record
pub fn crd_record(crd: &CustomResourceDefinition) -> CrdRecord {
    let spec = &crd.spec;
    let name = crd
        .metadata
        .name
        .clone()
        .unwrap_or_else(|| format!("{}.{}", spec.names.plural, spec.group));

    CrdRecord {
        name,
        group: spec.group.clone(),
        kind: spec.names.kind.clone(),
        plural: spec.names.plural.clone(),
        scope: CrdScope::parse(&spec.scope),
        versions: spec.versions.iter().map(crd_version).collect(),
    }
}

fn crd_version(version: &CustomResourceDefinitionVersion) -> CrdVersion {
    let schema = version
        .schema
        .as_ref()
        .and_then(|validation| validation.open_api_v3_schema.as_ref())
        .map(schema_node);

    CrdVersion {
        name: version.name.clone(),
        served: version.served,
        storage: version.storage,
        deprecated: version.deprecated.unwrap_or(false),
        schema,
    }
}

/// Convert an OpenAPI v3 schema into a schema node
pub fn schema_node(props: &JSONSchemaProps) -> SchemaNode {
    convert(props, 0)
}

fn convert(props: &JSONSchemaProps, depth: usize) -> SchemaNode {
    let descend = depth + 1 < MAX_SCHEMA_DEPTH;
    let mut truncated = false;

    let kind = match SchemaKind::from_type_name(
        props.type_.as_deref(),
        props.x_kubernetes_int_or_string.unwrap_or(false),
    ) {
        SchemaKind::Object { .. } => {
            let properties = match &props.properties {
                Some(properties) if !descend => {
                    truncated = !properties.is_empty();
                    None
                }
                Some(properties) => Some(
                    properties
                        .iter()
                        .map(|(name, child)| (name.clone(), convert(child, depth + 1)))
                        .collect(),
                ),
                None => None,
            };
            SchemaKind::Object {
                properties,
                required: props.required.iter().flatten().cloned().collect(),
            }
        }
        SchemaKind::Array { .. } => {
            let items = props.items.as_ref().and_then(element_schema);
            truncated = items.is_some() && !descend;
            SchemaKind::Array {
                items: items
                    .filter(|_| descend)
                    .map(|items| Box::new(convert(items, depth + 1))),
            }
        }
        scalar => scalar,
    };

    SchemaNode {
        kind,
        description: props.description.clone(),
        nullable: props.nullable.unwrap_or(false),
        format: props.format.clone(),
        enum_values: props
            .enum_
            .iter()
            .flatten()
            .map(|value| value.0.to_string())
            .collect(),
        default: props.default.as_ref().map(|value| value.0.to_string()),
        preserve_unknown_fields: props.x_kubernetes_preserve_unknown_fields.unwrap_or(false),
        truncated,
    }
}

/// Element schema of an array; the legacy tuple form uses its first entry
fn element_schema(items: &JSONSchemaPropsOrArray) -> Option<&JSONSchemaProps> {
    match items {
        JSONSchemaPropsOrArray::Schema(schema) => Some(schema.as_ref()),
        JSONSchemaPropsOrArray::Schemas(schemas) => schemas.first(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ScalarType, SchemaRenderer};
    use serde_json::json;

    fn parse_crd(value: serde_json::Value) -> CustomResourceDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn widget_crd() -> CustomResourceDefinition {
        parse_crd(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": { "name": "widgets.example.com" },
            "spec": {
                "group": "example.com",
                "scope": "Cluster",
                "names": { "kind": "Widget", "plural": "widgets" },
                "versions": [
                    { "name": "v1alpha1", "served": true, "storage": false, "deprecated": true },
                    {
                        "name": "v1",
                        "served": true,
                        "storage": true,
                        "schema": {
                            "openAPIV3Schema": {
                                "type": "object",
                                "properties": {
                                    "spec": {
                                        "type": "object",
                                        "required": ["size"],
                                        "properties": {
                                            "size": {
                                                "type": "string",
                                                "enum": ["small", "large"],
                                                "default": "small"
                                            },
                                            "port": { "x-kubernetes-int-or-string": true },
                                            "labels": {
                                                "type": "array",
                                                "items": { "type": "string" }
                                            },
                                            "extra": {
                                                "type": "object",
                                                "nullable": true,
                                                "x-kubernetes-preserve-unknown-fields": true
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                ]
            }
        }))
    }

    #[test]
    fn test_crd_record() {
        let record = crd_record(&widget_crd());
        assert_eq!(record.name, "widgets.example.com");
        assert_eq!(record.group, "example.com");
        assert_eq!(record.kind, "Widget");
        assert_eq!(record.scope, CrdScope::Cluster);
        assert_eq!(record.versions.len(), 2);
        assert!(record.versions[0].deprecated);
        assert!(record.versions[0].schema.is_none());
        assert_eq!(record.storage_versions().next().map(|v| v.name.as_str()), Some("v1"));
    }

    #[test]
    fn test_schema_conversion() {
        let record = crd_record(&widget_crd());
        let schema = record.versions[1].schema.as_ref().unwrap();

        let spec = schema.get_nested("spec").unwrap();
        assert!(spec.is_required("size"));

        let size = schema.get_nested("spec.size").unwrap();
        assert_eq!(size.kind, SchemaKind::Scalar { scalar: ScalarType::String });
        assert_eq!(size.enum_values, vec!["\"small\"", "\"large\""]);
        assert_eq!(size.default.as_deref(), Some("\"small\""));

        let port = schema.get_nested("spec.port").unwrap();
        assert_eq!(port.kind.type_name(), "int-or-string");

        let label = schema.get_nested("spec.labels.[]").unwrap();
        assert_eq!(label, &SchemaNode::string());

        let extra = schema.get_nested("spec.extra").unwrap();
        assert!(extra.nullable);
        assert!(extra.preserve_unknown_fields);
        assert!(!extra.has_children());
    }

    #[test]
    fn test_tuple_items_use_first_schema() {
        let props: JSONSchemaProps = serde_json::from_value(json!({
            "type": "array",
            "items": [{ "type": "integer" }, { "type": "string" }]
        }))
        .unwrap();

        let node = schema_node(&props);
        assert_eq!(node.get_nested("[]"), Some(&SchemaNode::integer()));
    }

    #[test]
    fn test_name_falls_back_to_plural_and_group() {
        let mut crd = widget_crd();
        crd.metadata.name = None;
        assert_eq!(crd_record(&crd).name, "widgets.example.com");
    }

    #[test]
    fn test_conversion_depth_is_bounded() {
        let mut props = JSONSchemaProps {
            type_: Some("string".into()),
            ..Default::default()
        };
        for _ in 0..(MAX_SCHEMA_DEPTH + 10) {
            props = JSONSchemaProps {
                type_: Some("array".into()),
                items: Some(JSONSchemaPropsOrArray::Schema(Box::new(props))),
                ..Default::default()
            };
        }

        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(move || {
                let node = schema_node(&props);
                let mut depth = 0;
                let mut current = &node;
                while let SchemaKind::Array { items: Some(items) } = &current.kind {
                    current = items;
                    depth += 1;
                }
                depth
            })
            .unwrap();

        assert_eq!(handle.join().unwrap(), MAX_SCHEMA_DEPTH - 1);
    }

    #[test]
    fn test_cut_is_rendered_at_highest_ceiling() {
        let mut props = JSONSchemaProps {
            type_: Some("string".into()),
            ..Default::default()
        };
        for _ in 0..300 {
            props = JSONSchemaProps {
                type_: Some("array".into()),
                items: Some(JSONSchemaPropsOrArray::Schema(Box::new(props))),
                ..Default::default()
            };
        }

        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(move || {
                let node = schema_node(&props);
                let renderer = SchemaRenderer::with_max_depth(usize::MAX);
                let root = renderer.render_root(&node, "deep");
                (renderer.max_depth(), root.is_truncated(), root.height())
            })
            .unwrap();

        let (max_depth, truncated, height) = handle.join().unwrap();
        assert_eq!(max_depth, MAX_SCHEMA_DEPTH - 1);
        assert!(truncated);
        assert_eq!(height, MAX_SCHEMA_DEPTH);
    }

    #[test]
    fn test_shallow_schema_is_not_marked_truncated() {
        let record = crd_record(&widget_crd());
        let schema = record.versions[1].schema.as_ref().unwrap();
        assert!(!schema.truncated);
        assert!(!SchemaRenderer::new().render_root(schema, "widgets").is_truncated());
    }
}
