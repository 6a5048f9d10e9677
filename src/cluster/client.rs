//! Live cluster CRD source
//!
//! Lists `apiextensions.k8s.io/v1` CustomResourceDefinitions through kube.
//! Credentials come from the pod service account or a kubeconfig file.
//! The list body is fetched as text and decoded item by item, see
//! [`decode_crd_list`].

use super::decode::decode_crd_list;
use crate::domain::{CrdRecord, CrdSource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Resource};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// How to reach the cluster
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Use the pod service account
    pub in_cluster: bool,
    /// Explicit kubeconfig path; when unset the standard inference chain applies
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current one
    pub context: Option<String>,
    /// Connect and read timeout for API calls
    pub request_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            in_cluster: false,
            kubeconfig: None,
            context: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClusterConfig {
    /// Resolve into a kube client configuration
    pub async fn resolve(&self) -> Result<kube::Config> {
        let mut config = if self.in_cluster {
            kube::Config::incluster().map_err(|e| {
                Error::Connectivity(format!("in-cluster configuration unavailable: {}", e))
            })?
        } else if let Some(path) = &self.kubeconfig {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::Connectivity(format!("cannot read kubeconfig {}: {}", path.display(), e))
            })?;
            let options = KubeConfigOptions {
                context: self.context.clone(),
                ..Default::default()
            };
            kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| Error::Connectivity(format!("invalid kubeconfig: {}", e)))?
        } else {
            kube::Config::infer()
                .await
                .map_err(|e| Error::Connectivity(format!("no cluster configuration: {}", e)))?
        };

        config.connect_timeout = Some(self.request_timeout);
        config.read_timeout = Some(self.request_timeout);
        Ok(config)
    }
}

// =============================================================================
// Kube CRD Source
// =============================================================================

/// CRD source backed by the Kubernetes API server
pub struct KubeCrdSource {
    client: Client,
    endpoint: String,
}

impl KubeCrdSource {
    /// Resolve credentials and build a client
    pub async fn connect(config: &ClusterConfig) -> Result<Self> {
        let kube_config = config.resolve().await?;
        let endpoint = kube_config.cluster_url.to_string();
        let client = Client::try_from(kube_config)?;

        info!(
            "Kubernetes client ready for {} (in-cluster: {})",
            endpoint, config.in_cluster
        );
        Ok(Self {
            endpoint,
            ..Self::with_client(client)
        })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            endpoint: "kubernetes".to_string(),
        }
    }
}

#[async_trait]
impl CrdSource for KubeCrdSource {
    async fn fetch_all_crds(&self) -> Result<Vec<CrdRecord>> {
        let url = CustomResourceDefinition::url_path(&(), None);
        let request = kube::core::Request::new(url)
            .list(&ListParams::default())
            .map_err(kube::Error::BuildRequest)?;
        let body = self.client.request_text(request).await?;

        let records = decode_crd_list(&body)?;
        debug!("Listed {} CRDs from {}", records.len(), self.endpoint);
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("cluster {}", self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CrdScope;
    use crate::schema::{SchemaRenderer, MAX_RENDER_DEPTH};
    use assert_matches::assert_matches;
    use hyper::{Body, Request, Response};
    use serde_json::json;
    use std::convert::Infallible;

    fn mock_source(status: u16, body: serde_json::Value) -> KubeCrdSource {
        let service = tower::service_fn(move |req: Request<Body>| {
            let body = body.clone();
            async move {
                assert_eq!(
                    req.uri().path(),
                    "/apis/apiextensions.k8s.io/v1/customresourcedefinitions"
                );
                Ok::<_, Infallible>(
                    Response::builder()
                        .status(status)
                        .header("content-type", "application/json")
                        .body(Body::from(body.to_string()))
                        .unwrap(),
                )
            }
        });
        KubeCrdSource::with_client(Client::new(service, "default"))
    }

    #[tokio::test]
    async fn test_fetch_all_crds() {
        let source = mock_source(
            200,
            json!({
                "apiVersion": "apiextensions.k8s.io/v1",
                "kind": "CustomResourceDefinitionList",
                "metadata": { "resourceVersion": "42" },
                "items": [{
                    "apiVersion": "apiextensions.k8s.io/v1",
                    "kind": "CustomResourceDefinition",
                    "metadata": { "name": "widgets.example.com" },
                    "spec": {
                        "group": "example.com",
                        "scope": "Namespaced",
                        "names": { "kind": "Widget", "plural": "widgets" },
                        "versions": [{
                            "name": "v1",
                            "served": true,
                            "storage": true,
                            "schema": { "openAPIV3Schema": { "type": "object" } }
                        }]
                    }
                }]
            }),
        );

        let records = source.fetch_all_crds().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "widgets.example.com");
        assert_eq!(records[0].group, "example.com");
        assert!(records[0].versions[0].schema.is_some());
    }

    fn nested_schema(levels: usize) -> serde_json::Value {
        let mut schema = json!({ "type": "string" });
        for _ in 0..levels {
            schema = json!({ "type": "object", "properties": { "child": schema } });
        }
        schema
    }

    fn crd_item(name: &str, schema: serde_json::Value) -> serde_json::Value {
        let (plural, group) = name.split_once('.').unwrap();
        json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": { "name": name },
            "spec": {
                "group": group,
                "scope": "Cluster",
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

    #[tokio::test]
    async fn test_deeply_nested_crd_is_listed() {
        let source = mock_source(
            200,
            json!({
                "apiVersion": "apiextensions.k8s.io/v1",
                "kind": "CustomResourceDefinitionList",
                "metadata": {},
                "items": [
                    crd_item("deeps.example.com", nested_schema(70)),
                    crd_item("widgets.example.com", nested_schema(1)),
                ]
            }),
        );

        let records = source.fetch_all_crds().await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["deeps.example.com", "widgets.example.com"]);
        assert_eq!(records[0].scope, CrdScope::Cluster);

        let root = SchemaRenderer::new()
            .render_root(records[0].versions[0].schema.as_ref().unwrap(), "deeps");
        assert!(root.is_truncated());
        assert_eq!(root.height(), MAX_RENDER_DEPTH + 1);
    }

    #[tokio::test]
    async fn test_unparseable_list_is_decode_error() {
        let source = mock_source(200, json!("not a list"));

        let err = source.fetch_all_crds().await.unwrap_err();
        assert_matches!(err, Error::Decode(_));
    }

    #[tokio::test]
    async fn test_forbidden_is_remote_api_error() {
        let source = mock_source(
            403,
            json!({
                "kind": "Status",
                "apiVersion": "v1",
                "metadata": {},
                "status": "Failure",
                "message": "customresourcedefinitions.apiextensions.k8s.io is forbidden",
                "reason": "Forbidden",
                "code": 403
            }),
        );

        let err = source.fetch_all_crds().await.unwrap_err();
        assert_matches!(err, Error::RemoteApi { code: 403, .. });
    }

    #[tokio::test]
    async fn test_missing_kubeconfig_is_connectivity_error() {
        let config = ClusterConfig {
            kubeconfig: Some(PathBuf::from("/nonexistent/kubeconfig")),
            ..Default::default()
        };

        let err = config.resolve().await.unwrap_err();
        assert_matches!(err, Error::Connectivity(_));
    }
}
