//! Host cluster client
//!
//! Every resource knest touches is addressed dynamically through a
//! [`ResourceRef`], so one small trait covers CRDs, CAPI objects and core types
//! alike. Tests swap in an in-memory implementation.

use std::fmt;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::discovery::{ApiResource, Discovery, Scope};
use kube::{Client, Config};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::names::{kinds, FIELD_MANAGER};

/// Static description of a Kubernetes resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKind {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
    pub namespaced: bool,
}

impl ResourceKind {
    pub const fn namespaced(
        api_version: &'static str,
        kind: &'static str,
        plural: &'static str,
    ) -> Self {
        Self {
            api_version,
            kind,
            plural,
            namespaced: true,
        }
    }

    pub const fn cluster_scoped(
        api_version: &'static str,
        kind: &'static str,
        plural: &'static str,
    ) -> Self {
        Self {
            api_version,
            kind,
            plural,
            namespaced: false,
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        let (group, version) = parse_api_version(self.api_version);
        ApiResource {
            group,
            version,
            api_version: self.api_version.to_string(),
            kind: self.kind.to_string(),
            plural: self.plural.to_string(),
        }
    }
}

/// A single named resource on the host cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceRef {
    pub fn namespaced(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
        }
    }

    pub fn cluster_scoped(kind: ResourceKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            namespace: None,
        }
    }

    pub fn crd(name: &str) -> Self {
        Self::cluster_scoped(kinds::CRD, name)
    }

    pub fn namespace(name: &str) -> Self {
        Self::cluster_scoped(kinds::NAMESPACE, name)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind.kind, self.name),
        }
    }
}

/// Scheme and hostname of the host cluster's API endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEndpoint {
    pub scheme: String,
    pub host: String,
}

impl HostEndpoint {
    pub fn from_uri(uri: &http::Uri) -> Result<Self> {
        let scheme = uri
            .scheme_str()
            .ok_or_else(|| Error::decode("host endpoint", format!("{} has no scheme", uri)))?;
        let host = uri
            .host()
            .ok_or_else(|| Error::decode("host endpoint", format!("{} has no host", uri)))?;
        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
        })
    }

    pub fn parse(server: &str) -> Result<Self> {
        let uri: http::Uri = server
            .parse()
            .map_err(|e| Error::decode("host endpoint", format!("{}: {}", server, e)))?;
        Self::from_uri(&uri)
    }

    /// Same scheme and host, different port
    pub fn with_port(&self, port: u16) -> String {
        format!("{}://{}:{}", self.scheme, self.host, port)
    }
}

/// Operations the provisioning pipeline needs from the host cluster
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Fetch a resource, `None` when it does not exist
    async fn get(&self, resource: &ResourceRef) -> Result<Option<DynamicObject>>;

    /// List every object of `kind` in `namespace`
    async fn list(&self, kind: &ResourceKind, namespace: &str) -> Result<Vec<DynamicObject>>;

    /// Server-side apply a single manifest document
    async fn apply(&self, document: &serde_json::Value) -> Result<()>;

    /// JSON merge-patch a resource
    async fn merge_patch(&self, resource: &ResourceRef, patch: &serde_json::Value) -> Result<()>;

    /// Request deletion; `false` when the resource was already gone
    async fn delete(&self, resource: &ResourceRef) -> Result<bool>;

    /// Endpoint the local kubeconfig uses to reach the host cluster
    fn host_endpoint(&self) -> &HostEndpoint;

    async fn exists(&self, resource: &ResourceRef) -> Result<bool> {
        Ok(self.get(resource).await?.is_some())
    }
}

/// [`ControlPlane`] backed by kube-rs
pub struct KubeControlPlane {
    client: Client,
    endpoint: HostEndpoint,
    discovery: Mutex<Option<Discovery>>,
}

impl KubeControlPlane {
    /// Connect using the ambient kubeconfig or in-cluster config
    pub async fn try_default() -> Result<Self> {
        let config = Config::infer()
            .await
            .map_err(|e| Error::transport(format!("load infra kubeconfig: {}", e)))?;
        let endpoint = HostEndpoint::from_uri(&config.cluster_url)?;
        let client = Client::try_from(config)
            .map_err(|e| Error::transport(format!("create client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            discovery: Mutex::new(None),
        })
    }

    fn api(&self, resource: &ResourceRef) -> Api<DynamicObject> {
        let ar = resource.kind.api_resource();
        match &resource.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }

    /// Resolve a GVK, refreshing discovery once so CRDs applied earlier in
    /// the same run become visible.
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<(ApiResource, bool)> {
        let mut cached = self.discovery.lock().await;

        if let Some(discovery) = cached.as_ref() {
            if let Some((ar, caps)) = discovery.resolve_gvk(gvk) {
                return Ok((ar, matches!(caps.scope, Scope::Namespaced)));
            }
        }

        debug!(group = %gvk.group, kind = %gvk.kind, "refreshing API discovery");
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| Error::transport(format!("API discovery failed: {}", e)))?;
        let resolved = discovery
            .resolve_gvk(gvk)
            .map(|(ar, caps)| (ar, matches!(caps.scope, Scope::Namespaced)));
        *cached = Some(discovery);

        resolved.ok_or_else(|| {
            Error::transport(format!(
                "unknown resource type {}/{} {}",
                gvk.group, gvk.version, gvk.kind
            ))
        })
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn get(&self, resource: &ResourceRef) -> Result<Option<DynamicObject>> {
        match self.api(resource).get(&resource.name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(None),
            Err(e) => Err(Error::transport(format!("get {}: {}", resource, e))),
        }
    }

    async fn list(&self, kind: &ResourceKind, namespace: &str) -> Result<Vec<DynamicObject>> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource());
        match api.list(&ListParams::default()).await {
            Ok(list) => Ok(list.items),
            // CRD not installed yet: nothing to list
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(Vec::new()),
            Err(e) => Err(Error::transport(format!("list {}: {}", kind.plural, e))),
        }
    }

    async fn apply(&self, document: &serde_json::Value) -> Result<()> {
        let meta = DocumentMeta::from_value(document)?;
        let (group, version) = parse_api_version(&meta.api_version);
        let gvk = GroupVersionKind::gvk(&group, &version, &meta.kind);
        let (ar, namespaced) = self.resolve(&gvk).await?;

        let api: Api<DynamicObject> = if namespaced {
            let ns = meta.namespace.as_deref().unwrap_or("default");
            Api::namespaced_with(self.client.clone(), ns, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        };

        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&meta.name, &params, &Patch::Apply(document))
            .await
            .map_err(|e| Error::transport(format!("apply {}/{}: {}", meta.kind, meta.name, e)))?;

        trace!(kind = %meta.kind, name = %meta.name, namespace = ?meta.namespace, "applied manifest");
        Ok(())
    }

    async fn merge_patch(&self, resource: &ResourceRef, patch: &serde_json::Value) -> Result<()> {
        self.api(resource)
            .patch(&resource.name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| Error::transport(format!("patch {}: {}", resource, e)))?;
        Ok(())
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<bool> {
        match self
            .api(resource)
            .delete(&resource.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(false),
            Err(e) => Err(Error::transport(format!("delete {}: {}", resource, e))),
        }
    }

    fn host_endpoint(&self) -> &HostEndpoint {
        &self.endpoint
    }
}

/// Identifying fields of a manifest document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl DocumentMeta {
    pub fn from_value(document: &serde_json::Value) -> Result<Self> {
        let field = |pointer: &str| document.pointer(pointer).and_then(|v| v.as_str());
        let missing = |what: &str| Error::decode("manifest", format!("document missing {}", what));

        Ok(Self {
            api_version: field("/apiVersion").ok_or_else(|| missing("apiVersion"))?.to_string(),
            kind: field("/kind").ok_or_else(|| missing("kind"))?.to_string(),
            name: field("/metadata/name")
                .ok_or_else(|| missing("metadata.name"))?
                .to_string(),
            namespace: field("/metadata/namespace").map(str::to_string),
        })
    }
}

/// Split a multi-document YAML manifest, dropping empty documents and
/// flattening `kind: List` wrappers.
pub fn split_documents(manifest: &str) -> Result<Vec<serde_json::Value>> {
    let mut documents = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(manifest) {
        let value = serde_json::Value::deserialize(doc)
            .map_err(|e| Error::decode("manifest", e))?;
        if value.is_null() {
            continue;
        }

        let is_list = value.get("kind").and_then(|k| k.as_str()) == Some("List");
        match value.get("items").and_then(|i| i.as_array()) {
            Some(items) if is_list => documents.extend(items.iter().cloned()),
            _ => documents.push(value),
        }
    }
    Ok(documents)
}

/// Force `namespace` onto every namespaced document, replacing whatever the
/// template set, as `clusterctl generate cluster --target-namespace` does
pub fn set_namespace(documents: &mut [serde_json::Value], namespace: &str) {
    for document in documents {
        let kind = document.get("kind").and_then(|k| k.as_str()).unwrap_or_default();
        if kinds::CLUSTER_SCOPED.contains(&kind) {
            continue;
        }
        if let Some(metadata) = document.get_mut("metadata").and_then(|m| m.as_object_mut()) {
            metadata.insert(
                "namespace".to_string(),
                serde_json::Value::String(namespace.to_string()),
            );
        }
    }
}

/// Apply every document of a manifest in order, returning how many were applied
pub async fn apply_manifest(control_plane: &dyn ControlPlane, manifest: &str) -> Result<usize> {
    let documents = split_documents(manifest)?;
    for document in &documents {
        control_plane.apply(document).await?;
    }
    Ok(documents.len())
}

/// Render documents back into a single multi-document YAML stream
pub fn join_documents(documents: &[serde_json::Value]) -> Result<String> {
    let mut out = String::new();
    for document in documents {
        let yaml = serde_yaml::to_string(document).map_err(|e| Error::decode("manifest", e))?;
        out.push_str("---\n");
        out.push_str(&yaml);
    }
    Ok(out)
}

/// Parse apiVersion into (group, version)
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_version() {
        assert_eq!(
            parse_api_version("cluster.x-k8s.io/v1beta1"),
            ("cluster.x-k8s.io".to_string(), "v1beta1".to_string())
        );
        assert_eq!(parse_api_version("v1"), (String::new(), "v1".to_string()));
    }

    #[test]
    fn test_api_resource_from_kind() {
        let ar = kinds::KUBEADM_CONTROL_PLANE.api_resource();
        assert_eq!(ar.group, "controlplane.cluster.x-k8s.io");
        assert_eq!(ar.version, "v1beta1");
        assert_eq!(ar.plural, "kubeadmcontrolplanes");
    }

    #[test]
    fn test_host_endpoint_parse() {
        let endpoint = HostEndpoint::parse("https://10.0.0.1:6443").unwrap();
        assert_eq!(endpoint.scheme, "https");
        assert_eq!(endpoint.host, "10.0.0.1");
        assert_eq!(endpoint.with_port(31000), "https://10.0.0.1:31000");
    }

    #[test]
    fn test_set_namespace_skips_cluster_scoped_kinds() {
        let mut documents = vec![
            serde_json::json!({"apiVersion": "cluster.x-k8s.io/v1beta1", "kind": "Cluster", "metadata": {"name": "demo"}}),
            serde_json::json!({"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "creds", "namespace": "default"}}),
            serde_json::json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "tenants"}}),
        ];

        set_namespace(&mut documents, "tenants");

        assert_eq!(documents[0]["metadata"]["namespace"], "tenants");
        assert_eq!(documents[1]["metadata"]["namespace"], "tenants");
        assert!(documents[2]["metadata"].get("namespace").is_none());
    }

    #[test]
    fn test_host_endpoint_requires_scheme() {
        assert!(HostEndpoint::parse("10.0.0.1:6443").is_err());
    }

    #[test]
    fn test_split_documents_skips_empty_and_flattens_lists() {
        let manifest = r#"
---
apiVersion: v1
kind: Namespace
metadata:
  name: a
---
---
apiVersion: v1
kind: List
items:
  - apiVersion: v1
    kind: Namespace
    metadata:
      name: b
  - apiVersion: v1
    kind: Namespace
    metadata:
      name: c
"#;
        let docs = split_documents(manifest).unwrap();
        let names: Vec<_> = docs
            .iter()
            .map(|d| d["metadata"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_documents_rejects_bad_yaml() {
        assert!(split_documents("kind: [unclosed").is_err());
    }

    #[test]
    fn test_document_meta() {
        let doc = serde_json::json!({
            "apiVersion": "ipam.metal3.io/v1alpha1",
            "kind": "IPPool",
            "metadata": {"name": "demo", "namespace": "default"}
        });
        let meta = DocumentMeta::from_value(&doc).unwrap();
        assert_eq!(meta.kind, "IPPool");
        assert_eq!(meta.namespace.as_deref(), Some("default"));

        let err = DocumentMeta::from_value(&serde_json::json!({"kind": "X"})).unwrap_err();
        assert!(err.to_string().contains("apiVersion"));
    }

    #[test]
    fn test_join_documents_roundtrip() {
        let docs = vec![
            serde_json::json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "a"}}),
            serde_json::json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "b"}}),
        ];
        let joined = join_documents(&docs).unwrap();
        assert_eq!(split_documents(&joined).unwrap(), docs);
    }
}
