//! In-memory fakes for pipeline tests

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::api::DynamicObject;
use serde_json::{json, Value};

use crate::command::CommandRunner;
use crate::error::{Error, Result};
use crate::fetch::ManifestFetcher;
use crate::k8s_client::{ControlPlane, DocumentMeta, HostEndpoint, ResourceKind, ResourceRef};
use crate::activities::compose_overlay::merge_patch;
use crate::names::kinds;
use crate::registry::{ProviderEntry, ProviderRegistry};

type Key = (String, Option<String>, String);

/// Control plane holding objects in a map. `apply` merges into an existing
/// object so pre-seeded status survives, the way a real controller's status
/// survives a spec update.
pub struct FakeControlPlane {
    objects: Mutex<BTreeMap<Key, Value>>,
    pub applied: Mutex<Vec<Value>>,
    pub patched: Mutex<Vec<(ResourceRef, Value)>>,
    pub deleted: Mutex<Vec<ResourceRef>>,
    failure: Mutex<Option<String>>,
    endpoint: HostEndpoint,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            applied: Mutex::new(Vec::new()),
            patched: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            endpoint: HostEndpoint {
                scheme: "https".to_string(),
                host: "10.0.0.1".to_string(),
            },
        }
    }

    fn key_for_document(document: &Value) -> Result<Key> {
        let meta = DocumentMeta::from_value(document)?;
        let namespace = if kinds::CLUSTER_SCOPED.contains(&meta.kind.as_str()) {
            None
        } else {
            Some(meta.namespace.unwrap_or_else(|| "default".to_string()))
        };
        Ok((meta.kind, namespace, meta.name))
    }

    fn key_for_ref(resource: &ResourceRef) -> Key {
        (
            resource.kind.kind.to_string(),
            resource.namespace.clone(),
            resource.name.clone(),
        )
    }

    fn check(&self) -> Result<()> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(Error::transport(message)),
            None => Ok(()),
        }
    }

    /// Store an object as-is, bypassing the apply log
    pub fn seed(&self, document: Value) -> &Self {
        let key = Self::key_for_document(&document).unwrap();
        self.objects.lock().unwrap().insert(key, document);
        self
    }

    /// Make every subsequent request fail with a transport error
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn object(&self, resource: &ResourceRef) -> Option<Value> {
        self.objects
            .lock()
            .unwrap()
            .get(&Self::key_for_ref(resource))
            .cloned()
    }

    pub fn applied_kinds(&self) -> Vec<String> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .filter_map(|d| d["kind"].as_str().map(str::to_string))
            .collect()
    }

    pub fn apply_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }
}

fn to_dynamic(value: &Value) -> DynamicObject {
    serde_json::from_value(value.clone()).unwrap()
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn get(&self, resource: &ResourceRef) -> Result<Option<DynamicObject>> {
        self.check()?;
        Ok(self.object(resource).as_ref().map(to_dynamic))
    }

    async fn list(&self, kind: &ResourceKind, namespace: &str) -> Result<Vec<DynamicObject>> {
        self.check()?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, ns, _), _)| k == kind.kind && ns.as_deref() == Some(namespace))
            .map(|(_, v)| to_dynamic(v))
            .collect())
    }

    async fn apply(&self, document: &Value) -> Result<()> {
        self.check()?;
        let key = Self::key_for_document(document)?;
        let mut objects = self.objects.lock().unwrap();
        match objects.get_mut(&key) {
            Some(existing) => merge_patch(existing, document),
            None => {
                objects.insert(key, document.clone());
            }
        }
        self.applied.lock().unwrap().push(document.clone());
        Ok(())
    }

    async fn merge_patch(&self, resource: &ResourceRef, patch: &Value) -> Result<()> {
        self.check()?;
        let mut objects = self.objects.lock().unwrap();
        let existing = objects
            .get_mut(&Self::key_for_ref(resource))
            .ok_or_else(|| Error::transport(format!("patch {}: not found", resource)))?;
        merge_patch(existing, patch);
        self.patched
            .lock()
            .unwrap()
            .push((resource.clone(), patch.clone()));
        Ok(())
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<bool> {
        self.check()?;
        self.deleted.lock().unwrap().push(resource.clone());
        Ok(self
            .objects
            .lock()
            .unwrap()
            .remove(&Self::key_for_ref(resource))
            .is_some())
    }

    fn host_endpoint(&self) -> &HostEndpoint {
        &self.endpoint
    }
}

/// Object with `status.conditions` set to `[{type: condition, status: "True"}]`
pub fn ready_object(api_version: &str, kind: &str, namespace: Option<&str>, name: &str, condition: &str) -> Value {
    let mut metadata = json!({ "name": name });
    if let Some(ns) = namespace {
        metadata["namespace"] = json!(ns);
    }
    json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": metadata,
        "status": {
            "conditions": [{ "type": condition, "status": "True" }]
        }
    })
}

pub fn crd(name: &str) -> Value {
    json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": { "name": name }
    })
}

/// Records every invocation; `output` answers from prefix-matched canned stdout
#[derive(Default)]
pub struct FakeCommandRunner {
    pub calls: Mutex<Vec<String>>,
    outputs: Vec<(String, String)>,
    failing: Vec<String>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, prefix: &str, stdout: &str) -> Self {
        self.outputs.push((prefix.to_string(), stdout.to_string()));
        self
    }

    pub fn failing_on(mut self, prefix: &str) -> Self {
        self.failing.push(prefix.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, program: &str, args: &[String]) -> Result<String> {
        let command = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(command.clone());

        if self.failing.iter().any(|p| command.starts_with(p)) {
            return Err(Error::Command {
                command,
                message: "exit status: 1".to_string(),
            });
        }
        Ok(command)
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<()> {
        self.record(program, args).map(|_| ())
    }

    async fn output(&self, program: &str, args: &[String]) -> Result<String> {
        let command = self.record(program, args)?;
        Ok(self
            .outputs
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix))
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }
}

/// Fetcher answering from a fixed source -> content table
#[derive(Default)]
pub struct StaticFetcher {
    sources: HashMap<String, String>,
    pub fetched: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl Into<String>, content: impl Into<String>) -> Self {
        self.sources.insert(source.into(), content.into());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManifestFetcher for StaticFetcher {
    async fn fetch(&self, source: &str) -> Result<String> {
        self.fetched.lock().unwrap().push(source.to_string());
        self.sources.get(source).cloned().ok_or_else(|| Error::Fetch {
            url: source.to_string(),
            message: "404 Not Found".to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    pub providers: Vec<ProviderEntry>,
    pub persisted: usize,
}

impl ProviderRegistry for InMemoryRegistry {
    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn contains(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name == name)
    }

    fn append(&mut self, entry: ProviderEntry) {
        self.providers.push(entry);
    }

    fn persist(&mut self) -> Result<()> {
        self.persisted += 1;
        Ok(())
    }
}
