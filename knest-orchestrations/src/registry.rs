//! clusterctl provider registry
//!
//! clusterctl resolves infrastructure providers by name. Providers it does not
//! ship with must be listed in `~/.cluster-api/clusterctl.yaml` under
//! `providers:`; everything else in that file belongs to the user and is
//! written back untouched.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::CommandRunner;
use crate::error::{Error, Result};
use crate::names::provider;

const PROVIDERS_KEY: &str = "providers";

/// One `providers:` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub provider_type: String,
}

impl ProviderEntry {
    /// cluster-api-provider-virtink, tracking its latest release
    pub fn virtink() -> Self {
        Self {
            name: provider::NAME.to_string(),
            url: provider::URL.to_string(),
            provider_type: provider::TYPE.to_string(),
        }
    }
}

/// Load/contains/append/persist view of the provider registry
pub trait ProviderRegistry: Send {
    fn load(&mut self) -> Result<()>;
    fn contains(&self, name: &str) -> bool;
    fn append(&mut self, entry: ProviderEntry);
    fn persist(&mut self) -> Result<()>;
}

/// [`ProviderRegistry`] stored in a clusterctl config file
#[derive(Debug, Clone)]
pub struct ClusterctlConfig {
    path: PathBuf,
    document: serde_yaml::Mapping,
    providers: Vec<ProviderEntry>,
}

impl ClusterctlConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: serde_yaml::Mapping::new(),
            providers: Vec::new(),
        }
    }

    fn parse(&mut self, content: &str) -> Result<()> {
        let what = self.path.display().to_string();
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| Error::decode(what.clone(), e))?;

        self.document = match value {
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            serde_yaml::Value::Mapping(mapping) => mapping,
            _ => return Err(Error::decode(what, "top level is not a mapping")),
        };

        self.providers = match self.document.get(PROVIDERS_KEY) {
            None | Some(serde_yaml::Value::Null) => Vec::new(),
            Some(providers) => serde_yaml::from_value(providers.clone())
                .map_err(|e| Error::decode(what, format!("providers: {}", e)))?,
        };
        Ok(())
    }
}

impl ProviderRegistry for ClusterctlConfig {
    fn load(&mut self) -> Result<()> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => self.parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "clusterctl config does not exist yet");
                self.document = serde_yaml::Mapping::new();
                self.providers = Vec::new();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name == name)
    }

    fn append(&mut self, entry: ProviderEntry) {
        self.providers.push(entry);
    }

    fn persist(&mut self) -> Result<()> {
        let providers = serde_yaml::to_value(&self.providers)
            .map_err(|e| Error::decode("providers", e))?;
        self.document
            .insert(serde_yaml::Value::from(PROVIDERS_KEY), providers);

        let content = serde_yaml::to_string(&self.document)
            .map_err(|e| Error::decode(self.path.display().to_string(), e))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Whether clusterctl's built-in repository list already knows `name`
pub async fn builtin_repository_exists(commands: &dyn CommandRunner, name: &str) -> Result<bool> {
    let args: Vec<String> = ["config", "repositories", "-o", "yaml"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let output = commands.output("clusterctl", &args).await?;

    let repositories: Vec<serde_yaml::Value> = match serde_yaml::from_str(&output)
        .map_err(|e| Error::decode("clusterctl repositories", e))?
    {
        serde_yaml::Value::Null => Vec::new(),
        value => serde_yaml::from_value(value)
            .map_err(|e| Error::decode("clusterctl repositories", e))?,
    };

    Ok(repositories
        .iter()
        .any(|repo| repo.get("Name").and_then(|n| n.as_str()) == Some(name)))
}

/// Make sure clusterctl can resolve the virtink provider. Returns `true`
/// when the registry file was changed.
pub async fn ensure_provider_registered(
    commands: &dyn CommandRunner,
    registry: &mut dyn ProviderRegistry,
) -> Result<bool> {
    let entry = ProviderEntry::virtink();

    // Step 1: clusterctl may already ship with it
    if builtin_repository_exists(commands, &entry.name).await? {
        debug!(provider = %entry.name, "provider is a clusterctl built-in");
        return Ok(false);
    }

    // Step 2: otherwise it must be in the config file
    registry.load()?;
    if registry.contains(&entry.name) {
        debug!(provider = %entry.name, "provider already registered");
        return Ok(false);
    }

    info!(provider = %entry.name, url = %entry.url, "registering infrastructure provider");
    registry.append(entry);
    registry.persist()?;
    Ok(true)
}
