//! Local kubeconfig files for nested clusters
//!
//! One file per cluster, `knest.<namespace>.<name>.kubeconfig`, in the
//! configured kube directory.

use std::path::{Path, PathBuf};

use knest_models::ClusterIdentity;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, identity: &ClusterIdentity) -> PathBuf {
        self.dir.join(identity.credential_file_name())
    }

    /// Write the decoded kubeconfig, replacing any earlier file
    pub fn write(&self, identity: &ClusterIdentity, kubeconfig: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(identity);
        std::fs::write(&path, kubeconfig)?;
        debug!(path = %path.display(), "wrote kubeconfig");
        Ok(path)
    }

    /// Remove the file; `false` when there was nothing to remove
    pub fn remove(&self, identity: &ClusterIdentity) -> Result<bool> {
        let path = self.path_for(identity);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed kubeconfig");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

/// Point the kubeconfig's `cluster_name` entry at `server`, verifying TLS
/// against `tls_server_name`. A missing entry is created.
pub fn rewrite_cluster_entry(
    kubeconfig: &str,
    cluster_name: &str,
    server: &str,
    tls_server_name: &str,
) -> Result<String> {
    let mut config: Value =
        serde_yaml::from_str(kubeconfig).map_err(|e| Error::decode("kubeconfig", e))?;
    let root = config
        .as_mapping_mut()
        .ok_or_else(|| Error::decode("kubeconfig", "top level is not a mapping"))?;

    let clusters = root
        .entry(key("clusters"))
        .or_insert_with(|| Value::Sequence(Vec::new()));
    if clusters.is_null() {
        *clusters = Value::Sequence(Vec::new());
    }
    let clusters = clusters
        .as_sequence_mut()
        .ok_or_else(|| Error::decode("kubeconfig", "clusters is not a list"))?;

    let position = clusters
        .iter()
        .position(|c| c.get("name").and_then(|n| n.as_str()) == Some(cluster_name));
    let entry = match position {
        Some(i) => &mut clusters[i],
        None => {
            let mut entry = Mapping::new();
            entry.insert(key("name"), key(cluster_name));
            entry.insert(key("cluster"), Value::Mapping(Mapping::new()));
            clusters.push(Value::Mapping(entry));
            let last = clusters.len() - 1;
            &mut clusters[last]
        }
    };

    let entry = entry
        .as_mapping_mut()
        .ok_or_else(|| Error::decode("kubeconfig", "cluster entry is not a mapping"))?;
    let cluster = entry
        .entry(key("cluster"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if cluster.is_null() {
        *cluster = Value::Mapping(Mapping::new());
    }
    let cluster = cluster
        .as_mapping_mut()
        .ok_or_else(|| Error::decode("kubeconfig", "cluster is not a mapping"))?;

    cluster.insert(key("server"), key(server));
    cluster.insert(key("tls-server-name"), key(tls_server_name));

    serde_yaml::to_string(&config).map_err(|e| Error::decode("kubeconfig", e))
}

/// Rewrite the cluster entry of the kubeconfig file at `path` in place
pub fn rewrite_file(path: &Path, cluster_name: &str, server: &str, tls_server_name: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let rewritten = rewrite_cluster_entry(&content, cluster_name, server, tls_server_name)?;
    std::fs::write(path, rewritten)?;
    info!(path = %path.display(), server = %server, "updated kubeconfig");
    Ok(())
}
