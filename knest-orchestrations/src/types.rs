//! Input and output types for knest pipelines

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use knest_models::{ClusterIdentity, ProvisioningParameters};
use serde::{Deserialize, Serialize};

// ============================================================================
// Create Cluster
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateClusterInput {
    pub identity: ClusterIdentity,
    pub params: ProvisioningParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateClusterOutput {
    pub identity: ClusterIdentity,
    /// Rewritten kubeconfig for the nested cluster
    pub kubeconfig_path: PathBuf,
    /// API server address through the host's node port
    pub server: String,
    /// Service address the API server certificate is issued for
    pub tls_server_name: String,
    /// Host components installed by this run
    pub installed_components: Vec<String>,
    /// Whether the clusterctl registry file was changed
    pub registry_updated: bool,
    pub applied_documents: usize,
}

// ============================================================================
// Scale Cluster
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScaleClusterInput {
    pub identity: ClusterIdentity,
    pub control_plane_machine_count: Option<u32>,
    pub worker_machine_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScaleClusterOutput {
    pub control_plane_patched: bool,
    pub workers_patched: bool,
}

// ============================================================================
// Delete Cluster
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteClusterInput {
    pub identity: ClusterIdentity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeleteClusterOutput {
    /// false if the cluster didn't exist
    pub cluster_deleted: bool,
    pub address_pool_deleted: bool,
    pub kubeconfig_removed: bool,
}

// ============================================================================
// List Clusters
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub name: String,
    pub namespace: String,
    pub phase: Option<String>,
    pub control_plane_ready: bool,
    pub infrastructure_ready: bool,
    pub created: Option<DateTime<Utc>>,
}
