//! Data model shared by the knest orchestrations and CLI

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod quantity;

pub use quantity::Quantity;

/// Errors raised while validating caller input, before anything touches a cluster
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid quantity {value:?}: {reason}")]
    InvalidQuantity { value: String, reason: String },

    #[error("invalid machine address: {0}")]
    InvalidAddress(String),

    #[error("unsupported host cluster CNI: {0}")]
    UnsupportedCni(String),
}

/// Name and namespace of a nested cluster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub name: String,
    pub namespace: String,
}

impl ClusterIdentity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// KubeadmControlPlane created by the cluster templates
    pub fn control_plane_name(&self) -> String {
        format!("{}-cp", self.name)
    }

    /// First worker MachineDeployment created by the cluster templates
    pub fn machine_deployment_name(&self) -> String {
        format!("{}-md-0", self.name)
    }

    /// Secret holding the generated admin kubeconfig
    pub fn kubeconfig_secret_name(&self) -> String {
        format!("{}-kubeconfig", self.name)
    }

    /// File name of the local credential, e.g. `knest.default.demo.kubeconfig`
    pub fn credential_file_name(&self) -> String {
        format!("knest.{}.{}.kubeconfig", self.namespace, self.name)
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Sizing and images for one machine role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineSpec {
    pub cpu_cores: u32,
    pub memory_size: Quantity,
    /// Kernel image; ephemeral machines get a default when unset
    pub kernel_image: Option<String>,
    /// Rootfs image; each mode has its own default when unset
    pub rootfs_image: Option<String>,
    pub rootfs_size: Quantity,
}

impl Default for MachineSpec {
    fn default() -> Self {
        Self {
            cpu_cores: 2,
            memory_size: Quantity::gibibytes(4),
            kernel_image: None,
            rootfs_image: None,
            rootfs_size: Quantity::gibibytes(4),
        }
    }
}

/// Everything a caller can tune when creating a nested cluster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningParameters {
    pub kubernetes_version: String,
    pub control_plane_machine_count: u32,
    pub worker_machine_count: u32,
    pub pod_network_cidr: String,
    pub service_cidr: String,
    pub control_plane: MachineSpec,
    pub worker: MachineSpec,
    /// Persistent storage and stable addresses for machines
    pub persistent: bool,
    /// Candidate addresses for persistent machines: subnets or `start-end` ranges
    pub machine_addresses: Vec<String>,
    /// CNI of the host cluster, used to pick a static IP/MAC overlay
    pub host_cluster_cni: Option<String>,
    /// Cluster template to use instead of the built-in flavors
    pub from: Option<String>,
}

impl Default for ProvisioningParameters {
    fn default() -> Self {
        Self {
            kubernetes_version: "1.24.0".to_string(),
            control_plane_machine_count: 1,
            worker_machine_count: 1,
            pod_network_cidr: "192.168.0.0/16".to_string(),
            service_cidr: "10.96.0.0/12".to_string(),
            control_plane: MachineSpec::default(),
            worker: MachineSpec::default(),
            persistent: false,
            machine_addresses: Vec::new(),
            host_cluster_cni: None,
            from: None,
        }
    }
}

impl ProvisioningParameters {
    pub fn machine_mode(&self) -> MachineMode {
        if self.persistent {
            MachineMode::Persistent
        } else {
            MachineMode::Ephemeral
        }
    }
}

/// Lifecycle of the nested cluster's machines
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MachineMode {
    /// Machines boot from container images and lose state on restart
    Ephemeral,
    /// Machines boot from imported volumes and keep their addresses
    Persistent,
}

impl MachineMode {
    /// Built-in cluster template flavor for this mode
    pub fn flavor(self) -> Flavor {
        match self {
            MachineMode::Ephemeral => Flavor::Internal,
            MachineMode::Persistent => Flavor::CdiInternal,
        }
    }
}

/// Built-in variants of the cluster template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Internal,
    CdiInternal,
}

impl Flavor {
    pub fn name(self) -> &'static str {
        match self {
            Flavor::Internal => "internal",
            Flavor::CdiInternal => "cdi-internal",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Host cluster CNIs with a known static IP/MAC overlay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HostCni {
    #[serde(rename = "calico")]
    Calico,
    #[serde(rename = "kube-ovn")]
    KubeOvn,
}

impl HostCni {
    pub fn name(self) -> &'static str {
        match self {
            HostCni::Calico => "calico",
            HostCni::KubeOvn => "kube-ovn",
        }
    }
}

impl FromStr for HostCni {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calico" => Ok(HostCni::Calico),
            "kube-ovn" => Ok(HostCni::KubeOvn),
            other => Err(ModelError::UnsupportedCni(other.to_string())),
        }
    }
}

impl fmt::Display for HostCni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of an address pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AddressRange {
    Range { start: String, end: String },
    Subnet { subnet: String },
}

impl FromStr for AddressRange {
    type Err = ModelError;

    /// `a-b` is a start/end range, anything without `-` is a subnet.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ModelError::InvalidAddress(token.to_string()));
        }

        let parts: Vec<&str> = token.split('-').collect();
        match parts.as_slice() {
            [subnet] => Ok(AddressRange::Subnet {
                subnet: subnet.to_string(),
            }),
            [start, end] if !start.is_empty() && !end.is_empty() => Ok(AddressRange::Range {
                start: start.to_string(),
                end: end.to_string(),
            }),
            _ => Err(ModelError::InvalidAddress(token.to_string())),
        }
    }
}

/// Address pool reserved for the machines of a persistent cluster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressPoolRequest {
    pub name: String,
    pub namespace: String,
    pub pools: Vec<AddressRange>,
}

impl AddressPoolRequest {
    /// Parse every caller-supplied token, failing on the first malformed one
    pub fn parse<S: AsRef<str>>(
        identity: &ClusterIdentity,
        tokens: &[S],
    ) -> Result<Self, ModelError> {
        let pools = tokens
            .iter()
            .map(|token| token.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: identity.name.clone(),
            namespace: identity.namespace.clone(),
            pools,
        })
    }
}

/// Component versions reported by `knest version`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub knest: String,
    pub virtink: String,
    #[serde(rename = "cluster-api-provider-virtink")]
    pub cluster_api_provider_virtink: String,
}
