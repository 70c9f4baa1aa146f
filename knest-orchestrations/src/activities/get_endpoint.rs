//! Read the nested cluster's exposed endpoint and admin kubeconfig

use base64::{engine::general_purpose::STANDARD, Engine};
use knest_models::ClusterIdentity;
use tracing::debug;

use crate::error::{Error, Result};
use crate::k8s_client::{ControlPlane, ResourceRef};
use crate::names::kinds;

/// Where the nested API server is reachable, and the credential for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEndpoint {
    pub node_port: u16,
    pub cluster_ip: String,
    pub kubeconfig: Vec<u8>,
}

pub async fn extract_endpoint(
    control_plane: &dyn ControlPlane,
    identity: &ClusterIdentity,
) -> Result<ClusterEndpoint> {
    // Step 1: control plane service created by the infrastructure provider
    let service_ref = ResourceRef::namespaced(kinds::SERVICE, &identity.namespace, &identity.name);
    let service = control_plane
        .get(&service_ref)
        .await?
        .ok_or_else(|| Error::decode(service_ref.to_string(), "not found"))?;

    let node_port = service
        .data
        .pointer("/spec/ports/0/nodePort")
        .and_then(|p| p.as_u64())
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| Error::decode(service_ref.to_string(), "no node port on first port"))?;
    let cluster_ip = service
        .data
        .pointer("/spec/clusterIP")
        .and_then(|ip| ip.as_str())
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| Error::decode(service_ref.to_string(), "no cluster IP"))?
        .to_string();

    // Step 2: admin kubeconfig written by the control plane provider
    let secret_ref = ResourceRef::namespaced(
        kinds::SECRET,
        &identity.namespace,
        &identity.kubeconfig_secret_name(),
    );
    let secret = control_plane
        .get(&secret_ref)
        .await?
        .ok_or_else(|| Error::decode(secret_ref.to_string(), "not found"))?;
    let encoded = secret
        .data
        .pointer("/data/value")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::decode(secret_ref.to_string(), "missing data.value"))?;
    let kubeconfig = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::decode("kubeconfig", e))?;

    debug!(node_port, cluster_ip = %cluster_ip, "extracted cluster endpoint");
    Ok(ClusterEndpoint {
        node_port,
        cluster_ip,
        kubeconfig,
    })
}
