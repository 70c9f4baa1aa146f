//! Scale an existing nested cluster
//!
//! Replica counts are merge-patched onto the KubeadmControlPlane and the
//! MachineDeployment; Cluster API controllers reconcile the machines.

use serde_json::json;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::k8s_client::ResourceRef;
use crate::names::kinds;
use crate::orchestrations::ProvisionContext;
use crate::types::{ScaleClusterInput, ScaleClusterOutput};

fn replicas_patch(count: u32) -> serde_json::Value {
    json!({ "spec": { "replicas": count } })
}

pub async fn scale_cluster(
    ctx: &ProvisionContext<'_>,
    input: ScaleClusterInput,
) -> Result<ScaleClusterOutput> {
    let identity = &input.identity;
    let mut output = ScaleClusterOutput::default();

    if input.control_plane_machine_count.is_none() && input.worker_machine_count.is_none() {
        info!(cluster = %identity, "no replica count given, nothing to scale");
        return Ok(output);
    }

    let cluster = ResourceRef::namespaced(kinds::CLUSTER, &identity.namespace, &identity.name);
    if !ctx.control_plane.exists(&cluster).await? {
        return Err(Error::InvalidInput(format!(
            "cluster {} not found",
            identity
        )));
    }

    match input.control_plane_machine_count {
        Some(0) => {
            warn!(cluster = %identity, "control plane cannot be scaled to zero machines, skipping");
        }
        Some(count) => {
            let kcp = ResourceRef::namespaced(
                kinds::KUBEADM_CONTROL_PLANE,
                &identity.namespace,
                &identity.control_plane_name(),
            );
            ctx.control_plane.merge_patch(&kcp, &replicas_patch(count)).await?;
            info!(resource = %kcp, replicas = count, "scaled control plane");
            output.control_plane_patched = true;
        }
        None => {}
    }

    if let Some(count) = input.worker_machine_count {
        let md = ResourceRef::namespaced(
            kinds::MACHINE_DEPLOYMENT,
            &identity.namespace,
            &identity.machine_deployment_name(),
        );
        ctx.control_plane.merge_patch(&md, &replicas_patch(count)).await?;
        info!(resource = %md, replicas = count, "scaled workers");
        output.workers_patched = true;
    }

    Ok(output)
}
