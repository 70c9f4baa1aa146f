//! List Cluster API clusters in a namespace

use kube::api::DynamicObject;
use kube::ResourceExt;

use crate::error::Result;
use crate::k8s_client::ControlPlane;
use crate::names::kinds;
use crate::types::ClusterSummary;

fn status_flag(obj: &DynamicObject, field: &str) -> bool {
    obj.data
        .get("status")
        .and_then(|s| s.get(field))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

pub fn summarize(obj: &DynamicObject) -> ClusterSummary {
    ClusterSummary {
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_default(),
        phase: obj
            .data
            .pointer("/status/phase")
            .and_then(|p| p.as_str())
            .map(str::to_string),
        control_plane_ready: status_flag(obj, "controlPlaneReady"),
        infrastructure_ready: status_flag(obj, "infrastructureReady"),
        created: obj.metadata.creation_timestamp.as_ref().map(|t| t.0),
    }
}

/// Summaries sorted by name
pub async fn list_clusters(control_plane: &dyn ControlPlane, namespace: &str) -> Result<Vec<ClusterSummary>> {
    let mut clusters: Vec<ClusterSummary> = control_plane
        .list(&kinds::CLUSTER, namespace)
        .await?
        .iter()
        .map(summarize)
        .collect();
    clusters.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(clusters)
}
