//! Ensure the target namespace exists

use serde_json::{json, Value};
use tracing::info;

use crate::activities::probe::{probe, Presence};
use crate::error::Result;
use crate::k8s_client::{ControlPlane, ResourceRef};

pub fn namespace_document(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": name }
    })
}

/// Create `namespace` if absent. Returns `true` when it was created.
pub async fn ensure_namespace(control_plane: &dyn ControlPlane, namespace: &str) -> Result<bool> {
    if probe(control_plane, &ResourceRef::namespace(namespace)).await? == Presence::Present {
        return Ok(false);
    }

    control_plane.apply(&namespace_document(namespace)).await?;
    info!(namespace = %namespace, "created namespace");
    Ok(true)
}
