//! IP address pool for persistent machines

use knest_models::AddressPoolRequest;
use tera::{Context as TeraContext, Tera};
use tracing::info;

use crate::activities::wait_for_ready::ReadinessWaiter;
use crate::error::Result;
use crate::k8s_client::{apply_manifest, ControlPlane, ResourceRef};
use crate::names::kinds;

const IPPOOL_TEMPLATE: &str = include_str!("../templates/ippool.yaml");

pub fn pool_ref(request: &AddressPoolRequest) -> ResourceRef {
    ResourceRef::namespaced(kinds::IP_POOL, &request.namespace, &request.name)
}

pub fn render_address_pool(request: &AddressPoolRequest) -> Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template("ippool", IPPOOL_TEMPLATE)?;

    let context = TeraContext::from_serialize(request)?;
    Ok(tera.render("ippool", &context)?)
}

/// Replace any pool of the same name with a freshly rendered one
pub async fn allocate_address_pool(
    control_plane: &dyn ControlPlane,
    waiter: &ReadinessWaiter,
    request: &AddressPoolRequest,
) -> Result<()> {
    let pool = pool_ref(request);

    // Step 1: drop the previous pool, if any
    if control_plane.delete(&pool).await? {
        info!(pool = %pool, "deleted existing IP pool");
        waiter.wait_for_deletion(control_plane, &pool).await?;
    }

    // Step 2: create the new one
    let manifest = render_address_pool(request)?;
    apply_manifest(control_plane, &manifest).await?;
    info!(pool = %pool, ranges = request.pools.len(), "created IP pool");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s_client::split_documents;
    use crate::testing::FakeControlPlane;
    use knest_models::ClusterIdentity;
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn request(tokens: &[&str]) -> AddressPoolRequest {
        AddressPoolRequest::parse(&ClusterIdentity::new("demo", "default"), tokens).unwrap()
    }

    #[test]
    fn test_render_mixed_ranges() {
        let rendered = render_address_pool(&request(&["10.0.0.0/24", "10.0.1.10-10.0.1.20"])).unwrap();
        let docs = split_documents(&rendered).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["kind"], "IPPool");
        assert_eq!(docs[0]["metadata"]["namespace"], "default");
        assert_eq!(
            docs[0]["spec"]["pools"],
            json!([
                {"subnet": "10.0.0.0/24"},
                {"start": "10.0.1.10", "end": "10.0.1.20"}
            ])
        );
    }

    #[test]
    fn test_render_empty_pool_list() {
        let docs = split_documents(&render_address_pool(&request(&[])).unwrap()).unwrap();
        assert_eq!(docs[0]["spec"]["pools"], json!([]));
    }

    #[tokio::test]
    async fn test_allocate_replaces_existing_pool() {
        let cp = FakeControlPlane::new();
        cp.seed(json!({
            "apiVersion": "ipam.metal3.io/v1alpha1",
            "kind": "IPPool",
            "metadata": {"name": "demo", "namespace": "default"},
            "spec": {"pools": [{"subnet": "192.168.0.0/24"}]}
        }));
        let waiter = ReadinessWaiter::new(Duration::from_millis(10), CancellationToken::new());
        let req = request(&["10.0.0.0/24"]);

        allocate_address_pool(&cp, &waiter, &req).await.unwrap();

        assert_eq!(cp.deleted.lock().unwrap().len(), 1);
        let pool = cp.object(&pool_ref(&req)).unwrap();
        assert_eq!(pool["spec"]["pools"], json!([{"subnet": "10.0.0.0/24"}]));
    }
}
