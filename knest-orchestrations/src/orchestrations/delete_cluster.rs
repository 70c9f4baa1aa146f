//! Tear down a nested cluster
//!
//! Deleting the Cluster cascades to every machine and template owned by it.
//! The IP pool has no owner reference and is removed separately. Nothing is
//! deleted once the cancellation token has fired.

use tracing::info;

use crate::error::Result;
use crate::k8s_client::ResourceRef;
use crate::names::kinds;
use crate::orchestrations::ProvisionContext;
use crate::types::{DeleteClusterInput, DeleteClusterOutput};

pub async fn delete_cluster(
    ctx: &ProvisionContext<'_>,
    input: DeleteClusterInput,
) -> Result<DeleteClusterOutput> {
    let identity = &input.identity;
    info!(cluster = %identity, "deleting nested cluster");
    ctx.waiter.ensure_active()?;

    // Step 1: the cluster, blocking until its finalizers have run
    let cluster = ResourceRef::namespaced(kinds::CLUSTER, &identity.namespace, &identity.name);
    let cluster_deleted = ctx.control_plane.delete(&cluster).await?;
    if cluster_deleted {
        ctx.waiter.wait_for_deletion(ctx.control_plane, &cluster).await?;
        info!(resource = %cluster, "deleted");
    } else {
        info!(resource = %cluster, "not found, skipping");
    }

    // Step 2: the address pool of the same name
    let pool = ResourceRef::namespaced(kinds::IP_POOL, &identity.namespace, &identity.name);
    let address_pool_deleted = ctx.control_plane.delete(&pool).await?;
    if address_pool_deleted {
        ctx.waiter.wait_for_deletion(ctx.control_plane, &pool).await?;
        info!(resource = %pool, "deleted");
    }

    // Step 3: local credential
    ctx.waiter.ensure_active()?;
    let kubeconfig_removed = ctx.credentials.remove(identity)?;
    if kubeconfig_removed {
        info!(path = %ctx.credentials.path_for(identity).display(), "removed kubeconfig");
    }

    Ok(DeleteClusterOutput {
        cluster_deleted,
        address_pool_deleted,
        kubeconfig_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::credential::CredentialStore;
    use crate::activities::wait_for_ready::ReadinessWaiter;
    use crate::error::Error;
    use crate::testing::{FakeCommandRunner, FakeControlPlane, StaticFetcher};
    use knest_models::ClusterIdentity;
    use serde_json::json;
    use std::path::Path;
    use tokio_util::sync::CancellationToken;

    async fn delete(cp: &FakeControlPlane, credential_dir: &Path) -> Result<DeleteClusterOutput> {
        delete_with(cp, credential_dir, ReadinessWaiter::default()).await
    }

    async fn delete_with(
        cp: &FakeControlPlane,
        credential_dir: &Path,
        waiter: ReadinessWaiter,
    ) -> Result<DeleteClusterOutput> {
        let commands = FakeCommandRunner::new();
        let fetcher = StaticFetcher::new();
        let ctx = ProvisionContext {
            control_plane: cp,
            commands: &commands,
            fetcher: &fetcher,
            waiter,
            credentials: CredentialStore::new(credential_dir),
        };
        delete_cluster(
            &ctx,
            DeleteClusterInput {
                identity: ClusterIdentity::new("demo", "default"),
            },
        )
        .await
    }

    #[tokio::test]
    async fn test_delete_removes_cluster_pool_and_kubeconfig() {
        let cp = FakeControlPlane::new();
        cp.seed(json!({
            "apiVersion": "cluster.x-k8s.io/v1beta1",
            "kind": "Cluster",
            "metadata": {"name": "demo", "namespace": "default"}
        }))
        .seed(json!({
            "apiVersion": "ipam.metal3.io/v1alpha1",
            "kind": "IPPool",
            "metadata": {"name": "demo", "namespace": "default"}
        }));

        let dir = tempfile::tempdir().unwrap();
        let credential = dir.path().join("knest.default.demo.kubeconfig");
        std::fs::write(&credential, "apiVersion: v1\n").unwrap();

        let output = delete(&cp, dir.path()).await.unwrap();

        assert_eq!(
            output,
            DeleteClusterOutput {
                cluster_deleted: true,
                address_pool_deleted: true,
                kubeconfig_removed: true,
            }
        );
        assert!(!credential.exists());
        let deleted: Vec<_> = cp.deleted.lock().unwrap().iter().map(|r| r.kind.kind).collect();
        assert_eq!(deleted, vec!["Cluster", "IPPool"]);
    }

    #[tokio::test]
    async fn test_delete_nonexistent_cluster_succeeds() {
        let cp = FakeControlPlane::new();
        let dir = tempfile::tempdir().unwrap();

        let output = delete(&cp, dir.path()).await.unwrap();
        assert_eq!(output, DeleteClusterOutput::default());
    }

    #[tokio::test]
    async fn test_cancelled_delete_removes_nothing() {
        let cp = FakeControlPlane::new();
        cp.seed(json!({
            "apiVersion": "cluster.x-k8s.io/v1beta1",
            "kind": "Cluster",
            "metadata": {"name": "demo", "namespace": "default"}
        }));
        let dir = tempfile::tempdir().unwrap();
        let credential = dir.path().join("knest.default.demo.kubeconfig");
        std::fs::write(&credential, "apiVersion: v1\n").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let waiter = ReadinessWaiter::new(std::time::Duration::from_millis(10), cancel);
        let err = delete_with(&cp, dir.path(), waiter).await.unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(cp.deleted.lock().unwrap().is_empty());
        assert!(credential.exists());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let cp = FakeControlPlane::new();
        cp.fail_with("connection refused");
        let dir = tempfile::tempdir().unwrap();

        let err = delete(&cp, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
