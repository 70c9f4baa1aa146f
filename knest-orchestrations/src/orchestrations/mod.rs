//! Cluster lifecycle pipelines

use crate::activities::credential::CredentialStore;
use crate::activities::wait_for_ready::ReadinessWaiter;
use crate::command::CommandRunner;
use crate::fetch::ManifestFetcher;
use crate::k8s_client::ControlPlane;

pub mod create_cluster;
pub mod delete_cluster;
pub mod list_clusters;
pub mod scale_cluster;

/// Collaborators shared by every pipeline
pub struct ProvisionContext<'a> {
    pub control_plane: &'a dyn ControlPlane,
    pub commands: &'a dyn CommandRunner,
    pub fetcher: &'a dyn ManifestFetcher,
    pub waiter: ReadinessWaiter,
    pub credentials: CredentialStore,
}
