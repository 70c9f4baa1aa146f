//! knest orchestrations - provisioning pipelines for nested Kubernetes clusters
//!
//! This crate drives a host cluster through Cluster API, Virtink, CDI and the
//! metal3 ip-address-manager to create, scale, delete and list nested clusters.
//!
//! # Usage
//!
//! ```rust,no_run
//! use knest_models::{ClusterIdentity, ProvisioningParameters};
//! use knest_orchestrations::activities::credential::CredentialStore;
//! use knest_orchestrations::activities::wait_for_ready::ReadinessWaiter;
//! use knest_orchestrations::command::ProcessRunner;
//! use knest_orchestrations::fetch::HttpFetcher;
//! use knest_orchestrations::k8s_client::KubeControlPlane;
//! use knest_orchestrations::orchestrations::{create_cluster::create_cluster, ProvisionContext};
//! use knest_orchestrations::registry::ClusterctlConfig;
//! use knest_orchestrations::CreateClusterInput;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let control_plane = KubeControlPlane::try_default().await?;
//! let ctx = ProvisionContext {
//!     control_plane: &control_plane,
//!     commands: &ProcessRunner,
//!     fetcher: &HttpFetcher::new(),
//!     waiter: ReadinessWaiter::default(),
//!     credentials: CredentialStore::new("/home/me/.kube"),
//! };
//! let mut registry = ClusterctlConfig::new("/home/me/.cluster-api/clusterctl.yaml");
//!
//! let output = create_cluster(
//!     &ctx,
//!     &mut registry,
//!     CreateClusterInput {
//!         identity: ClusterIdentity::new("demo", "default"),
//!         params: ProvisioningParameters::default(),
//!     },
//! )
//! .await?;
//! println!("{}", output.kubeconfig_path.display());
//! # Ok(())
//! # }
//! ```

pub mod activities;
pub mod command;
pub mod error;
pub mod fetch;
pub mod k8s_client;
pub mod names;
pub mod orchestrations;
pub mod registry;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use error::{Error, ProvisionError, Result, Step};
pub use types::*;
