//! Host component install ladder
//!
//! Each rung names a CRD whose presence means the component is installed.
//! Missing components are installed in ladder order and waited on before the
//! next rung is probed, since later components run on top of earlier ones.

use tracing::info;

use crate::activities::ensure_namespace::namespace_document;
use crate::activities::probe::probe;
use crate::activities::wait_for_ready::ReadinessWaiter;
use crate::command::CommandRunner;
use crate::error::{Error, Result};
use crate::fetch::ManifestFetcher;
use crate::k8s_client::{apply_manifest, ControlPlane, ResourceRef};
use crate::names::{conditions, kinds, markers, urls, VIRTINK_PROVIDER_VERSION};

/// One install step of a ladder entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallAction {
    /// `clusterctl <args>`
    Clusterctl { args: Vec<String> },
    /// Fetch a manifest and apply every document in it
    ApplyRemote { url: String },
    CreateNamespace { name: String },
}

/// Resource that must report `condition` before the rung counts as installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessTarget {
    pub resource: ResourceRef,
    pub condition: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderEntry {
    pub component: &'static str,
    pub marker: ResourceRef,
    pub actions: Vec<InstallAction>,
    pub readiness: Vec<ReadinessTarget>,
}

/// Cluster API with the Virtink provider, Virtink, CDI, then ip-address-manager
pub fn default_ladder() -> Vec<LadderEntry> {
    vec![
        LadderEntry {
            component: "Cluster API providers",
            marker: ResourceRef::crd(markers::VIRTINK_PROVIDER_CRD),
            actions: vec![InstallAction::Clusterctl {
                args: vec![
                    "init".to_string(),
                    "--infrastructure".to_string(),
                    format!("virtink:{}", VIRTINK_PROVIDER_VERSION),
                    "--wait-providers".to_string(),
                ],
            }],
            readiness: vec![],
        },
        LadderEntry {
            component: "Virtink",
            marker: ResourceRef::crd(markers::VIRTINK_CRD),
            actions: vec![InstallAction::ApplyRemote { url: urls::virtink() }],
            readiness: vec![ReadinessTarget {
                resource: ResourceRef::namespaced(kinds::DEPLOYMENT, "virtink-system", "virt-controller"),
                condition: conditions::AVAILABLE,
            }],
        },
        LadderEntry {
            component: "CDI",
            marker: ResourceRef::crd(markers::CDI_CRD),
            actions: vec![
                InstallAction::ApplyRemote {
                    url: urls::cdi_operator(),
                },
                InstallAction::ApplyRemote { url: urls::cdi_cr() },
            ],
            readiness: vec![ReadinessTarget {
                resource: ResourceRef::cluster_scoped(kinds::CDI, "cdi"),
                condition: conditions::AVAILABLE,
            }],
        },
        LadderEntry {
            component: "ip-address-manager",
            marker: ResourceRef::crd(markers::IPAM_CRD),
            actions: vec![
                InstallAction::CreateNamespace {
                    name: "capm3-system".to_string(),
                },
                InstallAction::ApplyRemote {
                    url: urls::ip_address_manager(),
                },
            ],
            readiness: vec![ReadinessTarget {
                resource: ResourceRef::namespaced(
                    kinds::DEPLOYMENT,
                    "capm3-system",
                    "ipam-controller-manager",
                ),
                condition: conditions::AVAILABLE,
            }],
        },
    ]
}

async fn run_action(
    action: &InstallAction,
    control_plane: &dyn ControlPlane,
    commands: &dyn CommandRunner,
    fetcher: &dyn ManifestFetcher,
) -> Result<()> {
    match action {
        InstallAction::Clusterctl { args } => commands.run("clusterctl", args).await,
        InstallAction::ApplyRemote { url } => {
            let manifest = fetcher.fetch(url).await?;
            let applied = apply_manifest(control_plane, &manifest).await?;
            info!(url = %url, documents = applied, "applied manifest");
            Ok(())
        }
        InstallAction::CreateNamespace { name } => {
            control_plane.apply(&namespace_document(name)).await
        }
    }
}

/// Walk the ladder, installing what is missing. Returns the components that
/// were installed by this call.
pub async fn install_ladder(
    ladder: &[LadderEntry],
    control_plane: &dyn ControlPlane,
    commands: &dyn CommandRunner,
    fetcher: &dyn ManifestFetcher,
    waiter: &ReadinessWaiter,
) -> Result<Vec<&'static str>> {
    let mut installed = Vec::new();

    for entry in ladder {
        if probe(control_plane, &entry.marker).await?.is_present() {
            info!(component = entry.component, "already installed");
            continue;
        }

        println!("Installing {}", entry.component);
        for action in &entry.actions {
            run_action(action, control_plane, commands, fetcher)
                .await
                .map_err(|e| Error::install(entry.component, e))?;
        }

        if !entry.readiness.is_empty() {
            println!("Waiting for {} to be available...", entry.component);
        }
        for target in &entry.readiness {
            waiter
                .wait_for_condition(control_plane, &target.resource, target.condition)
                .await?;
        }

        info!(component = entry.component, "installed");
        installed.push(entry.component);
    }

    Ok(installed)
}
