use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use knest_models::ClusterIdentity;
use knest_orchestrations::activities::credential::CredentialStore;
use knest_orchestrations::activities::wait_for_ready::ReadinessWaiter;
use knest_orchestrations::command::ProcessRunner;
use knest_orchestrations::fetch::HttpFetcher;
use knest_orchestrations::k8s_client::KubeControlPlane;
use knest_orchestrations::orchestrations::create_cluster::create_cluster;
use knest_orchestrations::orchestrations::delete_cluster::delete_cluster;
use knest_orchestrations::orchestrations::list_clusters::list_clusters;
use knest_orchestrations::orchestrations::scale_cluster::scale_cluster;
use knest_orchestrations::orchestrations::ProvisionContext;
use knest_orchestrations::registry::ClusterctlConfig;
use knest_orchestrations::types::*;
use tokio_util::sync::CancellationToken;

use crate::cli::CreateFlags;
use crate::config::Config;

/// Host-side collaborators for one invocation
struct Host {
    control_plane: KubeControlPlane,
    fetcher: HttpFetcher,
}

impl Host {
    async fn connect() -> Result<Self> {
        let control_plane = KubeControlPlane::try_default()
            .await
            .context("connect to host cluster")?;
        Ok(Self {
            control_plane,
            fetcher: HttpFetcher::new(),
        })
    }

    fn context(&self, config: &Config, cancel: &CancellationToken) -> ProvisionContext<'_> {
        ProvisionContext {
            control_plane: &self.control_plane,
            commands: &ProcessRunner,
            fetcher: &self.fetcher,
            waiter: ReadinessWaiter::new(config.poll_interval, cancel.clone()),
            credentials: CredentialStore::new(&config.kube_dir),
        }
    }
}

pub async fn run_create(
    config: &Config,
    cancel: &CancellationToken,
    namespace: String,
    name: String,
    flags: CreateFlags,
) -> Result<()> {
    let host = Host::connect().await?;
    let ctx = host.context(config, cancel);
    let mut registry = ClusterctlConfig::new(&config.clusterctl_config);

    let input = CreateClusterInput {
        identity: ClusterIdentity::new(name, namespace),
        params: flags.into_parameters(),
    };

    let output = create_cluster(&ctx, &mut registry, input).await?;

    println!(
        "Your cluster {:?} is now accessible with the kubeconfig file {:?}",
        output.identity.name,
        output.kubeconfig_path.display().to_string()
    );
    Ok(())
}

pub async fn run_delete(config: &Config, cancel: &CancellationToken, namespace: String, name: String) -> Result<()> {
    let host = Host::connect().await?;
    let ctx = host.context(config, cancel);

    let output = delete_cluster(
        &ctx,
        DeleteClusterInput {
            identity: ClusterIdentity::new(name.clone(), namespace),
        },
    )
    .await
    .with_context(|| format!("delete cluster {}", name))?;

    if output.cluster_deleted {
        println!("Cluster {:?} deleted", name);
    } else {
        println!("Cluster {:?} not found", name);
    }
    Ok(())
}

pub async fn run_scale(
    config: &Config,
    cancel: &CancellationToken,
    namespace: String,
    name: String,
    control_plane_machine_count: Option<u32>,
    worker_machine_count: Option<u32>,
) -> Result<()> {
    let host = Host::connect().await?;
    let ctx = host.context(config, cancel);

    let output = scale_cluster(
        &ctx,
        ScaleClusterInput {
            identity: ClusterIdentity::new(name.clone(), namespace),
            control_plane_machine_count,
            worker_machine_count,
        },
    )
    .await
    .with_context(|| format!("scale cluster {}", name))?;

    if output.control_plane_patched {
        println!("Control plane of {:?} scaled to {}", name, control_plane_machine_count.unwrap_or_default());
    }
    if output.workers_patched {
        println!("Workers of {:?} scaled to {}", name, worker_machine_count.unwrap_or_default());
    }
    Ok(())
}

pub async fn run_list(namespace: String, output: String) -> Result<()> {
    if output != "table" && output != "json" {
        anyhow::bail!("unsupported output format: {}", output);
    }

    let host = Host::connect().await?;
    let clusters = list_clusters(&host.control_plane, &namespace)
        .await
        .context("list clusters")?;

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&clusters)?);
    } else {
        print!("{}", render_table(&clusters, Utc::now()));
    }
    Ok(())
}

fn render_table(clusters: &[ClusterSummary], now: DateTime<Utc>) -> String {
    let mut out = format!(
        "{:<20} {:<15} {:<15} {:<15} {}\n",
        "NAME", "PHASE", "CONTROL PLANE", "INFRASTRUCTURE", "AGE"
    );
    for cluster in clusters {
        out.push_str(&format!(
            "{:<20} {:<15} {:<15} {:<15} {}\n",
            cluster.name,
            cluster.phase.as_deref().unwrap_or("-"),
            cluster.control_plane_ready,
            cluster.infrastructure_ready,
            cluster
                .created
                .map(|created| format_age(now - created))
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}

/// kubectl-style short age: `45s`, `12m`, `3h`, `5d`
fn format_age(age: chrono::Duration) -> String {
    let seconds = age.num_seconds().max(0);
    match seconds {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::seconds(45)), "45s");
        assert_eq!(format_age(Duration::minutes(12)), "12m");
        assert_eq!(format_age(Duration::hours(3)), "3h");
        assert_eq!(format_age(Duration::days(5)), "5d");
        assert_eq!(format_age(Duration::seconds(-3)), "0s");
    }

    #[test]
    fn test_render_table() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 6, 0, 0).unwrap();
        let clusters = vec![
            ClusterSummary {
                name: "demo".to_string(),
                namespace: "default".to_string(),
                phase: Some("Provisioned".to_string()),
                control_plane_ready: true,
                infrastructure_ready: true,
                created: Some(Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).unwrap()),
            },
            ClusterSummary {
                name: "pending".to_string(),
                namespace: "default".to_string(),
                phase: None,
                control_plane_ready: false,
                infrastructure_ready: false,
                created: None,
            },
        ];

        let table = render_table(&clusters, now);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[1].starts_with("demo"));
        assert!(lines[1].contains("Provisioned"));
        assert!(lines[1].ends_with("3h"));
        assert!(lines[2].ends_with("-"));
    }
}
