//! Cluster manifest generation
//!
//! Both the built-in flavors and caller-supplied templates are rendered from
//! the same variable map, so the two paths agree on every name and default.
//! Built-in flavors are tera templates; `--from` templates use clusterctl's
//! `${VAR}` syntax.

use std::collections::{BTreeMap, BTreeSet};

use knest_models::{ClusterIdentity, Flavor, MachineMode, MachineSpec, ProvisioningParameters};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tera::{Context as TeraContext, Tera};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fetch::ManifestFetcher;
use crate::names::images;

const INTERNAL_TEMPLATE: &str = include_str!("../templates/cluster-template-internal.yaml");
const CDI_INTERNAL_TEMPLATE: &str = include_str!("../templates/cluster-template-cdi-internal.yaml");

/// `${NAME}`, `${NAME:=default}`, `${NAME:-default}`, `${NAME=default}`, `${NAME-default}`
static VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?:(:?[=-])([^}]*))?\}")
        .expect("variable pattern compiles")
});

pub type TemplateVariables = BTreeMap<String, String>;

/// Where the cluster manifest comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Flavor(Flavor),
    /// URL or path of a clusterctl-style template
    From(String),
}

impl TemplateSource {
    pub fn for_parameters(params: &ProvisioningParameters) -> Self {
        match &params.from {
            Some(from) => TemplateSource::From(from.clone()),
            None => TemplateSource::Flavor(params.machine_mode().flavor()),
        }
    }
}

fn kubernetes_version(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

fn insert_machine(vars: &mut TemplateVariables, role: &str, machine: &MachineSpec, mode: MachineMode) {
    let key = |field: &str| format!("VIRTINK_{}_MACHINE_{}", role, field);

    vars.insert(key("CPU_CORES"), machine.cpu_cores.to_string());
    vars.insert(key("MEMORY_SIZE"), machine.memory_size.to_string());
    vars.insert(key("ROOTFS_SIZE"), machine.rootfs_size.to_string());

    match mode {
        MachineMode::Ephemeral => {
            let kernel = machine.kernel_image.as_deref().unwrap_or(images::KERNEL);
            let rootfs = machine.rootfs_image.as_deref().unwrap_or(images::ROOTFS);
            vars.insert(key("KERNEL_IMAGE"), kernel.to_string());
            vars.insert(key("ROOTFS_IMAGE"), rootfs.to_string());
        }
        MachineMode::Persistent => {
            // persistent machines boot the kernel shipped inside the imported disk
            let rootfs = machine.rootfs_image.as_deref().unwrap_or(images::ROOTFS_CDI);
            vars.insert(key("ROOTFS_CDI_IMAGE"), rootfs.to_string());
        }
    }
}

/// Variable map for either template kind
pub fn template_variables(
    identity: &ClusterIdentity,
    params: &ProvisioningParameters,
) -> TemplateVariables {
    let mode = params.machine_mode();
    let mut vars = TemplateVariables::new();

    vars.insert("CLUSTER_NAME".to_string(), identity.name.clone());
    vars.insert("NAMESPACE".to_string(), identity.namespace.clone());
    vars.insert(
        "KUBERNETES_VERSION".to_string(),
        kubernetes_version(&params.kubernetes_version),
    );
    vars.insert(
        "CONTROL_PLANE_MACHINE_COUNT".to_string(),
        params.control_plane_machine_count.to_string(),
    );
    vars.insert(
        "WORKER_MACHINE_COUNT".to_string(),
        params.worker_machine_count.to_string(),
    );
    vars.insert("POD_NETWORK_CIDR".to_string(), params.pod_network_cidr.clone());
    vars.insert("SERVICE_CIDR".to_string(), params.service_cidr.clone());
    vars.insert(
        "VIRTINK_CONTROL_PLANE_SERVICE_TYPE".to_string(),
        "NodePort".to_string(),
    );

    insert_machine(&mut vars, "CONTROL_PLANE", &params.control_plane, mode);
    insert_machine(&mut vars, "WORKER", &params.worker, mode);

    if mode == MachineMode::Persistent {
        vars.insert("VIRTINK_IP_POOL_NAME".to_string(), identity.name.clone());
    }

    vars
}

/// Render a built-in flavor with tera
pub fn render_flavor(flavor: Flavor, vars: &TemplateVariables) -> Result<String> {
    let source = match flavor {
        Flavor::Internal => INTERNAL_TEMPLATE,
        Flavor::CdiInternal => CDI_INTERNAL_TEMPLATE,
    };
    let name = format!("cluster-template-{}", flavor.name());

    let mut tera = Tera::default();
    tera.add_raw_template(&name, source)?;

    let mut context = TeraContext::new();
    for (key, value) in vars {
        context.insert(key.as_str(), value);
    }
    Ok(tera.render(&name, &context)?)
}

/// Expand clusterctl-style variables. Every variable without a value or
/// default is reported in one error.
pub fn expand_variables(template: &str, vars: &TemplateVariables) -> Result<String> {
    let mut missing = BTreeSet::new();

    let expanded = VARIABLE.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        let value = vars.get(name);
        let operator = caps.get(2).map(|m| m.as_str());
        let default = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

        match (operator, value) {
            // `:=` and `:-` also replace an empty value
            (Some(":=") | Some(":-"), Some(v)) if v.is_empty() => default.to_string(),
            (_, Some(v)) => v.clone(),
            (Some(_), None) => default.to_string(),
            (None, None) => {
                missing.insert(name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        let names: Vec<_> = missing.into_iter().collect();
        return Err(Error::template(format!(
            "value for variables [{}] is not set",
            names.join(", ")
        )));
    }
    Ok(expanded.into_owned())
}

/// Produce the cluster manifest for `identity` from its parameters
pub async fn render_cluster_manifest(
    identity: &ClusterIdentity,
    params: &ProvisioningParameters,
    fetcher: &dyn ManifestFetcher,
) -> Result<String> {
    let vars = template_variables(identity, params);
    debug!(variables = vars.len(), "built template variables");

    match TemplateSource::for_parameters(params) {
        TemplateSource::Flavor(flavor) => {
            info!(flavor = %flavor, "rendering built-in cluster template");
            render_flavor(flavor, &vars)
        }
        TemplateSource::From(source) => {
            info!(from = %source, "rendering cluster template");
            let template = fetcher.fetch(&source).await?;
            expand_variables(&template, &vars)
        }
    }
}
