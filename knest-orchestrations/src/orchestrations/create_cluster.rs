//! Create nested cluster pipeline
//!
//! Input is validated in full before the first side effect. After that every
//! step runs in order and the first failure aborts the run; steps 1 to 4 are
//! idempotent so re-running after a failure picks up where it stopped. A
//! cancelled token stops the run before the next step that changes anything.

use knest_models::{AddressPoolRequest, MachineMode};
use tracing::info;

use crate::activities::address_pool::allocate_address_pool;
use crate::activities::compose_overlay::{compose, Overlay};
use crate::activities::credential::rewrite_file;
use crate::activities::deploy_cluster::{deploy_documents, stage_manifest};
use crate::activities::ensure_namespace::ensure_namespace;
use crate::activities::get_endpoint::extract_endpoint;
use crate::activities::install_ladder::{default_ladder, install_ladder};
use crate::activities::render_template::render_cluster_manifest;
use crate::error::{Error, ProvisionError, Step, StepContext};
use crate::k8s_client::{set_namespace, split_documents, ResourceRef};
use crate::names::{conditions, kinds};
use crate::orchestrations::ProvisionContext;
use crate::registry::{ensure_provider_registered, ProviderRegistry};
use crate::types::{CreateClusterInput, CreateClusterOutput};

/// Checks that need no cluster access
struct Validated {
    overlay: Overlay,
    address_pool: Option<AddressPoolRequest>,
}

fn validate(input: &CreateClusterInput) -> crate::error::Result<Validated> {
    if input.identity.name.trim().is_empty() {
        return Err(Error::InvalidInput("cluster name must not be empty".to_string()));
    }
    if input.identity.namespace.trim().is_empty() {
        return Err(Error::InvalidInput("target namespace must not be empty".to_string()));
    }

    let mode = input.params.machine_mode();
    let overlay = Overlay::select(mode, input.params.host_cluster_cni.as_deref())?;
    let address_pool = match mode {
        MachineMode::Persistent => Some(AddressPoolRequest::parse(
            &input.identity,
            &input.params.machine_addresses,
        )?),
        MachineMode::Ephemeral => None,
    };

    Ok(Validated {
        overlay,
        address_pool,
    })
}

pub async fn create_cluster(
    ctx: &ProvisionContext<'_>,
    registry: &mut dyn ProviderRegistry,
    input: CreateClusterInput,
) -> Result<CreateClusterOutput, ProvisionError> {
    let identity = &input.identity;
    let params = &input.params;
    info!(
        cluster = %identity,
        mode = ?params.machine_mode(),
        "creating nested cluster"
    );

    let validated = validate(&input).step(Step::Validate)?;

    // Step 1: clusterctl must know the virtink provider
    ctx.waiter.ensure_active().step(Step::EnsureRegistryEntry)?;
    info!("Step 1: ensuring infrastructure provider is registered");
    let registry_updated = ensure_provider_registered(ctx.commands, registry)
        .await
        .step(Step::EnsureRegistryEntry)?;

    // Step 2: host components
    ctx.waiter.ensure_active().step(Step::InstallLadder)?;
    info!("Step 2: installing missing host components");
    let installed = install_ladder(
        &default_ladder(),
        ctx.control_plane,
        ctx.commands,
        ctx.fetcher,
        &ctx.waiter,
    )
    .await
    .step(Step::InstallLadder)?;

    // Step 3: target namespace
    ctx.waiter.ensure_active().step(Step::EnsureNamespace)?;
    info!("Step 3: ensuring target namespace");
    ensure_namespace(ctx.control_plane, &identity.namespace)
        .await
        .step(Step::EnsureNamespace)?;

    // Step 4: address pool (persistent machines only)
    if let Some(pool) = &validated.address_pool {
        ctx.waiter.ensure_active().step(Step::AllocateAddressPool)?;
        info!("Step 4: allocating IP pool");
        allocate_address_pool(ctx.control_plane, &ctx.waiter, pool)
            .await
            .step(Step::AllocateAddressPool)?;
    }

    // Step 5: cluster manifest
    info!("Step 5: generating cluster manifest");
    let manifest = render_cluster_manifest(identity, params, ctx.fetcher)
        .await
        .step(Step::GenerateManifest)?;
    let mut documents = split_documents(&manifest).step(Step::GenerateManifest)?;
    set_namespace(&mut documents, &identity.namespace);

    // Step 6: CNI overlay
    let documents = compose(documents, validated.overlay).step(Step::ApplyOverlay)?;

    // Step 7: apply
    ctx.waiter.ensure_active().step(Step::Apply)?;
    let staged = stage_manifest(&documents).step(Step::Apply)?;
    info!(path = %staged.path().display(), "Step 7: applying cluster manifest");
    println!("starting create cluster by {}", staged.path().display());
    let applied_documents = deploy_documents(ctx.control_plane, &documents)
        .await
        .step(Step::Apply)?;
    drop(staged);

    // Step 8: wait for the first control plane machine
    println!("Waiting for control plane to be initialized...");
    let cluster = ResourceRef::namespaced(kinds::CLUSTER, &identity.namespace, &identity.name);
    ctx.waiter
        .wait_for_condition(ctx.control_plane, &cluster, conditions::CONTROL_PLANE_INITIALIZED)
        .await
        .step(Step::WaitControlPlaneInitialized)?;

    // Step 9: endpoint and credential
    info!("Step 9: reading cluster endpoint");
    let endpoint = extract_endpoint(ctx.control_plane, identity)
        .await
        .step(Step::ExtractEndpoint)?;

    // Step 10: save kubeconfig and route it through the host
    ctx.waiter.ensure_active().step(Step::PersistCredential)?;
    let kubeconfig_path = ctx
        .credentials
        .write(identity, &endpoint.kubeconfig)
        .step(Step::PersistCredential)?;
    let server = ctx.control_plane.host_endpoint().with_port(endpoint.node_port);
    rewrite_file(&kubeconfig_path, &identity.name, &server, &endpoint.cluster_ip)
        .step(Step::PersistCredential)?;

    info!(
        cluster = %identity,
        kubeconfig = %kubeconfig_path.display(),
        server = %server,
        "nested cluster created"
    );

    Ok(CreateClusterOutput {
        identity: identity.clone(),
        kubeconfig_path,
        server,
        tls_server_name: endpoint.cluster_ip,
        installed_components: installed.iter().map(|c| c.to_string()).collect(),
        registry_updated,
        applied_documents,
    })
}
