//! Name constants for knest: component versions, resource kinds, well-known objects

/// Virtink release installed on the host cluster
pub const VIRTINK_VERSION: &str = "v0.13.0";

/// cluster-api-provider-virtink release used for `clusterctl init` and templates
pub const VIRTINK_PROVIDER_VERSION: &str = "v0.6.0";

/// metal3 ip-address-manager release
pub const IP_ADDRESS_MANAGER_VERSION: &str = "v1.2.1";

/// Containerized Data Importer release
pub const CDI_VERSION: &str = "v1.55.2";

/// Field manager recorded on every server-side apply
pub const FIELD_MANAGER: &str = "knest";

/// Infrastructure provider entry added to the clusterctl registry
pub mod provider {
    pub const NAME: &str = "virtink";
    pub const TYPE: &str = "InfrastructureProvider";
    pub const URL: &str = "https://github.com/smartxworks/cluster-api-provider-virtink/releases/latest/infrastructure-components.yaml";
}

/// Default machine images, keyed by machine mode
pub mod images {
    pub const KERNEL: &str = "smartxworks/capch-kernel-5.15.12";
    pub const ROOTFS: &str = "smartxworks/capch-rootfs-1.24.0";
    pub const ROOTFS_CDI: &str = "smartxworks/capch-rootfs-cdi-1.24.0";
}

/// Condition types waited on during provisioning
pub mod conditions {
    pub const AVAILABLE: &str = "Available";
    pub const CONTROL_PLANE_INITIALIZED: &str = "ControlPlaneInitialized";
}

/// Resource kinds knest reads or writes
pub mod kinds {
    use crate::k8s_client::ResourceKind;

    pub const NAMESPACE: ResourceKind = ResourceKind::cluster_scoped("v1", "Namespace", "namespaces");
    pub const SERVICE: ResourceKind = ResourceKind::namespaced("v1", "Service", "services");
    pub const SECRET: ResourceKind = ResourceKind::namespaced("v1", "Secret", "secrets");
    pub const DEPLOYMENT: ResourceKind =
        ResourceKind::namespaced("apps/v1", "Deployment", "deployments");
    pub const CRD: ResourceKind = ResourceKind::cluster_scoped(
        "apiextensions.k8s.io/v1",
        "CustomResourceDefinition",
        "customresourcedefinitions",
    );

    pub const CLUSTER: ResourceKind =
        ResourceKind::namespaced("cluster.x-k8s.io/v1beta1", "Cluster", "clusters");
    pub const MACHINE_DEPLOYMENT: ResourceKind = ResourceKind::namespaced(
        "cluster.x-k8s.io/v1beta1",
        "MachineDeployment",
        "machinedeployments",
    );
    pub const KUBEADM_CONTROL_PLANE: ResourceKind = ResourceKind::namespaced(
        "controlplane.cluster.x-k8s.io/v1beta1",
        "KubeadmControlPlane",
        "kubeadmcontrolplanes",
    );
    pub const IP_POOL: ResourceKind =
        ResourceKind::namespaced("ipam.metal3.io/v1alpha1", "IPPool", "ippools");
    pub const CDI: ResourceKind = ResourceKind::cluster_scoped("cdi.kubevirt.io/v1beta1", "CDI", "cdis");

    /// Kinds that never carry a namespace
    pub const CLUSTER_SCOPED: &[&str] = &[
        "Namespace",
        "CustomResourceDefinition",
        "ClusterRole",
        "ClusterRoleBinding",
        "StorageClass",
        "PersistentVolume",
        "PriorityClass",
        "CDI",
    ];
}

/// CRDs whose presence marks a component as installed
pub mod markers {
    pub const VIRTINK_PROVIDER_CRD: &str = "virtinkclusters.infrastructure.cluster.x-k8s.io";
    pub const VIRTINK_CRD: &str = "virtualmachines.virt.virtink.smartx.com";
    pub const CDI_CRD: &str = "datavolumes.cdi.kubevirt.io";
    pub const IPAM_CRD: &str = "ippools.ipam.metal3.io";
}

/// Release manifest URLs
pub mod urls {
    use super::{CDI_VERSION, IP_ADDRESS_MANAGER_VERSION, VIRTINK_VERSION};

    pub fn virtink() -> String {
        format!(
            "https://github.com/smartxworks/virtink/releases/download/{}/virtink.yaml",
            VIRTINK_VERSION
        )
    }

    pub fn cdi_operator() -> String {
        format!(
            "https://github.com/kubevirt/containerized-data-importer/releases/download/{}/cdi-operator.yaml",
            CDI_VERSION
        )
    }

    pub fn cdi_cr() -> String {
        format!(
            "https://github.com/kubevirt/containerized-data-importer/releases/download/{}/cdi-cr.yaml",
            CDI_VERSION
        )
    }

    pub fn ip_address_manager() -> String {
        format!(
            "https://github.com/metal3-io/ip-address-manager/releases/download/{}/ipam-components.yaml",
            IP_ADDRESS_MANAGER_VERSION
        )
    }
}
