use clap::{Args as ClapArgs, Parser, Subcommand};
use knest_models::{ProvisioningParameters, Quantity};

/// knest - nested Kubernetes clusters on Virtink
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The namespace to use for the nested cluster
    #[arg(short = 'n', long, global = true, default_value = "default")]
    pub target_namespace: String,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Create a nested cluster
    Create {
        /// Name of the nested cluster
        name: String,

        #[command(flatten)]
        flags: CreateFlags,
    },

    /// Delete a nested cluster
    Delete {
        /// Name of the nested cluster
        name: String,
    },

    /// List nested clusters
    List {
        /// Output format; available options are 'table' and 'json'
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Scale a nested cluster
    Scale {
        /// Name of the nested cluster
        name: String,

        /// The number of control plane machines for the nested cluster
        #[arg(long)]
        control_plane_machine_count: Option<u32>,

        /// The number of worker machines for the nested cluster
        #[arg(long)]
        worker_machine_count: Option<u32>,
    },

    /// Print knest version
    Version {
        /// Output format; available options are 'json'
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(ClapArgs, Debug)]
pub struct CreateFlags {
    /// The Kubernetes version to use for the nested cluster
    #[arg(long, default_value = "1.24.0")]
    pub kubernetes_version: String,

    /// The number of control plane machines for the nested cluster
    #[arg(long, default_value_t = 1)]
    pub control_plane_machine_count: u32,

    /// The number of worker machines for the nested cluster
    #[arg(long, default_value_t = 1)]
    pub worker_machine_count: u32,

    /// Range of IP addresses for the pod network
    #[arg(long, default_value = "192.168.0.0/16")]
    pub pod_network_cidr: String,

    /// Range of IP addresses for service VIPs
    #[arg(long, default_value = "10.96.0.0/12")]
    pub service_cidr: String,

    /// The CPU cores of each control plane machine
    #[arg(long, default_value_t = 2)]
    pub control_plane_machine_cpu_cores: u32,

    /// The memory size of each control plane machine
    #[arg(long, default_value = "4Gi")]
    pub control_plane_machine_memory_size: Quantity,

    /// The kernel image of control plane machines
    #[arg(long)]
    pub control_plane_machine_kernel_image: Option<String>,

    /// The rootfs image of control plane machines
    #[arg(long)]
    pub control_plane_machine_rootfs_image: Option<String>,

    /// The rootfs size of each control plane machine
    #[arg(long, default_value = "4Gi")]
    pub control_plane_machine_rootfs_size: Quantity,

    /// The CPU cores of each worker machine
    #[arg(long, default_value_t = 2)]
    pub worker_machine_cpu_cores: u32,

    /// The memory size of each worker machine
    #[arg(long, default_value = "4Gi")]
    pub worker_machine_memory_size: Quantity,

    /// The kernel image of worker machines
    #[arg(long)]
    pub worker_machine_kernel_image: Option<String>,

    /// The rootfs image of worker machines
    #[arg(long)]
    pub worker_machine_rootfs_image: Option<String>,

    /// The rootfs size of each worker machine
    #[arg(long, default_value = "4Gi")]
    pub worker_machine_rootfs_size: Quantity,

    /// Machines get persistent storage and IP addresses
    #[arg(long)]
    pub persistent: bool,

    /// Candidate IP addresses for persistent machines (subnets or start-end ranges)
    #[arg(long, value_delimiter = ',')]
    pub machine_addresses: Vec<String>,

    /// The CNI of the host cluster, 'calico' or 'kube-ovn'
    #[arg(long)]
    pub host_cluster_cni: Option<String>,

    /// URL or path of a cluster template to use instead of the built-in ones
    #[arg(long)]
    pub from: Option<String>,
}

impl CreateFlags {
    pub fn into_parameters(self) -> ProvisioningParameters {
        use knest_models::MachineSpec;

        ProvisioningParameters {
            kubernetes_version: self.kubernetes_version,
            control_plane_machine_count: self.control_plane_machine_count,
            worker_machine_count: self.worker_machine_count,
            pod_network_cidr: self.pod_network_cidr,
            service_cidr: self.service_cidr,
            control_plane: MachineSpec {
                cpu_cores: self.control_plane_machine_cpu_cores,
                memory_size: self.control_plane_machine_memory_size,
                kernel_image: self.control_plane_machine_kernel_image,
                rootfs_image: self.control_plane_machine_rootfs_image,
                rootfs_size: self.control_plane_machine_rootfs_size,
            },
            worker: MachineSpec {
                cpu_cores: self.worker_machine_cpu_cores,
                memory_size: self.worker_machine_memory_size,
                kernel_image: self.worker_machine_kernel_image,
                rootfs_image: self.worker_machine_rootfs_image,
                rootfs_size: self.worker_machine_rootfs_size,
            },
            persistent: self.persistent,
            machine_addresses: self.machine_addresses,
            host_cluster_cni: self.host_cluster_cni,
            from: self.from,
        }
    }
}
