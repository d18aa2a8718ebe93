/// GKE node pool operations through the gcloud CLI
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use super::models::{NodePool, NodePoolListing};
use super::NodePoolApi;
use crate::mig::params::{ReservationAffinity, Scaling};
use crate::mig::{SourcePoolDescriptor, TargetPoolSpec};
use crate::utils::command::CommandBuilder;

/// Cluster every gcloud call is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRef {
    pub project: String,
    pub cluster: String,
    pub location: String,
}

impl ClusterRef {
    fn scope_args(&self) -> Vec<String> {
        vec![
            format!("--cluster={}", self.cluster),
            format!("--location={}", self.location),
            format!("--project={}", self.project),
        ]
    }
}

/// gcloud-backed node pool client
pub struct GkeClient {
    cluster: ClusterRef,
}

impl GkeClient {
    pub fn new(cluster: ClusterRef) -> Self {
        Self { cluster }
    }

    /// Check if gcloud is installed
    pub async fn check_gcloud_installed() -> Result<()> {
        crate::utils::command::check_tool_installed(
            "gcloud",
            &["version"],
            "https://cloud.google.com/sdk/docs/install",
        )
        .await
    }

    pub fn cluster(&self) -> &ClusterRef {
        &self.cluster
    }

    /// The exact gcloud invocation that creates `spec`
    pub fn create_command(&self, spec: &TargetPoolSpec) -> CommandBuilder {
        CommandBuilder::new("gcloud")
            .args(["container", "node-pools", "create", spec.name.as_str()])
            .args(node_pool_create_args(&self.cluster, spec))
            .context(format!("Failed to execute gcloud for node pool {}", spec.name))
    }

    /// Write cluster credentials into a private kubeconfig
    pub async fn get_credentials(&self, kubeconfig_path: &Path) -> Result<()> {
        info!(
            "Fetching credentials for cluster {} into {}",
            self.cluster.cluster,
            kubeconfig_path.display()
        );

        if let Some(parent) = kubeconfig_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create kubeconfig directory")?;
        }

        CommandBuilder::new("gcloud")
            .args(["container", "clusters", "get-credentials", self.cluster.cluster.as_str()])
            .arg(format!("--location={}", self.cluster.location))
            .arg(format!("--project={}", self.cluster.project))
            .kubeconfig(kubeconfig_path)
            .context("Failed to execute gcloud get-credentials")
            .run_silent()
            .await
            .context("Failed to fetch cluster credentials")
    }
}

impl NodePoolApi for GkeClient {
    async fn list_node_pools(&self) -> Result<Vec<String>> {
        let pools: Vec<NodePoolListing> = CommandBuilder::new("gcloud")
            .args(["container", "node-pools", "list"])
            .args(self.cluster.scope_args())
            .arg("--format=json")
            .context("Failed to execute gcloud node-pools list")
            .run_json()
            .await
            .context("Failed to list node pools")?;

        Ok(pools.into_iter().map(|p| p.name).collect())
    }

    async fn describe_node_pool(&self, name: &str) -> Result<SourcePoolDescriptor> {
        let pool: NodePool = CommandBuilder::new("gcloud")
            .args(["container", "node-pools", "describe", name])
            .args(self.cluster.scope_args())
            .arg("--format=json")
            .context("Failed to execute gcloud node-pools describe")
            .run_json()
            .await
            .with_context(|| format!("Failed to describe node pool {}", name))?;

        Ok(pool.into())
    }

    async fn create_node_pool(&self, spec: &TargetPoolSpec) -> Result<()> {
        info!("Creating node pool {} (from {})", spec.name, spec.source);

        self.create_command(spec)
            .run_silent()
            .await
            .with_context(|| format!("Failed to create node pool {}", spec.name))?;

        info!("✓ Node pool {} created", spec.name);
        Ok(())
    }
}

/// Serialize creation parameters into `gcloud container node-pools create` flags
pub fn node_pool_create_args(cluster: &ClusterRef, spec: &TargetPoolSpec) -> Vec<String> {
    let params = &spec.params;
    let mut args = cluster.scope_args();

    let mut push_opt = |flag: &str, value: Option<String>| {
        if let Some(value) = value {
            args.push(format!("--{}={}", flag, value));
        }
    };
    push_opt("machine-type", params.machine_type.clone());
    push_opt("image-type", params.image_type.clone());
    push_opt("disk-type", params.disk_type.clone());
    push_opt("disk-size", params.disk_size_gb.map(|gb| format!("{}GB", gb)));
    push_opt("service-account", params.service_account.clone());

    if let Some(accelerator) = &params.accelerator {
        let mut value = format!(
            "type={},count={}",
            accelerator.accelerator_type, accelerator.count
        );
        if let Some(size) = accelerator.partition_size {
            value.push_str(&format!(",gpu-partition-size={}", size));
        }
        if let Some(driver) = accelerator.driver_version {
            value.push_str(&format!(",gpu-driver-version={}", driver));
        }
        args.push(format!("--accelerator={}", value));
    }

    if !params.scopes.is_empty() {
        args.push(format!("--scopes={}", params.scopes.join(",")));
    }

    match params.scaling {
        Scaling::Fixed { nodes } => args.push(format!("--num-nodes={}", nodes)),
        Scaling::Autoscaling { min, max, initial } => {
            args.push(format!("--num-nodes={}", initial));
            args.push("--enable-autoscaling".to_string());
            if let Some(min) = min {
                args.push(format!("--min-nodes={}", min));
            }
            if let Some(max) = max {
                args.push(format!("--max-nodes={}", max));
            }
        }
    }

    if let Some(repair) = params.auto_repair {
        args.push(toggle("enable-autorepair", repair));
    }
    if let Some(upgrade) = params.auto_upgrade {
        args.push(toggle("enable-autoupgrade", upgrade));
    }
    if let Some(max_pods) = params.max_pods_per_node {
        args.push(format!("--max-pods-per-node={}", max_pods));
    }
    if !params.node_locations.is_empty() {
        args.push(format!("--node-locations={}", params.node_locations.join(",")));
    }
    if params.spot {
        args.push("--spot".to_string());
    }
    if params.preemptible {
        args.push("--preemptible".to_string());
    }
    if let Some(count) = params.local_ssd_count {
        args.push(format!("--local-ssd-count={}", count));
    }

    args.push(toggle(
        "shielded-integrity-monitoring",
        params.shielded_integrity_monitoring,
    ));
    args.push(toggle("shielded-secure-boot", params.shielded_secure_boot));

    if !params.labels.is_empty() {
        let labels: Vec<String> = params
            .labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        args.push(format!("--node-labels={}", labels.join(",")));
    }
    if !params.taints.is_empty() {
        let taints: Vec<String> = params.taints.iter().map(|t| t.to_string()).collect();
        args.push(format!("--node-taints={}", taints.join(",")));
    }

    if let Some(platform) = &params.min_cpu_platform {
        args.push(format!("--min-cpu-platform={}", platform));
    }
    match &params.reservation_affinity {
        Some(ReservationAffinity::Any) => args.push("--reservation-affinity=any".to_string()),
        Some(ReservationAffinity::None) => args.push("--reservation-affinity=none".to_string()),
        Some(ReservationAffinity::Specific { reservation }) => {
            args.push("--reservation-affinity=specific".to_string());
            args.push(format!("--reservation={}", reservation));
        }
        None => {}
    }
    if let Some(sandbox) = &params.sandbox_type {
        args.push(format!("--sandbox=type={}", sandbox));
    }

    args.push("--quiet".to_string());
    args
}

fn toggle(flag: &str, on: bool) -> String {
    if on {
        format!("--{}", flag)
    } else {
        format!("--no-{}", flag)
    }
}
