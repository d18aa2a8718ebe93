/// GKE node pool data models as returned by `gcloud --format=json`
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

use crate::mig::params::{ReservationAffinity, Taint};
use crate::mig::SourcePoolDescriptor;

/// Entry of `gcloud container node-pools list`
#[derive(Debug, Clone, Deserialize)]
pub struct NodePoolListing {
    pub name: String,
}

/// GKE node pool resource
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    pub name: String,
    #[serde(default)]
    pub config: NodeConfig,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub initial_node_count: Option<u32>,
    #[serde(default)]
    pub autoscaling: Option<NodePoolAutoscaling>,
    #[serde(default)]
    pub management: Option<NodeManagement>,
    #[serde(default)]
    pub max_pods_constraint: Option<MaxPodsConstraint>,
    #[serde(default)]
    pub locations: Vec<String>,
}

/// Node VM configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub machine_type: Option<String>,
    pub image_type: Option<String>,
    pub disk_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub disk_size_gb: Option<u32>,
    pub service_account: Option<String>,
    #[serde(default)]
    pub oauth_scopes: Vec<String>,
    #[serde(default)]
    pub accelerators: Vec<AcceleratorConfig>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub taints: Vec<NodeTaint>,
    pub min_cpu_platform: Option<String>,
    #[serde(default)]
    pub spot: bool,
    #[serde(default)]
    pub preemptible: bool,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub local_ssd_count: Option<u32>,
    pub shielded_instance_config: Option<ShieldedInstanceConfig>,
    pub reservation_affinity: Option<ReservationAffinityConfig>,
    pub sandbox_config: Option<SandboxConfig>,
}

/// GPU attached to each node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorConfig {
    pub accelerator_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub accelerator_count: Option<u32>,
    pub gpu_partition_size: Option<String>,
    pub gpu_driver_installation_config: Option<GpuDriverInstallationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuDriverInstallationConfig {
    pub gpu_driver_version: Option<String>,
}

/// Kubernetes taint as the API spells it (`NO_SCHEDULE`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeTaint {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub effect: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldedInstanceConfig {
    pub enable_secure_boot: Option<bool>,
    pub enable_integrity_monitoring: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationAffinityConfig {
    pub consume_reservation_type: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SandboxConfig {
    #[serde(rename = "type")]
    pub sandbox_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolAutoscaling {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub min_node_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub max_node_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeManagement {
    pub auto_repair: Option<bool>,
    pub auto_upgrade: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxPodsConstraint {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub max_pods_per_node: Option<u32>,
}

/// int64 fields arrive as JSON strings; anything unparseable is treated as unset
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => u32::try_from(n).ok(),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        Some(Raw::Other(_)) | None => None,
    })
}

/// `NO_SCHEDULE` -> `NoSchedule`
fn taint_effect(api_effect: &str) -> String {
    match api_effect {
        "NO_SCHEDULE" => "NoSchedule".to_string(),
        "PREFER_NO_SCHEDULE" => "PreferNoSchedule".to_string(),
        "NO_EXECUTE" => "NoExecute".to_string(),
        other => other.to_string(),
    }
}

impl ReservationAffinityConfig {
    fn to_affinity(&self) -> Option<ReservationAffinity> {
        match self.consume_reservation_type.as_deref()? {
            "ANY_RESERVATION" => Some(ReservationAffinity::Any),
            "NO_RESERVATION" => Some(ReservationAffinity::None),
            "SPECIFIC_RESERVATION" => self
                .values
                .first()
                .map(|reservation| ReservationAffinity::Specific {
                    reservation: reservation.clone(),
                }),
            _ => None,
        }
    }
}

impl From<NodePool> for SourcePoolDescriptor {
    fn from(pool: NodePool) -> Self {
        let config = pool.config;
        let accelerator = config.accelerators.into_iter().next().unwrap_or_default();
        let autoscaling = pool.autoscaling.unwrap_or_default();
        let management = pool.management.unwrap_or_default();
        let shielded = config.shielded_instance_config.unwrap_or_default();

        SourcePoolDescriptor {
            name: pool.name,
            machine_type: config.machine_type,
            image_type: config.image_type,
            disk_type: config.disk_type,
            disk_size_gb: config.disk_size_gb,
            service_account: config.service_account,
            node_count: pool.initial_node_count.unwrap_or(1),
            accelerator_type: accelerator.accelerator_type,
            accelerator_count: accelerator.accelerator_count.unwrap_or(0),
            gpu_driver_version: accelerator
                .gpu_driver_installation_config
                .and_then(|c| c.gpu_driver_version),
            partition_size: accelerator.gpu_partition_size,
            oauth_scopes: config.oauth_scopes,
            autoscaling_enabled: autoscaling.enabled,
            autoscaling_min: autoscaling.min_node_count,
            autoscaling_max: autoscaling.max_node_count,
            auto_repair: management.auto_repair,
            auto_upgrade: management.auto_upgrade,
            max_pods_per_node: pool.max_pods_constraint.and_then(|c| c.max_pods_per_node),
            node_locations: pool.locations,
            spot: config.spot,
            preemptible: config.preemptible,
            local_ssd_count: config.local_ssd_count,
            secure_boot: shielded.enable_secure_boot,
            integrity_monitoring: shielded.enable_integrity_monitoring,
            labels: config.labels,
            taints: config
                .taints
                .into_iter()
                .map(|t| Taint::new(t.key, t.value, taint_effect(&t.effect)))
                .collect(),
            min_cpu_platform: config.min_cpu_platform,
            reservation_affinity: config
                .reservation_affinity
                .as_ref()
                .and_then(ReservationAffinityConfig::to_affinity),
            sandbox_type: config
                .sandbox_config
                .and_then(|s| s.sandbox_type)
                .map(|t| t.to_ascii_lowercase()),
        }
    }
}
