/// Flattened view of an existing node pool
use std::collections::BTreeMap;

use super::params::{ReservationAffinity, Taint};

/// Configuration of an existing node pool as reported by the provider.
///
/// Every optional field means "not set" when `None`. `node_count` defaults to 1
/// and `accelerator_count` is 0 for pools without GPUs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePoolDescriptor {
    pub name: String,
    pub machine_type: Option<String>,
    pub image_type: Option<String>,
    pub disk_type: Option<String>,
    pub disk_size_gb: Option<u32>,
    pub service_account: Option<String>,
    pub node_count: u32,
    pub accelerator_type: Option<String>,
    pub accelerator_count: u32,
    pub gpu_driver_version: Option<String>,
    /// MIG profile the source accelerator is already split into, if any
    pub partition_size: Option<String>,
    pub oauth_scopes: Vec<String>,
    pub autoscaling_enabled: bool,
    pub autoscaling_min: Option<u32>,
    pub autoscaling_max: Option<u32>,
    pub auto_repair: Option<bool>,
    pub auto_upgrade: Option<bool>,
    pub max_pods_per_node: Option<u32>,
    pub node_locations: Vec<String>,
    pub spot: bool,
    pub preemptible: bool,
    pub local_ssd_count: Option<u32>,
    pub secure_boot: Option<bool>,
    pub integrity_monitoring: Option<bool>,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
    pub min_cpu_platform: Option<String>,
    pub reservation_affinity: Option<ReservationAffinity>,
    pub sandbox_type: Option<String>,
}

impl Default for SourcePoolDescriptor {
    fn default() -> Self {
        Self {
            name: String::new(),
            machine_type: None,
            image_type: None,
            disk_type: None,
            disk_size_gb: None,
            service_account: None,
            node_count: 1,
            accelerator_type: None,
            accelerator_count: 0,
            gpu_driver_version: None,
            partition_size: None,
            oauth_scopes: Vec::new(),
            autoscaling_enabled: false,
            autoscaling_min: None,
            autoscaling_max: None,
            auto_repair: None,
            auto_upgrade: None,
            max_pods_per_node: None,
            node_locations: Vec::new(),
            spot: false,
            preemptible: false,
            local_ssd_count: None,
            secure_boot: None,
            integrity_monitoring: None,
            labels: BTreeMap::new(),
            taints: Vec::new(),
            min_cpu_platform: None,
            reservation_affinity: None,
            sandbox_type: None,
        }
    }
}

impl SourcePoolDescriptor {
    /// Whether the pool has at least one accelerator per node
    pub fn has_gpu(&self) -> bool {
        self.accelerator_type.is_some() && self.accelerator_count > 0
    }
}
