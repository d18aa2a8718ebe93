/// Typed node pool creation parameters
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::profile::{DriverVersion, PartitionSize};

/// Node taint in `key=value:Effect` form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    pub value: String,
    /// `NoSchedule`, `PreferNoSchedule` or `NoExecute`
    pub effect: String,
}

impl Taint {
    pub fn new(key: impl Into<String>, value: impl Into<String>, effect: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            effect: effect.into(),
        }
    }
}

impl fmt::Display for Taint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}:{}", self.key, self.value, self.effect)
    }
}

/// Which reservations the pool's VMs may consume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationAffinity {
    Any,
    None,
    Specific { reservation: String },
}

/// Accelerator attached to every node of the new pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceleratorParams {
    pub accelerator_type: String,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_size: Option<PartitionSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_version: Option<DriverVersion>,
}

/// Node count handling for the new pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Scaling {
    Fixed { nodes: u32 },
    /// Unset bounds are left for the provider to default
    Autoscaling {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<u32>,
        initial: u32,
    },
}

/// Everything the create call needs, independent of how the provider CLI spells it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodePoolParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerator: Option<AcceleratorParams>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    pub scaling: Scaling,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_repair: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_upgrade: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pods_per_node: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub node_locations: Vec<String>,
    pub spot: bool,
    pub preemptible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_ssd_count: Option<u32>,
    pub shielded_integrity_monitoring: bool,
    pub shielded_secure_boot: bool,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_cpu_platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_affinity: Option<ReservationAffinity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_type: Option<String>,
}

/// A node pool to be created, with the pool it was cloned from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetPoolSpec {
    pub name: String,
    pub source: String,
    pub params: NodePoolParams,
}
