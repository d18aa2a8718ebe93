/// Source pool to MIG target pool mapping
use super::descriptor::SourcePoolDescriptor;
use super::naming::{derive_target_name, MAX_POOL_NAME_LEN};
use super::params::{AcceleratorParams, NodePoolParams, Scaling, Taint, TargetPoolSpec};
use super::profile::{DriverVersion, MigMode};

pub const MIG_CONFIG_LABEL: &str = "mig.config";
pub const MIG_CONFIG_VALUE: &str = "mixed";
pub const AFFINITY_LABEL: &str = "affinity-key";

/// Taint keeping non-GPU workloads off the new nodes
pub fn gpu_taint() -> Taint {
    Taint::new("nvidia.com/gpu", "present", "NoSchedule")
}

/// Derive the target name and creation parameters for one source pool and mode
pub fn plan_target(descriptor: &SourcePoolDescriptor, mode: &MigMode) -> TargetPoolSpec {
    let name = derive_target_name(&descriptor.name, &mode.suffix(), MAX_POOL_NAME_LEN);
    let params = build_creation_parameters(descriptor, mode, &name);

    TargetPoolSpec {
        name,
        source: descriptor.name.clone(),
        params,
    }
}

/// Copy every set field of `descriptor` and inject the MIG accelerator, labels, taint and scaling
pub fn build_creation_parameters(
    descriptor: &SourcePoolDescriptor,
    mode: &MigMode,
    target_name: &str,
) -> NodePoolParams {
    let accelerator = descriptor
        .accelerator_type
        .as_ref()
        .map(|accelerator_type| match mode {
            MigMode::Legacy => AcceleratorParams {
                accelerator_type: accelerator_type.clone(),
                count: descriptor.accelerator_count,
                partition_size: None,
                driver_version: descriptor
                    .gpu_driver_version
                    .as_deref()
                    .map(|raw| DriverVersion::from_provider(Some(raw))),
            },
            MigMode::Partition(size) => AcceleratorParams {
                accelerator_type: accelerator_type.clone(),
                count: descriptor.accelerator_count,
                partition_size: Some(*size),
                driver_version: Some(DriverVersion::from_provider(
                    descriptor.gpu_driver_version.as_deref(),
                )),
            },
        });

    let mut labels = descriptor.labels.clone();
    labels.insert(MIG_CONFIG_LABEL.to_string(), MIG_CONFIG_VALUE.to_string());
    labels.insert(AFFINITY_LABEL.to_string(), target_name.to_string());

    let mut taints = descriptor.taints.clone();
    let gpu_taint = gpu_taint();
    let rendered = gpu_taint.to_string();
    if !taints.iter().any(|t| t.to_string() == rendered) {
        taints.push(gpu_taint);
    }

    NodePoolParams {
        machine_type: descriptor.machine_type.clone(),
        image_type: descriptor.image_type.clone(),
        disk_type: descriptor.disk_type.clone(),
        disk_size_gb: descriptor.disk_size_gb,
        service_account: descriptor.service_account.clone(),
        accelerator,
        scopes: descriptor.oauth_scopes.clone(),
        scaling: scaling_for(descriptor, mode),
        auto_repair: descriptor.auto_repair,
        auto_upgrade: descriptor.auto_upgrade,
        max_pods_per_node: descriptor.max_pods_per_node,
        node_locations: descriptor.node_locations.clone(),
        spot: descriptor.spot,
        preemptible: descriptor.preemptible,
        local_ssd_count: descriptor.local_ssd_count,
        // Always monitor integrity and never enforce secure boot on MIG nodes
        shielded_integrity_monitoring: true,
        shielded_secure_boot: false,
        labels,
        taints,
        min_cpu_platform: descriptor.min_cpu_platform.clone(),
        reservation_affinity: descriptor.reservation_affinity.clone(),
        sandbox_type: descriptor.sandbox_type.clone(),
    }
}

fn scaling_for(descriptor: &SourcePoolDescriptor, mode: &MigMode) -> Scaling {
    match mode {
        MigMode::Legacy if descriptor.autoscaling_enabled => Scaling::Autoscaling {
            min: descriptor.autoscaling_min,
            max: descriptor.autoscaling_max,
            initial: descriptor.node_count,
        },
        MigMode::Legacy => Scaling::Fixed {
            nodes: descriptor.node_count,
        },
        MigMode::Partition(_) => {
            let (min, max) = if descriptor.autoscaling_enabled {
                (
                    descriptor.autoscaling_min.unwrap_or(1),
                    descriptor.autoscaling_max.unwrap_or(descriptor.node_count),
                )
            } else {
                (1, descriptor.node_count)
            };
            Scaling::Autoscaling {
                min: Some(min),
                max: Some(max.max(min)),
                initial: 0,
            }
        }
    }
}
