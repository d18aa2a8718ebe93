/// Sequential node pool migration: list, skip, describe, map, confirm, create
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::confirm::Confirm;
use crate::gke::{GkeClient, NodePoolApi};
use crate::mig::{
    derive_target_name, plan_target, should_skip, skip_reason, MigMode, SkipReason,
    SourcePoolDescriptor, TargetPoolSpec, Variant, MAX_POOL_NAME_LEN,
};

/// A source pool (or one of its targets) left alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPool {
    pub source: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// A pool whose describe or create call failed
#[derive(Debug, Clone, Serialize)]
pub struct FailedPool {
    pub pool: String,
    pub error: String,
}

/// Outcome of one migration run
#[derive(Debug, Default, Serialize)]
pub struct MigrationReport {
    pub created: Vec<String>,
    pub planned: Vec<TargetPoolSpec>,
    pub skipped: Vec<SkippedPool>,
    pub declined: Vec<String>,
    pub failed: Vec<FailedPool>,
}

impl MigrationReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    fn skip(&mut self, source: &str, reason: SkipReason) {
        info!("Skipping {}: {}", source, reason);
        self.skipped.push(SkippedPool {
            source: source.to_string(),
            reason,
        });
    }

    fn fail(&mut self, pool: &str, err: anyhow::Error) {
        error!("{}: {:#}", pool, err);
        self.failed.push(FailedPool {
            pool: pool.to_string(),
            error: format!("{:#}", err),
        });
    }
}

/// Dry-run output: what would be created and the exact commands
#[derive(Debug, Serialize)]
pub struct Plan {
    pub generated_at: DateTime<Utc>,
    pub project: String,
    pub cluster: String,
    pub location: String,
    pub variant: String,
    pub pools: Vec<PlannedPool>,
    pub skipped: Vec<SkippedPool>,
}

#[derive(Debug, Serialize)]
pub struct PlannedPool {
    pub command: String,
    #[serde(flatten)]
    pub spec: TargetPoolSpec,
}

pub const PLAN_FILE: &str = "plan.yaml";

impl Plan {
    pub fn from_report(client: &GkeClient, variant: &Variant, report: &MigrationReport) -> Self {
        let cluster = client.cluster();
        Self {
            generated_at: Utc::now(),
            project: cluster.project.clone(),
            cluster: cluster.cluster.clone(),
            location: cluster.location.clone(),
            variant: variant.to_string(),
            pools: report
                .planned
                .iter()
                .map(|spec| PlannedPool {
                    command: client.create_command(spec).command_line(),
                    spec: spec.clone(),
                })
                .collect(),
            skipped: report.skipped.clone(),
        }
    }

    /// Write the plan as YAML into `output_dir`
    pub async fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .context("Failed to create output directory")?;

        let path = output_dir.join(PLAN_FILE);
        let yaml = serde_yaml::to_string(self).context("Failed to serialize plan")?;
        tokio::fs::write(&path, yaml)
            .await
            .context("Failed to write plan")?;

        Ok(path)
    }
}

/// Drives one migration run against a node pool API
pub struct Migrator<'a, A, C> {
    api: &'a A,
    confirm: &'a C,
    dry_run: bool,
}

impl<'a, A: NodePoolApi, C: Confirm> Migrator<'a, A, C> {
    pub fn new(api: &'a A, confirm: &'a C, dry_run: bool) -> Self {
        Self {
            api,
            confirm,
            dry_run,
        }
    }

    /// Clone every GPU pool according to `variant`, one pool at a time.
    ///
    /// Only the initial listing is fatal. Per-pool failures are recorded and the run continues.
    pub async fn run(&self, variant: &Variant) -> Result<MigrationReport> {
        info!("Starting {} MIG migration", variant);

        let pools = self
            .api
            .list_node_pools()
            .await
            .context("Failed to list node pools")?;
        info!("Found {} node pools", pools.len());

        let mut known: BTreeSet<String> = pools.iter().cloned().collect();
        let mut planned_from: BTreeMap<String, String> = BTreeMap::new();
        let mut report = MigrationReport::default();

        for source in &pools {
            let mut modes = Vec::new();
            for mode in variant.modes() {
                match self.check_target(source, &mode, variant, &known, &planned_from) {
                    Some(reason @ SkipReason::AlreadyMig { .. }) => {
                        report.skip(source, reason);
                        modes.clear();
                        break;
                    }
                    Some(reason) => report.skip(source, reason),
                    None => modes.push(mode),
                }
            }
            if modes.is_empty() {
                continue;
            }

            let descriptor = match self.api.describe_node_pool(source).await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    report.fail(source, e);
                    continue;
                }
            };

            if !descriptor.has_gpu() {
                report.skip(source, SkipReason::NoGpu);
                continue;
            }

            if descriptor.secure_boot == Some(true) {
                warn!(
                    "{} has secure boot enabled; MIG pools are created with secure boot disabled",
                    source
                );
            }
            if descriptor.integrity_monitoring == Some(false) {
                info!("{}: integrity monitoring will be enabled on MIG pools", source);
            }

            for mode in modes {
                let spec = plan_target(&descriptor, &mode);

                if self.dry_run {
                    info!("Would create node pool {} from {}", spec.name, source);
                    known.insert(spec.name.clone());
                    planned_from.insert(spec.name.clone(), source.clone());
                    report.planned.push(spec);
                    continue;
                }

                let question = format!("Create node pool {} from {}?", spec.name, source);
                if !self.confirm.confirm(&question) {
                    info!("Declined creation of {}", spec.name);
                    report.declined.push(spec.name);
                    continue;
                }

                match self.api.create_node_pool(&spec).await {
                    Ok(()) => {
                        known.insert(spec.name.clone());
                        planned_from.insert(spec.name.clone(), source.clone());
                        report.created.push(spec.name);
                    }
                    Err(e) => report.fail(&spec.name, e),
                }
            }
        }

        info!(
            "Migration finished: {} created, {} planned, {} skipped, {} declined, {} failed",
            report.created.len(),
            report.planned.len(),
            report.skipped.len(),
            report.declined.len(),
            report.failed.len()
        );

        Ok(report)
    }

    fn check_target(
        &self,
        source: &str,
        mode: &MigMode,
        variant: &Variant,
        known: &BTreeSet<String>,
        planned_from: &BTreeMap<String, String>,
    ) -> Option<SkipReason> {
        let suffix = mode.suffix();
        let target = derive_target_name(source, &suffix, MAX_POOL_NAME_LEN);

        if let Some(other) = planned_from.get(&target).filter(|other| *other != source) {
            return Some(SkipReason::NameCollision {
                target,
                planned_from: other.clone(),
            });
        }

        skip_reason(source, known, variant, &suffix)
    }
}

/// One row of the pool inventory
#[derive(Debug)]
pub struct PoolStatus {
    pub name: String,
    /// `None` when the describe call failed
    pub pool: Option<SourcePoolDescriptor>,
    /// Whether `variant` would still create at least one target for it
    pub pending: bool,
}

/// Describe every pool and work out which are still to be migrated.
///
/// A pool that cannot be described is reported without details and the survey continues.
pub async fn survey<A: NodePoolApi>(api: &A, variant: &Variant) -> Result<Vec<PoolStatus>> {
    let names = api
        .list_node_pools()
        .await
        .context("Failed to list node pools")?;
    let known: BTreeSet<String> = names.iter().cloned().collect();

    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let pool = match api.describe_node_pool(&name).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("{}: unavailable: {:#}", name, e);
                None
            }
        };
        let pending = pool.as_ref().is_some_and(|pool| {
            pool.has_gpu()
                && variant
                    .modes()
                    .iter()
                    .any(|mode| !should_skip(&name, &known, variant, &mode.suffix()))
        });
        rows.push(PoolStatus {
            name,
            pool,
            pending,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gke::ClusterRef;
    use crate::mig::params::Scaling;
    use crate::mig::PartitionSize;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeApi {
        pools: Vec<SourcePoolDescriptor>,
        /// Listed but failing to describe
        missing: Vec<String>,
        fail_create: Option<String>,
        created: RefCell<Vec<TargetPoolSpec>>,
        described: RefCell<Vec<String>>,
    }

    impl NodePoolApi for FakeApi {
        async fn list_node_pools(&self) -> Result<Vec<String>> {
            Ok(self
                .pools
                .iter()
                .map(|p| p.name.clone())
                .chain(self.missing.iter().cloned())
                .collect())
        }

        async fn describe_node_pool(&self, name: &str) -> Result<SourcePoolDescriptor> {
            self.described.borrow_mut().push(name.to_string());
            self.pools
                .iter()
                .find(|p| p.name == name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("node pool {} not found", name))
        }

        async fn create_node_pool(&self, spec: &TargetPoolSpec) -> Result<()> {
            if self.fail_create.as_deref() == Some(spec.name.as_str()) {
                anyhow::bail!("quota exceeded");
            }
            self.created.borrow_mut().push(spec.clone());
            Ok(())
        }
    }

    struct Scripted(RefCell<VecDeque<bool>>);

    impl Scripted {
        fn answers(answers: &[bool]) -> Self {
            Self(RefCell::new(answers.iter().copied().collect()))
        }
    }

    impl Confirm for Scripted {
        fn confirm(&self, _message: &str) -> bool {
            self.0.borrow_mut().pop_front().unwrap_or(false)
        }
    }

    struct Always;

    impl Confirm for Always {
        fn confirm(&self, _message: &str) -> bool {
            true
        }
    }

    fn gpu_pool(name: &str) -> SourcePoolDescriptor {
        SourcePoolDescriptor {
            name: name.to_string(),
            machine_type: Some("a2-highgpu-1g".to_string()),
            node_count: 2,
            accelerator_type: Some("nvidia-tesla-a100".to_string()),
            accelerator_count: 1,
            ..Default::default()
        }
    }

    fn cpu_pool(name: &str) -> SourcePoolDescriptor {
        SourcePoolDescriptor {
            name: name.to_string(),
            machine_type: Some("e2-standard-4".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_legacy_run_creates_gpu_pools_only() {
        let api = FakeApi {
            pools: vec![cpu_pool("default-pool"), gpu_pool("a100")],
            ..Default::default()
        };

        let report = Migrator::new(&api, &Always, false)
            .run(&Variant::Legacy)
            .await
            .unwrap();

        assert_eq!(report.created, vec!["a100-mig-enabled"]);
        assert_eq!(
            report.skipped,
            vec![SkippedPool {
                source: "default-pool".to_string(),
                reason: SkipReason::NoGpu
            }]
        );
        assert_eq!(api.created.borrow()[0].params.scaling, Scaling::Fixed { nodes: 2 });
    }

    #[tokio::test]
    async fn test_existing_mig_pools_not_described() {
        let api = FakeApi {
            pools: vec![gpu_pool("a100"), gpu_pool("a100-mig-enabled"), gpu_pool("t4")],
            ..Default::default()
        };

        let report = Migrator::new(&api, &Always, false)
            .run(&Variant::Legacy)
            .await
            .unwrap();

        assert_eq!(report.created, vec!["t4-mig-enabled"]);
        assert_eq!(*api.described.borrow(), vec!["t4"]);
        assert!(report.skipped.iter().any(|s| s.source == "a100"
            && s.reason
                == SkipReason::TargetExists {
                    target: "a100-mig-enabled".to_string()
                }));
        assert!(report
            .skipped
            .iter()
            .any(|s| s.source == "a100-mig-enabled" && matches!(s.reason, SkipReason::AlreadyMig { .. })));
    }

    #[tokio::test]
    async fn test_partitioned_run_creates_one_pool_per_size() {
        let api = FakeApi {
            pools: vec![gpu_pool("a100"), gpu_pool("a100-mig-2g-10gb")],
            ..Default::default()
        };
        let variant = Variant::Partitioned(vec![
            PartitionSize::OneG5Gb,
            PartitionSize::TwoG10Gb,
            PartitionSize::ThreeG20Gb,
        ]);

        let report = Migrator::new(&api, &Always, false).run(&variant).await.unwrap();

        assert_eq!(report.created, vec!["a100-mig-1g-5gb", "a100-mig-3g-20gb"]);
        assert_eq!(*api.described.borrow(), vec!["a100"]);
        for spec in api.created.borrow().iter() {
            assert_eq!(
                spec.params.scaling,
                Scaling::Autoscaling {
                    min: Some(1),
                    max: Some(2),
                    initial: 0
                }
            );
        }
    }

    #[tokio::test]
    async fn test_declined_and_failed_pools_do_not_stop_the_run() {
        let api = FakeApi {
            pools: vec![gpu_pool("a"), gpu_pool("b"), gpu_pool("c")],
            fail_create: Some("b-mig-enabled".to_string()),
            ..Default::default()
        };
        let confirm = Scripted::answers(&[false, true, true]);

        let report = Migrator::new(&api, &confirm, false)
            .run(&Variant::Legacy)
            .await
            .unwrap();

        assert_eq!(report.declined, vec!["a-mig-enabled"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].pool, "b-mig-enabled");
        assert!(report.failed[0].error.contains("quota exceeded"));
        assert_eq!(report.created, vec!["c-mig-enabled"]);
        assert!(report.has_failures());
    }

    #[tokio::test]
    async fn test_truncation_collision_detected() {
        let prefix = "x".repeat(30);
        let first = format!("{}-one", prefix);
        let second = format!("{}-two", prefix);
        let api = FakeApi {
            pools: vec![gpu_pool(&first), gpu_pool(&second)],
            ..Default::default()
        };

        let report = Migrator::new(&api, &Always, false)
            .run(&Variant::Legacy)
            .await
            .unwrap();

        let target = format!("{}-mig-enabled", "x".repeat(28));
        assert_eq!(report.created, vec![target.clone()]);
        assert_eq!(
            report.skipped,
            vec![SkippedPool {
                source: second,
                reason: SkipReason::NameCollision {
                    target,
                    planned_from: first
                }
            }]
        );
    }

    #[tokio::test]
    async fn test_plan_contains_commands() {
        let api = FakeApi {
            pools: vec![gpu_pool("a100"), cpu_pool("default-pool")],
            ..Default::default()
        };
        let variant = Variant::Partitioned(vec![PartitionSize::OneG5Gb]);
        let report = Migrator::new(&api, &Always, true).run(&variant).await.unwrap();

        let client = GkeClient::new(ClusterRef {
            project: "proj".to_string(),
            cluster: "gpu-cluster".to_string(),
            location: "us-central1".to_string(),
        });
        let plan = Plan::from_report(&client, &variant, &report);
        assert_eq!(plan.pools.len(), 1);
        assert!(plan.pools[0]
            .command
            .starts_with("gcloud container node-pools create a100-mig-1g-5gb"));

        let yaml = serde_yaml::to_string(&plan).unwrap();
        assert!(yaml.contains("partitioned (1g.5gb)"));
        assert!(yaml.contains("name: a100-mig-1g-5gb"));
        assert!(yaml.contains("reason: no_gpu"));
    }

    #[tokio::test]
    async fn test_dry_run_plans_without_creating() {
        let api = FakeApi {
            pools: vec![gpu_pool("a100")],
            ..Default::default()
        };
        let confirm = Scripted::answers(&[]);

        let report = Migrator::new(&api, &confirm, true)
            .run(&Variant::Legacy)
            .await
            .unwrap();

        assert!(api.created.borrow().is_empty());
        assert!(report.created.is_empty());
        assert_eq!(report.planned.len(), 1);
        assert_eq!(report.planned[0].name, "a100-mig-enabled");
    }

    #[tokio::test]
    async fn test_survey_continues_past_describe_failures() {
        let api = FakeApi {
            pools: vec![cpu_pool("default-pool"), gpu_pool("a100"), gpu_pool("a100-mig-enabled")],
            missing: vec!["gone".to_string()],
            ..Default::default()
        };

        let rows = survey(&api, &Variant::Legacy).await.unwrap();

        let summary: Vec<(&str, bool, bool)> = rows
            .iter()
            .map(|row| (row.name.as_str(), row.pool.is_some(), row.pending))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("default-pool", true, false),
                ("a100", true, false),
                ("a100-mig-enabled", true, false),
                ("gone", false, false),
            ]
        );

        let api = FakeApi {
            pools: vec![gpu_pool("t4")],
            missing: vec!["gone".to_string()],
            ..Default::default()
        };
        let rows = survey(&api, &Variant::Legacy).await.unwrap();
        assert!(rows[0].pending);
        assert!(rows[1].pool.is_none());
    }
}
