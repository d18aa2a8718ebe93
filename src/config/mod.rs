/// Configuration management for migpool
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::mig::PartitionSize;

/// Main migpool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigConfig {
    /// Cloud project (can also be set via CLOUDSDK_CORE_PROJECT env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// GKE cluster name
    pub cluster: String,

    /// Cluster zone or region
    pub location: String,

    /// Partition sizes created by `partition` and `run`
    #[serde(default = "default_partition_sizes")]
    pub partition_sizes: Vec<PartitionSize>,

    /// Device-sharing driver installation
    #[serde(default)]
    pub driver: DriverConfig,

    /// MIG profile resource classes
    #[serde(default)]
    pub resource_classes: ResourceClassConfig,
}

/// Helm release of the device-sharing driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Offer the driver install during `run`
    pub enabled: bool,

    pub repo_name: String,

    pub repo_url: String,

    pub chart: String,

    /// Chart version, latest when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub release: String,

    pub namespace: String,

    /// Extra `--set key=value` pairs
    pub set: BTreeMap<String, String>,

    pub ready_timeout_secs: u64,
}

/// Resource class declarations for each MIG profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceClassConfig {
    /// Offer applying the classes during `run`
    pub enabled: bool,

    /// Driver name the classes select devices from
    pub driver: String,
}

fn default_partition_sizes() -> Vec<PartitionSize> {
    PartitionSize::ALL.to_vec()
}

fn default_ready_timeout() -> u64 {
    300
}

fn default_device_driver() -> String {
    "gpu.nvidia.com".to_string()
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            repo_name: "nvidia".to_string(),
            repo_url: "https://helm.ngc.nvidia.com/nvidia".to_string(),
            chart: "nvidia-dra-driver-gpu".to_string(),
            version: None,
            release: "nvidia-dra-driver-gpu".to_string(),
            namespace: "nvidia-dra-driver-gpu".to_string(),
            set: BTreeMap::from([
                (
                    "nvidiaDriverRoot".to_string(),
                    "/home/kubernetes/bin/nvidia".to_string(),
                ),
                ("gpuResourcesEnabledOverride".to_string(), "true".to_string()),
                (
                    "resources.computeDomains.enabled".to_string(),
                    "false".to_string(),
                ),
            ]),
            ready_timeout_secs: default_ready_timeout(),
        }
    }
}

impl Default for ResourceClassConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            driver: default_device_driver(),
        }
    }
}

impl MigConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MigConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cluster.trim().is_empty() {
            anyhow::bail!("cluster cannot be empty");
        }

        if self.location.trim().is_empty() {
            anyhow::bail!("location cannot be empty");
        }

        if self.partition_sizes.is_empty() {
            anyhow::bail!("at least one partition size is required");
        }

        let unique: BTreeSet<_> = self.partition_sizes.iter().collect();
        if unique.len() != self.partition_sizes.len() {
            anyhow::bail!("partition_sizes contains duplicates");
        }

        url::Url::parse(&self.driver.repo_url)
            .map_err(|e| anyhow::anyhow!("Invalid driver repo_url {}: {}", self.driver.repo_url, e))?;

        Ok(())
    }

    /// Get the cloud project from config or environment
    pub fn get_project(&self) -> anyhow::Result<String> {
        self.project
            .clone()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| std::env::var("CLOUDSDK_CORE_PROJECT").ok())
            .ok_or_else(|| anyhow::anyhow!(
                "Cloud project not found. Set CLOUDSDK_CORE_PROJECT environment variable or specify project in config"
            ))
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            project: Some("my-project".to_string()),
            cluster: "gpu-cluster".to_string(),
            location: "us-central1-c".to_string(),
            partition_sizes: default_partition_sizes(),
            driver: DriverConfig::default(),
            resource_classes: ResourceClassConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = MigConfig::example();
        assert!(config.validate().is_ok());

        config.cluster = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partition_size_validation() {
        let mut config = MigConfig::example();
        config.partition_sizes = vec![];
        assert!(config.validate().is_err());

        config.partition_sizes = vec![PartitionSize::OneG5Gb, PartitionSize::OneG5Gb];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_repo_url_validation() {
        let mut config = MigConfig::example();
        config.driver.repo_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config: MigConfig =
            serde_yaml::from_str("cluster: gpu-cluster\nlocation: us-central1\n").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.partition_sizes, PartitionSize::ALL.to_vec());
        assert_eq!(config.driver.chart, "nvidia-dra-driver-gpu");
        assert_eq!(config.resource_classes.driver, "gpu.nvidia.com");
        assert!(config.project.is_none());
    }

    #[test]
    fn test_partial_driver_section() {
        let config: MigConfig = serde_yaml::from_str(
            "cluster: c\nlocation: l\ndriver:\n  enabled: false\n  version: 25.3.0\n",
        )
        .unwrap();
        assert!(!config.driver.enabled);
        assert_eq!(config.driver.version.as_deref(), Some("25.3.0"));
        assert_eq!(config.driver.namespace, "nvidia-dra-driver-gpu");
        assert_eq!(config.driver.ready_timeout_secs, 300);
    }

    #[test]
    fn test_unknown_partition_size_rejected() {
        let parsed: Result<MigConfig, _> = serde_yaml::from_str(
            "cluster: c\nlocation: l\npartition_sizes: [7g.80gb]\n",
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_example_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&MigConfig::example()).unwrap();
        let parsed: MigConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.as_deref(), Some("my-project"));
        assert_eq!(parsed.partition_sizes.len(), 3);
    }
}
