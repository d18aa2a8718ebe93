/// Device-sharing (DRA) driver deployment
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::config::DriverConfig;
use crate::k8s::ResourceManager;
use crate::utils::command::CommandBuilder;
use crate::utils::polling::Poller;

/// Installs the driver chart with Helm and waits for its pods
pub struct DriverManager {
    config: DriverConfig,
    kubeconfig_path: PathBuf,
}

impl DriverManager {
    pub fn new(config: DriverConfig, kubeconfig_path: PathBuf) -> Self {
        Self {
            config,
            kubeconfig_path,
        }
    }

    /// Install (or upgrade) the driver release
    pub async fn install(&self) -> Result<()> {
        info!(
            "Installing device-sharing driver {}/{}...",
            self.config.repo_name, self.config.chart
        );

        self.add_helm_repo().await?;

        CommandBuilder::new("helm")
            .args(self.install_args())
            .kubeconfig(&self.kubeconfig_path)
            .context("Failed to execute helm")
            .run_silent()
            .await
            .context("Failed to install driver chart")?;

        info!("Driver release {} installed", self.config.release);
        Ok(())
    }

    async fn add_helm_repo(&self) -> Result<()> {
        let output = CommandBuilder::new("helm")
            .args([
                "repo",
                "add",
                self.config.repo_name.as_str(),
                self.config.repo_url.as_str(),
            ])
            .kubeconfig(&self.kubeconfig_path)
            .context("Failed to add driver Helm repo")
            .output()
            .await?;

        if !output.success && !output.stderr.contains("already exists") {
            anyhow::bail!("Failed to add Helm repo: {}", output.stderr.trim());
        }

        CommandBuilder::new("helm")
            .args(["repo", "update", self.config.repo_name.as_str()])
            .kubeconfig(&self.kubeconfig_path)
            .context("Failed to update Helm repos")
            .run_silent()
            .await
    }

    fn install_args(&self) -> Vec<String> {
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            self.config.release.clone(),
            format!("{}/{}", self.config.repo_name, self.config.chart),
            "--namespace".to_string(),
            self.config.namespace.clone(),
            "--create-namespace".to_string(),
        ];

        if let Some(version) = &self.config.version {
            args.push("--version".to_string());
            args.push(version.clone());
        }

        for (key, value) in &self.config.set {
            args.push("--set".to_string());
            args.push(format!("{}={}", key, value));
        }

        args
    }

    /// Wait until every driver pod is Ready
    pub async fn wait_for_ready(&self) -> Result<()> {
        let resources = ResourceManager::new(self.kubeconfig_path.clone());
        let selector = format!("app.kubernetes.io/instance={}", self.config.release);
        let poller = Poller::new(
            Duration::from_secs(self.config.ready_timeout_secs),
            Duration::from_secs(10),
            format!("driver pods in {}", self.config.namespace),
        );

        poller
            .until(|| resources.pods_ready(&self.config.namespace, &selector))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_args() {
        let mut config = DriverConfig::default();
        config.version = Some("25.3.0".to_string());
        let manager = DriverManager::new(config, PathBuf::from("/tmp/kubeconfig"));

        let args = manager.install_args();
        assert_eq!(
            args[..7],
            [
                "upgrade",
                "--install",
                "nvidia-dra-driver-gpu",
                "nvidia/nvidia-dra-driver-gpu",
                "--namespace",
                "nvidia-dra-driver-gpu",
                "--create-namespace"
            ]
        );
        assert!(args.windows(2).any(|w| w == ["--version", "25.3.0"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["--set", "nvidiaDriverRoot=/home/kubernetes/bin/nvidia"]));
    }

    #[test]
    fn test_install_args_without_version() {
        let manager = DriverManager::new(DriverConfig::default(), PathBuf::from("/tmp/kubeconfig"));
        assert!(!manager.install_args().contains(&"--version".to_string()));
    }
}
