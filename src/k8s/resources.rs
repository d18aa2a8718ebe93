/// Generic Kubernetes resource operations
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::utils::command::CommandBuilder;

/// kubectl operations against one kubeconfig
pub struct ResourceManager {
    kubeconfig_path: PathBuf,
}

impl ResourceManager {
    pub fn new(kubeconfig_path: PathBuf) -> Self {
        Self { kubeconfig_path }
    }

    /// Apply a Kubernetes manifest file
    pub async fn apply_manifest(&self, manifest_path: &Path) -> Result<()> {
        info!("Applying Kubernetes manifest: {}", manifest_path.display());

        let stdout = CommandBuilder::new("kubectl")
            .arg("apply")
            .arg("-f")
            .arg(manifest_path)
            .kubeconfig(&self.kubeconfig_path)
            .context("Failed to apply manifest")
            .run()
            .await?;

        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            info!("{}", line.trim());
        }

        Ok(())
    }

    /// True once at least one pod matches `selector` and every matching pod is Ready
    pub async fn pods_ready(&self, namespace: &str, selector: &str) -> Result<bool> {
        let output = CommandBuilder::new("kubectl")
            .args([
                "get",
                "pods",
                "-n",
                namespace,
                "-l",
                selector,
                "-o",
                "jsonpath={.items[*].status.conditions[?(@.type=='Ready')].status}",
            ])
            .kubeconfig(&self.kubeconfig_path)
            .context("Failed to query pod readiness")
            .output()
            .await?;

        if !output.success {
            return Ok(false);
        }

        Ok(all_ready(&output.stdout))
    }
}

fn all_ready(statuses: &str) -> bool {
    let mut statuses = statuses.split_whitespace().peekable();
    statuses.peek().is_some() && statuses.all(|s| s.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_ready() {
        assert!(all_ready("True True\n"));
        assert!(!all_ready("True False"));
        assert!(!all_ready(""));
    }
}
