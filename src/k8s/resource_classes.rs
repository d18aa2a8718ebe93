/// MIG profile resource classes
use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::mig::PartitionSize;

const DEVICE_CLASS_TEMPLATE: &str = r#"apiVersion: resource.k8s.io/v1beta1
kind: DeviceClass
metadata:
  name: {{name}}
  labels:
    app.kubernetes.io/managed-by: migpool
    mig.config/profile: {{slug}}
spec:
  selectors:
  - cel:
      expression: "device.driver == '{{driver}}' && device.attributes['{{driver}}'].type == 'mig' && device.attributes['{{driver}}'].profile == '{{profile}}'"
"#;

pub const MANIFEST_FILE: &str = "resource-classes.yaml";

/// Render one DeviceClass per MIG profile as a multi-document YAML stream
pub fn render_resource_classes(driver: &str) -> Result<String> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry.set_strict_mode(true);
    registry
        .register_template_string("device_class", DEVICE_CLASS_TEMPLATE)
        .map_err(|e| anyhow::anyhow!("Invalid resource class template: {}", e))?;

    let mut documents = Vec::new();
    for size in PartitionSize::ALL {
        let document = registry
            .render(
                "device_class",
                &json!({
                    "name": format!("mig-{}", size.slug()),
                    "slug": size.slug(),
                    "profile": size.as_str(),
                    "driver": driver,
                }),
            )
            .map_err(|e| anyhow::anyhow!("Failed to render resource class for {}: {}", size, e))?;
        documents.push(document);
    }

    Ok(documents.join("---\n"))
}

/// Write the resource class manifest into `output_dir`
pub async fn write_resource_classes(driver: &str, output_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .context("Failed to create output directory")?;

    let path = output_dir.join(MANIFEST_FILE);
    tokio::fs::write(&path, render_resource_classes(driver)?)
        .await
        .context("Failed to write resource class manifest")?;

    info!("Resource classes written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_three_profiles_rendered() {
        let rendered = render_resource_classes("gpu.nvidia.com").unwrap();

        let docs: Vec<serde_yaml::Value> = serde_yaml::Deserializer::from_str(&rendered)
            .map(|doc| serde_yaml::Value::deserialize(doc).unwrap())
            .collect();
        assert_eq!(docs.len(), 3);

        let names: Vec<&str> = docs
            .iter()
            .map(|d| d["metadata"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["mig-1g-5gb", "mig-2g-10gb", "mig-3g-20gb"]);

        for doc in &docs {
            assert_eq!(doc["kind"].as_str(), Some("DeviceClass"));
        }

        let expression = docs[1]["spec"]["selectors"][0]["cel"]["expression"]
            .as_str()
            .unwrap();
        assert!(expression.contains("device.driver == 'gpu.nvidia.com'"));
        assert!(expression.contains("profile == '2g.10gb'"));
    }

    #[tokio::test]
    async fn test_write_resource_classes() {
        let dir = std::env::temp_dir().join(format!("migpool-classes-{}", std::process::id()));
        let path = write_resource_classes("gpu.nvidia.com", &dir).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("mig-3g-20gb"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
