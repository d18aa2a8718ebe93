/// GKE node pool access through gcloud
pub mod client;
pub mod models;

pub use client::{ClusterRef, GkeClient};

use anyhow::Result;

use crate::mig::{SourcePoolDescriptor, TargetPoolSpec};

/// Node pool operations the migration needs from the provider
#[allow(async_fn_in_trait)]
pub trait NodePoolApi {
    /// Names of all node pools in the cluster
    async fn list_node_pools(&self) -> Result<Vec<String>>;

    async fn describe_node_pool(&self, name: &str) -> Result<SourcePoolDescriptor>;

    async fn create_node_pool(&self, spec: &TargetPoolSpec) -> Result<()>;
}
