/// Kubernetes cluster operations
pub mod client;
pub mod resource_classes;
pub mod resources;

pub use client::KubernetesClient;
pub use resources::ResourceManager;
