//! Orchestration layer for image publishing
//!
//! Drives the identity, registry and container-tool collaborators through
//! the publish pipeline.

pub mod registry_publisher;

// Re-export main types for convenience
pub use registry_publisher::{PublishOptions, PublishReport, RegistryPublisher};
