//! Core traits and types for image publishing
//!
//! This module defines the abstractions over the three external
//! collaborators of the publish pipeline: the cloud identity service, the
//! registry management service and the local container tool.

use crate::core::error::PublishResult;
use crate::core::image::ImageReference;
use crate::security::token_manager::RegistryCredentials;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// Repository lookup
// ============================================================================

/// Result of looking a repository up by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum RepositoryStatus {
    /// Repository exists; the registry may report its URI
    Exists {
        #[serde(skip_serializing_if = "Option::is_none")]
        uri: Option<String>,
    },
    /// Repository does not exist yet
    NotFound,
}

/// What the ensure-repository step ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepositoryOutcome {
    AlreadyExists,
    Created,
    /// Dry run found no repository; it would be created
    WouldCreate,
}

// ============================================================================
// Identity
// ============================================================================

/// Cloud identity service
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name (e.g., "sts")
    fn name(&self) -> &str;

    /// Account identifier of the authenticated caller
    async fn account_id(&self) -> PublishResult<String>;
}

// ============================================================================
// Registry
// ============================================================================

/// Container registry management service
#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// Registry name (e.g., "ecr")
    fn name(&self) -> &str;

    /// Look a repository up by name
    ///
    /// A missing repository is `Ok(RepositoryStatus::NotFound)`, not an error.
    async fn describe_repository(&self, repository: &str) -> PublishResult<RepositoryStatus>;

    /// Create a repository by name
    async fn create_repository(&self, repository: &str) -> PublishResult<()>;

    /// Short-lived credentials for the container tool's login
    async fn login_credentials(&self) -> PublishResult<RegistryCredentials>;
}

// ============================================================================
// Container tool
// ============================================================================

/// Local container tool (docker or a compatible CLI)
///
/// Every operation runs one external process and fails on a non-zero exit.
pub trait ContainerTool: Send + Sync {
    /// Tool name (e.g., "docker")
    fn name(&self) -> &str;

    /// `login --username <user> --password-stdin <server>`
    fn login(&self, server: &str, credentials: &RegistryCredentials) -> PublishResult<()>;

    /// `build -t <image> [-f <dockerfile>] .` inside `context`
    fn build(
        &self,
        context: &Path,
        image: &ImageReference,
        dockerfile: Option<&Path>,
    ) -> PublishResult<()>;

    /// `tag <source> <target>`
    fn tag(&self, source: &ImageReference, target: &ImageReference) -> PublishResult<()>;

    /// `push <image>`
    fn push(&self, image: &ImageReference) -> PublishResult<()>;
}
