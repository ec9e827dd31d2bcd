//! Configuration structures and types for ecr-publisher
//!
//! This module provides type-safe configuration management with serde support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default repository name
pub const DEFAULT_REPOSITORY: &str = "t2s-express-app";

/// Default image tag
pub const DEFAULT_TAG: &str = "latest";

/// Default container tool
pub const DEFAULT_CONTAINER_TOOL: &str = "docker";

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishConfig {
    /// Schema version (required)
    pub version: String,

    /// Extend from base configuration file (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Target registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Image build settings
    #[serde(default)]
    pub image: ImageConfig,

    /// Container tool settings
    #[serde(default)]
    pub container: ContainerConfig,
}

/// Target registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RegistryConfig {
    /// AWS region (default: "us-east-1")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Repository name (default: "t2s-express-app")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

/// Image build settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ImageConfig {
    /// Image tag (default: "latest")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Build context directory (default: project root)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<PathBuf>,

    /// Dockerfile path relative to the build context (default: tool default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<PathBuf>,
}

/// Container tool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContainerConfig {
    /// Executable name (default: "docker")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            extends: None,
            registry: RegistryConfig {
                region: Some(DEFAULT_REGION.to_string()),
                repository: Some(DEFAULT_REPOSITORY.to_string()),
            },
            image: ImageConfig {
                tag: Some(DEFAULT_TAG.to_string()),
                context: None,
                dockerfile: None,
            },
            container: ContainerConfig {
                tool: Some(DEFAULT_CONTAINER_TOOL.to_string()),
            },
        }
    }
}

impl PublishConfig {
    pub fn region(&self) -> &str {
        self.registry.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn repository(&self) -> &str {
        self.registry
            .repository
            .as_deref()
            .unwrap_or(DEFAULT_REPOSITORY)
    }

    pub fn tag(&self) -> &str {
        self.image.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    pub fn container_tool(&self) -> &str {
        self.container
            .tool
            .as_deref()
            .unwrap_or(DEFAULT_CONTAINER_TOOL)
    }

    pub fn dockerfile(&self) -> Option<&Path> {
        self.image.dockerfile.as_deref()
    }

    /// Build context, falling back to the current directory
    pub fn context(&self) -> &Path {
        self.image
            .context
            .as_deref()
            .unwrap_or_else(|| Path::new("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PublishConfig::default();

        assert_eq!(config.version, "1.0");
        assert_eq!(config.region(), "us-east-1");
        assert_eq!(config.repository(), "t2s-express-app");
        assert_eq!(config.tag(), "latest");
        assert_eq!(config.container_tool(), "docker");
        assert_eq!(config.context(), Path::new("."));
        assert!(config.dockerfile().is_none());
    }

    #[test]
    fn test_yaml_deserialization() {
        let yaml = r#"
version: "1.0"
registry:
  region: ap-northeast-1
  repository: team/api
image:
  tag: v2
  dockerfile: docker/Dockerfile.prod
"#;

        let config: PublishConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.region(), "ap-northeast-1");
        assert_eq!(config.repository(), "team/api");
        assert_eq!(config.tag(), "v2");
        assert_eq!(
            config.dockerfile(),
            Some(Path::new("docker/Dockerfile.prod"))
        );
        // Sections left out of the file stay unset
        assert!(config.container.tool.is_none());
    }

    #[test]
    fn test_yaml_minimal() {
        let config: PublishConfig = serde_yaml::from_str("version: \"1.0\"\n").unwrap();

        assert_eq!(config.registry, RegistryConfig::default());
        assert_eq!(config.repository(), DEFAULT_REPOSITORY);
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let config = PublishConfig {
            version: "1.0".to_string(),
            extends: None,
            registry: RegistryConfig::default(),
            image: ImageConfig::default(),
            container: ContainerConfig::default(),
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("extends"));
        assert!(!yaml.contains("region"));
    }
}
