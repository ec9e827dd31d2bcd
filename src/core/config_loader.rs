//! Configuration file loader for ecr-publisher
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::PublishError;
use crate::validation::image_validator::ImageValidator;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".ecr-publish.yaml";

/// Maximum depth of `extends` chains
const MAX_EXTENDS_DEPTH: usize = 8;

lazy_static! {
    /// Environment variable pattern (${VAR_NAME})
    static ref ENV_VAR_REGEX: Regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// Configuration load options
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// CLI arguments (highest priority)
    pub cli_args: Option<PublishConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options for `project_path` with a snapshot of the process environment
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
            cli_args: None,
            env: env::vars().collect(),
        }
    }

    pub fn with_cli_args(mut self, cli_args: PublishConfig) -> Self {
        self.cli_args = Some(cli_args);
        self
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

impl ConfigValidationResult {
    /// First error as a `PublishError`, if any
    pub fn into_error(self) -> Option<PublishError> {
        self.errors
            .into_iter()
            .next()
            .map(|e| PublishError::InvalidConfig {
                field: e.field,
                message: e.message,
            })
    }
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "registry.repository")
    pub field: String,

    /// Error message
    pub message: String,

    /// Expected type/value
    pub expected: Option<String>,

    /// Actual type/value
    pub actual: Option<String>,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (./.ecr-publish.yaml)
    /// 4. Default values
    ///
    /// The build context is resolved against the project path.
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let mut configs: Vec<PublishConfig> = Vec::new();

        // 4. Default values (lowest priority)
        configs.push(PublishConfig::default());

        // 3. Project config
        if let Some(project_config) = Self::load_project_config(&options.project_path).await? {
            configs.push(project_config);
        }

        // 2. Environment variables
        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        // 1. CLI arguments (highest priority)
        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged_config = Self::merge_configs(configs);
        let mut config = Self::expand_env_vars(merged_config, &options.env);

        config.image.context = Some(match config.image.context.take() {
            Some(context) if context.is_relative() => options.project_path.join(context),
            Some(context) => context,
            None => options.project_path.clone(),
        });

        tracing::debug!(
            region = config.region(),
            repository = config.repository(),
            tag = config.tag(),
            context = %config.context().display(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Load project configuration from ./.ecr-publish.yaml
    async fn load_project_config(
        project_path: &Path,
    ) -> Result<Option<PublishConfig>, PublishError> {
        let project_config_path = project_path.join(CONFIG_FILENAME);

        Self::load_config_file(&project_config_path, 0).await
    }

    /// Load configuration from YAML file
    fn load_config_file(
        file_path: &Path,
        depth: usize,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Option<PublishConfig>, PublishError>>
                + Send
                + '_,
        >,
    > {
        Box::pin(async move {
            if depth > MAX_EXTENDS_DEPTH {
                return Err(PublishError::ConfigError(format!(
                    "extends chain is deeper than {} levels at {}",
                    MAX_EXTENDS_DEPTH,
                    file_path.display()
                )));
            }

            // Check if file exists
            if !file_path.exists() {
                return Ok(None);
            }

            tracing::debug!("Reading config file {}", file_path.display());

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                PublishError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: PublishConfig = serde_yaml::from_str(&content).map_err(|e| {
                PublishError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })?;

            // Handle extends if present
            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| {
                        PublishError::ConfigError("Invalid config file path".to_string())
                    })?
                    .join(extends_path);

                match Self::load_config_file(&base_path, depth + 1).await? {
                    Some(base_config) => {
                        return Ok(Some(Self::merge_configs(vec![base_config, config])));
                    }
                    None => {
                        return Err(PublishError::ConfigError(format!(
                            "extends target not found: {}",
                            base_path.display()
                        )));
                    }
                }
            }

            Ok(Some(config))
        })
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<PublishConfig> {
        let mut config = PublishConfig {
            version: String::new(),
            extends: None,
            registry: RegistryConfig::default(),
            image: ImageConfig::default(),
            container: ContainerConfig::default(),
        };
        let mut has_changes = false;

        // ECR_PUBLISH_REGION, falling back to the SDK's AWS_REGION
        if let Some(region) = env
            .get("ECR_PUBLISH_REGION")
            .or_else(|| env.get("AWS_REGION"))
        {
            config.registry.region = Some(region.clone());
            has_changes = true;
        }

        if let Some(repository) = env.get("ECR_PUBLISH_REPOSITORY") {
            config.registry.repository = Some(repository.clone());
            has_changes = true;
        }

        if let Some(tag) = env.get("ECR_PUBLISH_TAG") {
            config.image.tag = Some(tag.clone());
            has_changes = true;
        }

        if let Some(dockerfile) = env.get("ECR_PUBLISH_DOCKERFILE") {
            config.image.dockerfile = Some(PathBuf::from(dockerfile));
            has_changes = true;
        }

        if let Some(tool) = env.get("ECR_PUBLISH_CONTAINER_TOOL") {
            config.container.tool = Some(tool.clone());
            has_changes = true;
        }

        if has_changes { Some(config) } else { None }
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<PublishConfig>) -> PublishConfig {
        let mut result = PublishConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut PublishConfig, source: PublishConfig) {
        // Version
        if !source.version.is_empty() {
            target.version = source.version;
        }

        // Extends
        if source.extends.is_some() {
            target.extends = source.extends;
        }

        // Registry
        if source.registry.region.is_some() {
            target.registry.region = source.registry.region;
        }
        if source.registry.repository.is_some() {
            target.registry.repository = source.registry.repository;
        }

        // Image
        if source.image.tag.is_some() {
            target.image.tag = source.image.tag;
        }
        if source.image.context.is_some() {
            target.image.context = source.image.context;
        }
        if source.image.dockerfile.is_some() {
            target.image.dockerfile = source.image.dockerfile;
        }

        // Container tool
        if source.container.tool.is_some() {
            target.container.tool = source.container.tool;
        }
    }

    /// Expand `${VAR}` references in string settings
    fn expand_env_vars(mut config: PublishConfig, env: &HashMap<String, String>) -> PublishConfig {
        let expand = |value: &mut Option<String>| {
            if let Some(v) = value {
                *v = Self::expand_string(v, env);
            }
        };

        expand(&mut config.registry.region);
        expand(&mut config.registry.repository);
        expand(&mut config.image.tag);
        expand(&mut config.container.tool);

        if let Some(dockerfile) = &config.image.dockerfile {
            let expanded = Self::expand_string(&dockerfile.to_string_lossy(), env);
            config.image.dockerfile = Some(PathBuf::from(expanded));
        }

        config
    }

    /// Expand environment variables in a single string
    ///
    /// Unknown variables are left untouched.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        ENV_VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| match env.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    tracing::warn!("Environment variable {} not found", &caps[1]);
                    caps[0].to_string()
                }
            })
            .into_owned()
    }

    /// Validate configuration
    pub fn validate(config: &PublishConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version (required)
        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
                expected: Some("string (e.g., \"1.0\")".to_string()),
                actual: Some("empty".to_string()),
            });
        } else if config.version != "1.0" {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        // 2. Registry coordinates
        if let Err(message) = ImageValidator::validate_region(config.region()) {
            errors.push(ConfigValidationError {
                field: "registry.region".to_string(),
                message,
                expected: Some("AWS region (e.g., \"us-east-1\")".to_string()),
                actual: Some(config.region().to_string()),
            });
        }

        if let Err(message) = ImageValidator::validate_repository_name(config.repository()) {
            errors.push(ConfigValidationError {
                field: "registry.repository".to_string(),
                message,
                expected: Some("lowercase name, 2-256 chars".to_string()),
                actual: Some(config.repository().to_string()),
            });
        }

        // 3. Image
        if let Err(message) = ImageValidator::validate_tag(config.tag()) {
            errors.push(ConfigValidationError {
                field: "image.tag".to_string(),
                message,
                expected: Some("[A-Za-z0-9_.-], max 128 chars".to_string()),
                actual: Some(config.tag().to_string()),
            });
        }

        if let Err(message) =
            ImageValidator::validate_build_context(config.context(), config.dockerfile())
        {
            errors.push(ConfigValidationError {
                field: "image.context".to_string(),
                message,
                expected: Some("directory containing a Dockerfile".to_string()),
                actual: Some(config.context().display().to_string()),
            });
        }

        // 4. Container tool
        if let Err(message) = ImageValidator::validate_container_tool(config.container_tool()) {
            errors.push(ConfigValidationError {
                field: "container.tool".to_string(),
                message,
                expected: Some("docker | podman | finch | nerdctl".to_string()),
                actual: Some(config.container_tool().to_string()),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
                if let (Some(expected), Some(actual)) = (&error.expected, &error.actual) {
                    lines.push(format!("    Expected: {}", expected));
                    lines.push(format!("    Actual: {}", actual));
                }
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}
