//! Image Validator - Validates registry coordinates and build inputs
//!
//! Checks run before any cloud call so that a typo in the repository name
//! or tag fails fast instead of half-way through the pipeline.
//!
//! # Example
//!
//! ```
//! use ecr_publisher::validation::ImageValidator;
//!
//! assert!(ImageValidator::validate_repository_name("t2s-express-app").is_ok());
//! assert!(ImageValidator::validate_tag("latest").is_ok());
//! assert!(ImageValidator::validate_tag("-bad").is_err());
//! ```

use crate::security::command_executor::ALLOWED_COMMANDS;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

/// Maximum repository name length accepted by ECR
const MAX_REPOSITORY_LEN: usize = 256;

/// Maximum tag length accepted by Docker
const MAX_TAG_LEN: usize = 128;

/// AWS account ids are always 12 digits
const ACCOUNT_ID_LEN: usize = 12;

lazy_static! {
    static ref REPOSITORY_REGEX: Regex =
        Regex::new(r"^(?:[a-z0-9]+(?:[._-][a-z0-9]+)*/)*[a-z0-9]+(?:[._-][a-z0-9]+)*$").unwrap();
    static ref REGION_REGEX: Regex =
        Regex::new(r"^[a-z]{2}(?:-gov|-iso[a-z]*)?-[a-z]+-\d+$").unwrap();
}

/// Validator for image publishing inputs
pub struct ImageValidator;

impl ImageValidator {
    /// Validate an ECR repository name
    ///
    /// 2-256 characters of lowercase alphanumeric segments separated by
    /// `.`, `_` or `-`, optionally namespaced with `/`.
    pub fn validate_repository_name(name: &str) -> Result<(), String> {
        if name.len() < 2 {
            return Err("Repository name must be at least 2 characters".to_string());
        }

        if name.len() > MAX_REPOSITORY_LEN {
            return Err(format!(
                "Repository name too long ({} characters, max {})",
                name.len(),
                MAX_REPOSITORY_LEN
            ));
        }

        if !REPOSITORY_REGEX.is_match(name) {
            return Err(format!(
                "Invalid repository name '{}': use lowercase letters, digits and . _ - / separators",
                name
            ));
        }

        Ok(())
    }

    /// Validate an image tag
    ///
    /// Docker tag constraints:
    /// - 128 characters or fewer
    /// - alphanumerics, periods, hyphens and underscores only
    /// - must not start with a period or hyphen
    pub fn validate_tag(tag: &str) -> Result<(), String> {
        if tag.is_empty() {
            return Err("Tag must not be empty".to_string());
        }

        if tag.len() > MAX_TAG_LEN {
            return Err(format!(
                "Tag too long ({} characters, max {})",
                tag.len(),
                MAX_TAG_LEN
            ));
        }

        if tag.starts_with('.') || tag.starts_with('-') {
            return Err(format!("Tag must not start with '.' or '-': {}", tag));
        }

        if let Some(c) = tag
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '.' && *c != '-' && *c != '_')
        {
            return Err(format!("Invalid character '{}' in tag: {}", c, tag));
        }

        Ok(())
    }

    /// Validate an AWS region name (e.g. `us-east-1`, `us-gov-west-1`)
    pub fn validate_region(region: &str) -> Result<(), String> {
        if REGION_REGEX.is_match(region) {
            Ok(())
        } else {
            Err(format!("Invalid AWS region: '{}'", region))
        }
    }

    /// Validate an AWS account id (12 digits)
    pub fn validate_account_id(account_id: &str) -> Result<(), String> {
        if account_id.len() == ACCOUNT_ID_LEN && account_id.chars().all(|c| c.is_ascii_digit()) {
            Ok(())
        } else {
            Err(format!(
                "Invalid AWS account id '{}': expected {} digits",
                account_id, ACCOUNT_ID_LEN
            ))
        }
    }

    /// Validate the container tool against the executor allow list
    pub fn validate_container_tool(tool: &str) -> Result<(), String> {
        let name = Path::new(tool)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(tool);

        if ALLOWED_COMMANDS.contains(&name) {
            Ok(())
        } else {
            Err(format!(
                "Container tool '{}' is not supported (allowed: {})",
                tool,
                ALLOWED_COMMANDS.join(", ")
            ))
        }
    }

    /// Validate that the build context exists and contains a Dockerfile
    ///
    /// `dockerfile` is relative to the context unless absolute.
    pub fn validate_build_context(context: &Path, dockerfile: Option<&Path>) -> Result<(), String> {
        if !context.is_dir() {
            return Err(format!(
                "Build context directory not found: {}",
                context.display()
            ));
        }

        match dockerfile {
            Some(dockerfile) => {
                let path = context.join(dockerfile);
                if !path.is_file() {
                    return Err(format!("Dockerfile not found: {}", path.display()));
                }
            }
            None => {
                let found = ["Dockerfile", "dockerfile"]
                    .iter()
                    .any(|name| context.join(name).is_file());
                if !found {
                    return Err(format!(
                        "Dockerfile not found in build context: {}",
                        context.display()
                    ));
                }
            }
        }

        Ok(())
    }
}
