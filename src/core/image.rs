//! Registry coordinates and image references
//!
//! A repository URI can only be produced from [`RegistryCoordinates`], and
//! coordinates can only be built once the account id is known.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default ECR DNS suffix
const AWS_DNS_SUFFIX: &str = "amazonaws.com";

/// ECR DNS suffix for the China partition (cn-north-1, cn-northwest-1)
const AWS_CN_DNS_SUFFIX: &str = "amazonaws.com.cn";

/// Registry host for a region (e.g. `dkr.ecr.us-east-1.amazonaws.com`)
pub fn registry_host(region: &str) -> String {
    let suffix = if region.starts_with("cn-") {
        AWS_CN_DNS_SUFFIX
    } else {
        AWS_DNS_SUFFIX
    };
    format!("dkr.ecr.{}.{}", region, suffix)
}

/// Location of a repository inside a private registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCoordinates {
    account_id: String,
    region: String,
    repository: String,
}

impl RegistryCoordinates {
    pub fn new(
        account_id: impl Into<String>,
        region: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            repository: repository.into(),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Registry endpoint (`<account>.dkr.ecr.<region>.amazonaws.com`)
    pub fn registry(&self) -> String {
        format!("{}.{}", self.account_id, registry_host(&self.region))
    }

    /// Fully-qualified repository URI (`<registry>/<repository>`)
    pub fn repository_uri(&self) -> String {
        format!("{}/{}", self.registry(), self.repository)
    }

    /// Image reference inside this repository
    pub fn image(&self, tag: &str) -> ImageReference {
        ImageReference::new(self.repository_uri(), tag)
    }
}

/// Image name plus tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub name: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}
