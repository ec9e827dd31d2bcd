//! AWS implementations of the identity and registry services
//!
//! Both clients share one `SdkConfig` resolved from the default credential
//! chain (env vars, profile, SSO, instance metadata) and the configured region.

pub mod ecr;
pub mod sts;

pub use ecr::EcrRegistry;
pub use sts::StsIdentity;

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Load the shared SDK configuration for `region`
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    tracing::debug!("Loading AWS configuration for {}", region);

    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}
