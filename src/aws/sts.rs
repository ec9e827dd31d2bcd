//! STS identity provider

use crate::core::error::{PublishError, PublishResult};
use crate::core::traits::IdentityProvider;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::error::DisplayErrorContext;

/// Resolves the caller's account id with `GetCallerIdentity`
pub struct StsIdentity {
    client: aws_sdk_sts::Client,
}

impl StsIdentity {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
        }
    }

    pub fn from_client(client: aws_sdk_sts::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityProvider for StsIdentity {
    fn name(&self) -> &str {
        "sts"
    }

    async fn account_id(&self) -> PublishResult<String> {
        let output = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| PublishError::IdentityError {
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let account = output
            .account()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| PublishError::IdentityError {
                message: "GetCallerIdentity returned no account".to_string(),
            })?;

        tracing::info!(arn = output.arn().unwrap_or("-"), "Resolved AWS account {}", account);

        Ok(account.to_string())
    }
}
