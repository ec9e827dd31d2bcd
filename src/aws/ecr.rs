//! ECR registry client

use crate::core::error::{PublishError, PublishResult};
use crate::core::traits::{ContainerRegistry, RepositoryStatus};
use crate::security::token_manager::RegistryCredentials;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ecr::error::DisplayErrorContext;

/// Private ECR registry of the caller's account
pub struct EcrRegistry {
    client: aws_sdk_ecr::Client,
}

impl EcrRegistry {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_ecr::Client::new(config),
        }
    }

    pub fn from_client(client: aws_sdk_ecr::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContainerRegistry for EcrRegistry {
    fn name(&self) -> &str {
        "ecr"
    }

    async fn describe_repository(&self, repository: &str) -> PublishResult<RepositoryStatus> {
        let result = self
            .client
            .describe_repositories()
            .repository_names(repository)
            .send()
            .await;

        match result {
            Ok(output) => {
                let uri = output
                    .repositories()
                    .first()
                    .and_then(|r| r.repository_uri())
                    .map(str::to_string);
                Ok(RepositoryStatus::Exists { uri })
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_repository_not_found_exception()) =>
            {
                tracing::debug!("Repository {} not found", repository);
                Ok(RepositoryStatus::NotFound)
            }
            Err(err) => Err(PublishError::RepositoryLookupFailed {
                repository: repository.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            }),
        }
    }

    async fn create_repository(&self, repository: &str) -> PublishResult<()> {
        let result = self
            .client
            .create_repository()
            .repository_name(repository)
            .send()
            .await;

        match result {
            Ok(output) => {
                tracing::info!(
                    uri = output
                        .repository()
                        .and_then(|r| r.repository_uri())
                        .unwrap_or("-"),
                    "Created repository {}",
                    repository
                );
                Ok(())
            }
            // Created concurrently since the lookup
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_repository_already_exists_exception()) =>
            {
                tracing::warn!("Repository {} already exists", repository);
                Ok(())
            }
            Err(err) => Err(PublishError::RepositoryCreateFailed {
                repository: repository.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            }),
        }
    }

    async fn login_credentials(&self) -> PublishResult<RegistryCredentials> {
        let output = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| PublishError::AuthenticationFailed {
                registry: "ecr".to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let token = output
            .authorization_data()
            .first()
            .and_then(|d| d.authorization_token())
            .ok_or_else(|| PublishError::AuthenticationFailed {
                registry: "ecr".to_string(),
                message: "GetAuthorizationToken returned no token".to_string(),
            })?;

        RegistryCredentials::from_authorization_token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ecr::Client;
    use aws_sdk_ecr::operation::create_repository::{CreateRepositoryError, CreateRepositoryOutput};
    use aws_sdk_ecr::operation::describe_repositories::{
        DescribeRepositoriesError, DescribeRepositoriesOutput,
    };
    use aws_sdk_ecr::operation::get_authorization_token::GetAuthorizationTokenOutput;
    use aws_sdk_ecr::types::error::{
        LimitExceededException, RepositoryAlreadyExistsException, RepositoryNotFoundException,
        ServerException,
    };
    use aws_sdk_ecr::types::{AuthorizationData, Repository};
    use aws_smithy_mocks::{mock, mock_client};
    use base64::Engine;
    use secrecy::ExposeSecret;

    const URI: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com/t2s-express-app";

    #[tokio::test]
    async fn test_describe_existing_repository() {
        let rule = mock!(Client::describe_repositories).then_output(|| {
            DescribeRepositoriesOutput::builder()
                .repositories(Repository::builder().repository_uri(URI).build())
                .build()
        });
        let registry = EcrRegistry::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let status = registry.describe_repository("t2s-express-app").await.unwrap();

        assert_eq!(
            status,
            RepositoryStatus::Exists {
                uri: Some(URI.to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_describe_missing_repository_is_not_an_error() {
        let rule = mock!(Client::describe_repositories).then_error(|| {
            DescribeRepositoriesError::RepositoryNotFoundException(
                RepositoryNotFoundException::builder()
                    .message("The repository with name 't2s-express-app' does not exist")
                    .build(),
            )
        });
        let registry = EcrRegistry::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let status = registry.describe_repository("t2s-express-app").await.unwrap();

        assert_eq!(status, RepositoryStatus::NotFound);
    }

    #[tokio::test]
    async fn test_describe_other_failure_is_lookup_error() {
        let rule = mock!(Client::describe_repositories).then_error(|| {
            DescribeRepositoriesError::ServerException(
                ServerException::builder().message("internal failure").build(),
            )
        });
        let registry = EcrRegistry::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let error = registry
            .describe_repository("t2s-express-app")
            .await
            .unwrap_err();

        assert_eq!(error.code(), "REPOSITORY_LOOKUP_FAILED");
        assert_eq!(error.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_create_repository() {
        let rule = mock!(Client::create_repository)
            .match_requests(|req| req.repository_name() == Some("t2s-express-app"))
            .then_output(|| {
                CreateRepositoryOutput::builder()
                    .repository(Repository::builder().repository_uri(URI).build())
                    .build()
            });
        let registry = EcrRegistry::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        registry.create_repository("t2s-express-app").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_race_counts_as_success() {
        let rule = mock!(Client::create_repository).then_error(|| {
            CreateRepositoryError::RepositoryAlreadyExistsException(
                RepositoryAlreadyExistsException::builder()
                    .message("already exists")
                    .build(),
            )
        });
        let registry = EcrRegistry::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        assert!(registry.create_repository("t2s-express-app").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_failure() {
        let rule = mock!(Client::create_repository).then_error(|| {
            CreateRepositoryError::LimitExceededException(
                LimitExceededException::builder()
                    .message("repository limit reached")
                    .build(),
            )
        });
        let registry = EcrRegistry::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let error = registry
            .create_repository("t2s-express-app")
            .await
            .unwrap_err();

        assert_eq!(error.code(), "REPOSITORY_CREATE_FAILED");
    }

    #[tokio::test]
    async fn test_login_credentials_are_decoded() {
        let token = base64::engine::general_purpose::STANDARD.encode("AWS:ecr-password-0123456789");
        let rule = mock!(Client::get_authorization_token).then_output(move || {
            GetAuthorizationTokenOutput::builder()
                .authorization_data(
                    AuthorizationData::builder()
                        .authorization_token(token.clone())
                        .build(),
                )
                .build()
        });
        let registry = EcrRegistry::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let credentials = registry.login_credentials().await.unwrap();

        assert_eq!(credentials.username(), "AWS");
        assert_eq!(
            credentials.password().expose_secret(),
            "ecr-password-0123456789"
        );
    }

    #[tokio::test]
    async fn test_login_without_token_fails() {
        let rule = mock!(Client::get_authorization_token)
            .then_output(|| GetAuthorizationTokenOutput::builder().build());
        let registry = EcrRegistry::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let error = registry.login_credentials().await.unwrap_err();

        assert_eq!(error.code(), "AUTHENTICATION_FAILED");
    }
}
