//! Registry Publisher - Orchestrator for the image publish pipeline
//!
//! Runs the pipeline strictly in order, stopping at the first failure:
//! 1. Resolve the caller's account identity
//! 2. Ensure the repository exists (create when missing)
//! 3. Log the container tool in to the registry
//! 4. Build the image from the build context
//! 5. Tag it with the fully-qualified repository URI
//! 6. Push it
//!
//! Nothing is rolled back on failure; a repository created in step 2 stays.

use crate::aws::{EcrRegistry, StsIdentity, load_sdk_config};
use crate::container::{ContainerCli, build_args};
use crate::core::config::PublishConfig;
use crate::core::config_loader::ConfigLoader;
use crate::core::error::{PublishError, PublishResult};
use crate::core::image::{ImageReference, RegistryCoordinates};
use crate::core::state_machine::{PublishState, PublishStateMachine, StateTransition};
use crate::core::traits::{
    ContainerRegistry, ContainerTool, IdentityProvider, RepositoryOutcome, RepositoryStatus,
};
use crate::security::command_executor::SafeCommandExecutor;
use crate::security::token_manager::ECR_USERNAME;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

/// Publishing options passed from CLI
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Resolve identity and look the repository up, then stop
    pub dry_run: bool,
}

/// Publishing report returned after publish operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub run_id: Uuid,
    pub success: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub region: String,
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_uri: Option<String>,
    pub local_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_outcome: Option<RepositoryOutcome>,
    pub state: PublishState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub transitions: Vec<StateTransition>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub planned_commands: Vec<String>,
}

/// Main image publisher orchestrator
pub struct RegistryPublisher {
    identity: Box<dyn IdentityProvider>,
    registry: Box<dyn ContainerRegistry>,
    tool: Box<dyn ContainerTool>,
    config: PublishConfig,
    state_machine: PublishStateMachine,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    started: Instant,
    dry_run: bool,
    coordinates: Option<RegistryCoordinates>,
    outcome: Option<RepositoryOutcome>,
    planned_commands: Vec<String>,
}

impl RegistryPublisher {
    /// Create a publisher over explicit collaborators
    pub fn new(
        config: PublishConfig,
        identity: Box<dyn IdentityProvider>,
        registry: Box<dyn ContainerRegistry>,
        tool: Box<dyn ContainerTool>,
    ) -> Self {
        Self {
            identity,
            registry,
            tool,
            config,
            state_machine: PublishStateMachine::new(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            started: Instant::now(),
            dry_run: false,
            coordinates: None,
            outcome: None,
            planned_commands: Vec::new(),
        }
    }

    /// Publisher backed by STS, ECR and the configured container CLI
    ///
    /// Fails with `InvalidConfig` before any AWS or executor setup.
    pub async fn from_config(config: PublishConfig) -> PublishResult<Self> {
        if let Some(error) = ConfigLoader::validate(&config).into_error() {
            return Err(error);
        }

        let sdk_config = load_sdk_config(config.region()).await;
        let executor = SafeCommandExecutor::new(config.context())?;
        let tool = ContainerCli::new(config.container_tool(), executor);

        Ok(Self::new(
            config,
            Box::new(StsIdentity::new(&sdk_config)),
            Box::new(EcrRegistry::new(&sdk_config)),
            Box::new(tool),
        ))
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub fn state_machine(&self) -> &PublishStateMachine {
        &self.state_machine
    }

    /// Local image reference (`<repository>:<tag>`)
    pub fn local_image(&self) -> ImageReference {
        ImageReference::new(self.config.repository(), self.config.tag())
    }

    /// Publish the image
    ///
    /// On failure the state machine is moved to `Aborted` and the error of
    /// the failing step is returned; [`RegistryPublisher::report`] still
    /// describes how far the run got.
    pub async fn publish(&mut self, options: PublishOptions) -> PublishResult<PublishReport> {
        self.started_at = Utc::now();
        self.started = Instant::now();
        self.dry_run = options.dry_run;

        match self.run().await {
            Ok(()) => Ok(self.report()),
            Err(error) => {
                tracing::error!(code = error.code(), "{}", error);
                if !self.state_machine.get_state().is_terminal() {
                    self.state_machine.abort(&error)?;
                }
                Err(error)
            }
        }
    }

    async fn run(&mut self) -> PublishResult<()> {
        if let Some(error) = ConfigLoader::validate(&self.config).into_error() {
            return Err(error);
        }

        let local = self.local_image();

        // 1. Identity
        println!("🔐 Resolving AWS account identity...");
        let coordinates = self.resolve_identity().await?;
        println!("  ✅ Account: {}", coordinates.account_id());
        println!("  📦 Repository URI: {}\n", coordinates.repository_uri());

        let mut metadata = HashMap::new();
        metadata.insert(
            "accountId".to_string(),
            serde_json::Value::String(coordinates.account_id().to_string()),
        );
        self.state_machine
            .advance(PublishState::IdentityResolved, Some(metadata))?;
        self.coordinates = Some(coordinates.clone());

        let remote = coordinates.image(self.config.tag());

        // 2. Repository
        println!("🗄️  Checking repository {}...", coordinates.repository());
        let outcome = self
            .ensure_repository(coordinates.repository(), self.dry_run)
            .await?;
        self.outcome = Some(outcome);
        match outcome {
            RepositoryOutcome::AlreadyExists => println!("  ✅ Repository already exists\n"),
            RepositoryOutcome::Created => println!("  ✅ Repository created\n"),
            RepositoryOutcome::WouldCreate => println!("  ℹ️  Repository would be created\n"),
        }

        if self.dry_run {
            self.planned_commands = self.plan(&coordinates, outcome);
            println!("🧪 Dry-run: planned steps");
            for command in &self.planned_commands {
                println!("  - {}", command);
            }
            println!();
            return Ok(());
        }

        self.state_machine
            .advance(PublishState::RepositoryEnsured, None)?;

        // 3. Login
        println!("🔑 Logging in to {}...", self.registry.name());
        self.authenticate(&coordinates).await?;
        println!("  ✅ Login succeeded\n");
        self.state_machine.advance(PublishState::Authenticated, None)?;

        // 4. Build
        println!("🐳 Building image {}...", local);
        self.tool
            .build(self.config.context(), &local, self.config.dockerfile())?;
        println!("  ✅ Build succeeded\n");
        self.state_machine.advance(PublishState::Built, None)?;

        // 5. Tag
        println!("🏷️  Tagging {} → {}...", local, remote);
        self.tool.tag(&local, &remote)?;
        println!("  ✅ Tagged\n");
        self.state_machine.advance(PublishState::Tagged, None)?;

        // 6. Push
        println!("📤 Pushing {}...", remote);
        self.tool.push(&remote)?;
        println!("  ✅ Pushed\n");

        let mut metadata = HashMap::new();
        metadata.insert(
            "image".to_string(),
            serde_json::Value::String(remote.to_string()),
        );
        self.state_machine
            .advance(PublishState::Pushed, Some(metadata))?;

        Ok(())
    }

    async fn resolve_identity(&self) -> PublishResult<RegistryCoordinates> {
        tracing::info!("Resolving identity via {}", self.identity.name());
        let account_id = self.identity.account_id().await?;

        Ok(RegistryCoordinates::new(
            account_id,
            self.config.region(),
            self.config.repository(),
        ))
    }

    /// Make sure `repository` exists, creating it when the lookup reports
    /// it missing. With `dry_run` nothing is created.
    pub async fn ensure_repository(
        &self,
        repository: &str,
        dry_run: bool,
    ) -> PublishResult<RepositoryOutcome> {
        match self.registry.describe_repository(repository).await? {
            RepositoryStatus::Exists { uri } => {
                tracing::info!(
                    uri = uri.as_deref().unwrap_or("-"),
                    "Repository {} already exists",
                    repository
                );
                Ok(RepositoryOutcome::AlreadyExists)
            }
            RepositoryStatus::NotFound if dry_run => Ok(RepositoryOutcome::WouldCreate),
            RepositoryStatus::NotFound => {
                tracing::info!("Creating repository {}", repository);
                self.registry.create_repository(repository).await?;
                Ok(RepositoryOutcome::Created)
            }
        }
    }

    async fn authenticate(&self, coordinates: &RegistryCoordinates) -> PublishResult<()> {
        let credentials = self.registry.login_credentials().await?;
        tracing::debug!(?credentials, "Obtained registry credentials");

        self.tool
            .login(&coordinates.repository_uri(), &credentials)
    }

    /// Commands a real run would execute after the repository step
    fn plan(&self, coordinates: &RegistryCoordinates, outcome: RepositoryOutcome) -> Vec<String> {
        let tool = self.tool.name();
        let local = self.local_image().to_string();
        let remote = coordinates.image(self.config.tag()).to_string();
        let dockerfile = self
            .config
            .dockerfile()
            .map(|d| d.to_string_lossy().into_owned());

        let mut commands = Vec::new();
        if outcome == RepositoryOutcome::WouldCreate {
            commands.push(format!(
                "{} create-repository {}",
                self.registry.name(),
                coordinates.repository()
            ));
        }
        commands.push(format!(
            "{} login --username {} --password-stdin {}",
            tool,
            ECR_USERNAME,
            coordinates.repository_uri()
        ));
        commands.push(format!(
            "{} {}",
            tool,
            build_args(&local, dockerfile.as_deref()).join(" ")
        ));
        commands.push(format!("{} tag {} {}", tool, local, remote));
        commands.push(format!("{} push {}", tool, remote));
        commands
    }

    /// Snapshot of the run so far
    pub fn report(&self) -> PublishReport {
        let state = self.state_machine.get_state();
        let success = state == PublishState::Pushed
            || (self.dry_run && state == PublishState::IdentityResolved);

        PublishReport {
            run_id: self.run_id,
            success,
            dry_run: self.dry_run,
            account_id: self
                .coordinates
                .as_ref()
                .map(|c| c.account_id().to_string()),
            region: self.config.region().to_string(),
            repository: self.config.repository().to_string(),
            repository_uri: self.coordinates.as_ref().map(|c| c.repository_uri()),
            local_image: self.local_image().to_string(),
            remote_image: self
                .coordinates
                .as_ref()
                .map(|c| c.image(self.config.tag()).to_string()),
            repository_outcome: self.outcome,
            state,
            error: self.state_machine.get_last_error().map(str::to_string),
            started_at: self.started_at,
            duration_ms: self.started.elapsed().as_millis() as u64,
            transitions: self.state_machine.transitions().to_vec(),
            planned_commands: self.planned_commands.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::token_manager::RegistryCredentials;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    type CallLog = Arc<Mutex<Vec<String>>>;

    fn record(log: &CallLog, entry: impl Into<String>) {
        log.lock().unwrap().push(entry.into());
    }

    struct FakeIdentity {
        log: CallLog,
        account: Option<&'static str>,
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        fn name(&self) -> &str {
            "fake-sts"
        }

        async fn account_id(&self) -> PublishResult<String> {
            record(&self.log, "identity");
            self.account
                .map(str::to_string)
                .ok_or_else(|| PublishError::IdentityError {
                    message: "Unable to locate credentials".to_string(),
                })
        }
    }

    struct FakeRegistry {
        log: CallLog,
        exists: Mutex<bool>,
        lookup_fails: bool,
    }

    #[async_trait]
    impl ContainerRegistry for FakeRegistry {
        fn name(&self) -> &str {
            "fake-ecr"
        }

        async fn describe_repository(&self, repository: &str) -> PublishResult<RepositoryStatus> {
            record(&self.log, format!("describe {}", repository));
            if self.lookup_fails {
                return Err(PublishError::RepositoryLookupFailed {
                    repository: repository.to_string(),
                    message: "AccessDeniedException".to_string(),
                });
            }
            if *self.exists.lock().unwrap() {
                Ok(RepositoryStatus::Exists { uri: None })
            } else {
                Ok(RepositoryStatus::NotFound)
            }
        }

        async fn create_repository(&self, repository: &str) -> PublishResult<()> {
            record(&self.log, format!("create {}", repository));
            *self.exists.lock().unwrap() = true;
            Ok(())
        }

        async fn login_credentials(&self) -> PublishResult<RegistryCredentials> {
            record(&self.log, "credentials");
            Ok(RegistryCredentials::new(
                "AWS",
                SecretString::new("fake-password-123456".to_string().into()),
            ))
        }
    }

    struct FakeTool {
        log: CallLog,
        fail_on: Option<(&'static str, i32)>,
    }

    impl FakeTool {
        fn run(&self, step: &str, entry: String) -> PublishResult<()> {
            record(&self.log, entry.clone());
            match self.fail_on {
                Some((failing, code)) if failing == step => Err(PublishError::CommandFailed {
                    step: step.to_string(),
                    command: entry,
                    exit_code: Some(code),
                    stderr: String::new(),
                }),
                _ => Ok(()),
            }
        }
    }

    impl ContainerTool for FakeTool {
        fn name(&self) -> &str {
            "docker"
        }

        fn login(&self, server: &str, credentials: &RegistryCredentials) -> PublishResult<()> {
            self.run(
                "login",
                format!("login {} {}", credentials.username(), server),
            )
        }

        fn build(
            &self,
            _context: &Path,
            image: &ImageReference,
            _dockerfile: Option<&Path>,
        ) -> PublishResult<()> {
            self.run("build", format!("build {}", image))
        }

        fn tag(&self, source: &ImageReference, target: &ImageReference) -> PublishResult<()> {
            self.run("tag", format!("tag {} {}", source, target))
        }

        fn push(&self, image: &ImageReference) -> PublishResult<()> {
            self.run("push", format!("push {}", image))
        }
    }

    struct Harness {
        _context: TempDir,
        log: CallLog,
        publisher: RegistryPublisher,
    }

    impl Harness {
        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }
    }

    fn harness(
        account: Option<&'static str>,
        repository_exists: bool,
        lookup_fails: bool,
        fail_on: Option<(&'static str, i32)>,
    ) -> Harness {
        let context = TempDir::new().unwrap();
        std::fs::write(context.path().join("Dockerfile"), "FROM scratch\n").unwrap();

        let mut config = PublishConfig::default();
        config.image.context = Some(context.path().to_path_buf());

        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let publisher = RegistryPublisher::new(
            config,
            Box::new(FakeIdentity {
                log: log.clone(),
                account,
            }),
            Box::new(FakeRegistry {
                log: log.clone(),
                exists: Mutex::new(repository_exists),
                lookup_fails,
            }),
            Box::new(FakeTool {
                log: log.clone(),
                fail_on,
            }),
        );

        Harness {
            _context: context,
            log,
            publisher,
        }
    }

    const URI: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com/t2s-express-app";

    #[tokio::test]
    async fn test_publish_existing_repository() {
        let mut h = harness(Some("123456789012"), true, false, None);

        let report = h.publisher.publish(PublishOptions::default()).await.unwrap();

        assert!(report.success);
        assert_eq!(report.state, PublishState::Pushed);
        assert_eq!(report.repository_outcome, Some(RepositoryOutcome::AlreadyExists));
        assert_eq!(
            report.remote_image.as_deref(),
            Some("123456789012.dkr.ecr.us-east-1.amazonaws.com/t2s-express-app:latest")
        );
        assert_eq!(h.count("create"), 0);
        assert_eq!(
            h.calls(),
            vec![
                "identity".to_string(),
                "describe t2s-express-app".to_string(),
                "credentials".to_string(),
                format!("login AWS {}", URI),
                "build t2s-express-app:latest".to_string(),
                format!("tag t2s-express-app:latest {}:latest", URI),
                format!("push {}:latest", URI),
            ]
        );
        assert_eq!(report.transitions.len(), 6);
    }

    #[tokio::test]
    async fn test_publish_creates_missing_repository() {
        let mut h = harness(Some("123456789012"), false, false, None);

        let report = h.publisher.publish(PublishOptions::default()).await.unwrap();

        assert!(report.success);
        assert_eq!(report.repository_outcome, Some(RepositoryOutcome::Created));
        assert_eq!(h.count("create"), 1);

        let calls = h.calls();
        let create = calls.iter().position(|c| c.starts_with("create")).unwrap();
        let steps: Vec<&str> = calls[create + 1..]
            .iter()
            .map(|c| c.split(' ').next().unwrap())
            .collect();
        assert_eq!(steps, vec!["credentials", "login", "build", "tag", "push"]);
    }

    #[tokio::test]
    async fn test_identity_failure_stops_everything() {
        let mut h = harness(None, true, false, None);

        let error = h.publisher.publish(PublishOptions::default()).await.unwrap_err();

        assert_eq!(error.code(), "IDENTITY_ERROR");
        assert_eq!(error.exit_code(), 1);
        assert_eq!(h.calls(), vec!["identity".to_string()]);

        let report = h.publisher.report();
        assert!(!report.success);
        assert_eq!(report.state, PublishState::Aborted);
        assert!(report.repository_uri.is_none());
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_fatal() {
        let mut h = harness(Some("123456789012"), true, true, None);

        let error = h.publisher.publish(PublishOptions::default()).await.unwrap_err();

        assert_eq!(error.code(), "REPOSITORY_LOOKUP_FAILED");
        assert_eq!(h.count("create"), 0);
        assert_eq!(h.count("login"), 0);
    }

    #[tokio::test]
    async fn test_build_failure_skips_tag_and_push() {
        let mut h = harness(Some("123456789012"), true, false, Some(("build", 2)));

        let error = h.publisher.publish(PublishOptions::default()).await.unwrap_err();

        assert_eq!(error.exit_code(), 2);
        assert_eq!(h.count("build"), 1);
        assert_eq!(h.count("tag"), 0);
        assert_eq!(h.count("push"), 0);
        assert_eq!(h.publisher.state_machine().get_state(), PublishState::Aborted);
    }

    #[tokio::test]
    async fn test_tag_failure_skips_push() {
        let mut h = harness(Some("123456789012"), true, false, Some(("tag", 1)));

        let error = h.publisher.publish(PublishOptions::default()).await.unwrap_err();

        assert_eq!(error.code(), "COMMAND_FAILED");
        assert_eq!(h.count("tag"), 1);
        assert_eq!(h.count("push"), 0);
    }

    #[tokio::test]
    async fn test_login_failure_skips_build() {
        let mut h = harness(Some("123456789012"), true, false, Some(("login", 1)));

        assert!(h.publisher.publish(PublishOptions::default()).await.is_err());
        assert_eq!(h.count("build"), 0);
    }

    #[tokio::test]
    async fn test_ensure_repository_is_idempotent() {
        let h = harness(Some("123456789012"), true, false, None);

        for _ in 0..2 {
            let outcome = h
                .publisher
                .ensure_repository("t2s-express-app", false)
                .await
                .unwrap();
            assert_eq!(outcome, RepositoryOutcome::AlreadyExists);
        }
        assert_eq!(h.count("create"), 0);
    }

    #[tokio::test]
    async fn test_ensure_repository_creates_once() {
        let h = harness(Some("123456789012"), false, false, None);

        let first = h
            .publisher
            .ensure_repository("t2s-express-app", false)
            .await
            .unwrap();
        let second = h
            .publisher
            .ensure_repository("t2s-express-app", false)
            .await
            .unwrap();

        assert_eq!(first, RepositoryOutcome::Created);
        assert_eq!(second, RepositoryOutcome::AlreadyExists);
        assert_eq!(h.count("create"), 1);
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_changes() {
        let mut h = harness(Some("123456789012"), false, false, None);

        let report = h
            .publisher
            .publish(PublishOptions { dry_run: true })
            .await
            .unwrap();

        assert!(report.success);
        assert!(report.dry_run);
        assert_eq!(report.repository_outcome, Some(RepositoryOutcome::WouldCreate));
        assert_eq!(
            h.calls(),
            vec!["identity".to_string(), "describe t2s-express-app".to_string()]
        );
        assert_eq!(
            report.planned_commands,
            vec![
                "fake-ecr create-repository t2s-express-app".to_string(),
                format!("docker login --username AWS --password-stdin {}", URI),
                "docker build -t t2s-express-app:latest .".to_string(),
                format!("docker tag t2s-express-app:latest {}:latest", URI),
                format!("docker push {}:latest", URI),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_identity() {
        let mut h = harness(Some("123456789012"), true, false, None);
        h.publisher.config.registry.repository = Some("Not Valid".to_string());

        let error = h.publisher.publish(PublishOptions::default()).await.unwrap_err();

        assert_eq!(error.code(), "INVALID_CONFIG");
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_rejects_missing_context() {
        let mut config = PublishConfig::default();
        config.image.context = Some(PathBuf::from("/nonexistent/project"));

        let error = match RegistryPublisher::from_config(config).await {
            Ok(_) => panic!("missing build context should be rejected"),
            Err(error) => error,
        };

        assert_eq!(error.code(), "INVALID_CONFIG");
        assert_eq!(error.exit_code(), 1);
        match error {
            PublishError::InvalidConfig { field, .. } => assert_eq!(field, "image.context"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_report_serialization() {
        let mut h = harness(Some("123456789012"), true, false, None);
        let report = h.publisher.publish(PublishOptions::default()).await.unwrap();

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"state\":\"PUSHED\""));
        assert!(json.contains("\"repositoryOutcome\":\"alreadyExists\""));
        assert!(!json.contains("plannedCommands"));
        assert!(!json.contains("fake-password"));
    }
}
