//! ECR Publisher CLI
//!
//! Builds a container image and publishes it to the caller's ECR registry

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ecr_publisher::{
    ConfigLoadOptions, ConfigLoader, ContainerConfig, ImageConfig, ImageValidator, PublishConfig,
    PublishError, PublishOptions, PublishReport, RegistryConfig, RegistryCoordinates,
    RegistryPublisher,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Container image publishing assistant for Amazon ECR
#[derive(Parser)]
#[command(name = "ecr-publisher")]
#[command(version)]
#[command(about = "Build a container image and push it to Amazon ECR", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every subcommand; unset flags fall back to env and file
#[derive(Args, Debug, Default)]
struct Overrides {
    /// AWS region
    #[arg(long)]
    region: Option<String>,

    /// ECR repository name
    #[arg(long)]
    repository: Option<String>,

    /// Image tag
    #[arg(long)]
    tag: Option<String>,

    /// Dockerfile path relative to the build context
    #[arg(long)]
    dockerfile: Option<PathBuf>,

    /// Container tool (docker, podman, finch, nerdctl)
    #[arg(long)]
    container_tool: Option<String>,
}

impl Overrides {
    fn into_config(self) -> PublishConfig {
        PublishConfig {
            version: String::new(),
            extends: None,
            registry: RegistryConfig {
                region: self.region,
                repository: self.repository,
            },
            image: ImageConfig {
                tag: self.tag,
                context: None,
                dockerfile: self.dockerfile,
            },
            container: ContainerConfig {
                tool: self.container_tool,
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the image and push it to ECR
    Publish {
        /// Project path / build context (defaults to current directory)
        #[arg(value_name = "PROJECT_PATH")]
        project_path: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,

        /// Resolve identity and check the repository only
        #[arg(long)]
        dry_run: bool,

        /// Write the publish report as JSON to this path
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Validate the configuration without calling AWS
    Check {
        /// Project path (defaults to current directory)
        #[arg(value_name = "PROJECT_PATH")]
        project_path: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the repository URI for an account
    Uri {
        /// AWS account id
        #[arg(long)]
        account_id: String,

        /// Project path (defaults to current directory)
        #[arg(value_name = "PROJECT_PATH")]
        project_path: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `-v`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Publish {
            project_path,
            overrides,
            dry_run,
            report,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            publish_command(path, overrides, dry_run, report).await
        }
        Commands::Check {
            project_path,
            overrides,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            check_command(path, overrides).await
        }
        Commands::Uri {
            account_id,
            project_path,
            overrides,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            uri_command(path, account_id, overrides).await
        }
    }
}

async fn load_config(project_path: &Path, overrides: Overrides) -> Result<PublishConfig, PublishError> {
    let options = ConfigLoadOptions::new(project_path).with_cli_args(overrides.into_config());
    ConfigLoader::load(options).await
}

fn print_error(error: &PublishError) {
    eprintln!("\n❌ Publishing failed [{}]", error.code());
    eprintln!("{}", error);

    let actions = error.suggested_actions();
    if !actions.is_empty() {
        eprintln!("\n💡 Suggested actions:");
        for action in actions {
            eprintln!("  - {}", action);
        }
    }
}

fn write_report(path: &Path, report: &PublishReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    println!("📝 Report written to {}", path.display());
    Ok(())
}

async fn publish_command(
    project_path: PathBuf,
    overrides: Overrides,
    dry_run: bool,
    report_path: Option<PathBuf>,
) -> Result<i32> {
    println!("\n🐳 ecr-publisher\n");

    let config = match load_config(&project_path, overrides).await {
        Ok(config) => config,
        Err(e) => {
            print_error(&e);
            return Ok(e.exit_code());
        }
    };

    let mut publisher = match RegistryPublisher::from_config(config).await {
        Ok(publisher) => publisher,
        Err(e) => {
            print_error(&e);
            return Ok(e.exit_code());
        }
    };

    let result = publisher.publish(PublishOptions { dry_run }).await;
    let report = match &result {
        Ok(report) => report.clone(),
        Err(_) => publisher.report(),
    };

    if let Some(path) = report_path {
        if let Err(e) = write_report(&path, &report) {
            eprintln!("⚠️  {:#}", e);
        }
    }

    match result {
        Ok(report) => {
            if report.dry_run {
                println!("✅ Dry-run completed ({} ms)", report.duration_ms);
            } else {
                println!(
                    "✅ Published {} ({} ms)",
                    report.remote_image.as_deref().unwrap_or("-"),
                    report.duration_ms
                );
            }
            tracing::debug!("\n{}", publisher.state_machine().get_history());
            Ok(0)
        }
        Err(e) => {
            print_error(&e);
            tracing::debug!("\n{}", publisher.state_machine().get_history());
            Ok(e.exit_code())
        }
    }
}

async fn check_command(project_path: PathBuf, overrides: Overrides) -> Result<i32> {
    println!("\n🔍 Configuration Check\n");

    let config = match load_config(&project_path, overrides).await {
        Ok(config) => config,
        Err(e) => {
            print_error(&e);
            return Ok(e.exit_code());
        }
    };

    println!("  Region:      {}", config.region());
    println!("  Repository:  {}", config.repository());
    println!("  Tag:         {}", config.tag());
    println!("  Context:     {}", config.context().display());
    if let Some(dockerfile) = config.dockerfile() {
        println!("  Dockerfile:  {}", dockerfile.display());
    }
    println!("  Tool:        {}\n", config.container_tool());

    let result = ConfigLoader::validate(&config);
    println!("{}\n", ConfigLoader::format_validation_result(&result));

    Ok(if result.valid { 0 } else { 1 })
}

async fn uri_command(project_path: PathBuf, account_id: String, overrides: Overrides) -> Result<i32> {
    if let Err(message) = ImageValidator::validate_account_id(&account_id) {
        let error = PublishError::InvalidConfig {
            field: "accountId".to_string(),
            message,
        };
        print_error(&error);
        return Ok(error.exit_code());
    }

    let config = match load_config(&project_path, overrides).await {
        Ok(config) => config,
        Err(e) => {
            print_error(&e);
            return Ok(e.exit_code());
        }
    };

    let coordinates = RegistryCoordinates::new(account_id, config.region(), config.repository());
    println!("{}", coordinates.repository_uri());
    println!("{}", coordinates.image(config.tag()));

    Ok(0)
}
