//! Container tool driven through its command line
//!
//! Every operation is one child process run by [`SafeCommandExecutor`].
//! Build and push stream their output to the terminal; login captures it so
//! the password-stdin exchange stays quiet.

use crate::core::error::{PublishError, PublishResult};
use crate::core::image::ImageReference;
use crate::core::traits::ContainerTool;
use crate::security::command_executor::SafeCommandExecutor;
use crate::security::token_manager::RegistryCredentials;
use secrecy::ExposeSecret;
use std::path::Path;
use std::process::ExitStatus;

/// `docker`-compatible CLI
#[derive(Debug, Clone)]
pub struct ContainerCli {
    tool: String,
    executor: SafeCommandExecutor,
}

impl ContainerCli {
    /// `tool` is the executable name or path; commands run in the executor's
    /// working directory unless a step specifies its own.
    pub fn new(tool: impl Into<String>, executor: SafeCommandExecutor) -> Self {
        Self {
            tool: tool.into(),
            executor,
        }
    }

    fn display(&self, args: &[&str]) -> String {
        format!("{} {}", self.tool, args.join(" "))
    }

    fn check_status(&self, step: &str, args: &[&str], status: ExitStatus) -> PublishResult<()> {
        if status.success() {
            return Ok(());
        }

        Err(PublishError::CommandFailed {
            step: step.to_string(),
            command: self.display(args),
            exit_code: status.code(),
            stderr: String::new(),
        })
    }

    fn run_inherited(
        &self,
        executor: &SafeCommandExecutor,
        step: &str,
        args: &[&str],
    ) -> PublishResult<()> {
        tracing::info!("{}: {}", step, self.display(args));
        let status = executor.execute_inherited(&self.tool, args)?;
        self.check_status(step, args, status)
    }
}

/// Arguments for `build`
pub fn build_args<'a>(image: &'a str, dockerfile: Option<&'a str>) -> Vec<&'a str> {
    let mut args = vec!["build", "-t", image];
    if let Some(dockerfile) = dockerfile {
        args.extend(["-f", dockerfile]);
    }
    args.push(".");
    args
}

impl ContainerTool for ContainerCli {
    fn name(&self) -> &str {
        &self.tool
    }

    fn login(&self, server: &str, credentials: &RegistryCredentials) -> PublishResult<()> {
        let args = [
            "login",
            "--username",
            credentials.username(),
            "--password-stdin",
            server,
        ];
        tracing::info!("login: {}", self.display(&args));

        let output = self.executor.execute_with_stdin(
            &self.tool,
            &args,
            credentials.password().expose_secret().as_bytes(),
        )?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = credentials.mask_in(String::from_utf8_lossy(&output.stderr).trim());
        Err(PublishError::CommandFailed {
            step: "login".to_string(),
            command: self.display(&args),
            exit_code: output.status.code(),
            stderr,
        })
    }

    fn build(
        &self,
        context: &Path,
        image: &ImageReference,
        dockerfile: Option<&Path>,
    ) -> PublishResult<()> {
        let executor = self.executor.in_dir(context)?;
        let image = image.to_string();
        let dockerfile = dockerfile.map(|d| d.to_string_lossy().into_owned());
        let args = build_args(&image, dockerfile.as_deref());

        self.run_inherited(&executor, "build", &args)
    }

    fn tag(&self, source: &ImageReference, target: &ImageReference) -> PublishResult<()> {
        let source = source.to_string();
        let target = target.to_string();
        let args = ["tag", source.as_str(), target.as_str()];

        self.run_inherited(&self.executor, "tag", &args)
    }

    fn push(&self, image: &ImageReference) -> PublishResult<()> {
        let image = image.to_string();
        let args = ["push", image.as_str()];

        self.run_inherited(&self.executor, "push", &args)
    }
}
