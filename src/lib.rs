pub mod aws;
pub mod container;
pub mod core;
pub mod orchestration;
pub mod security;
pub mod validation;

pub use container::ContainerCli;
pub use self::core::*;
pub use orchestration::{PublishOptions, PublishReport, RegistryPublisher};
pub use security::{CommandError, RegistryCredentials, SafeCommandExecutor};
pub use validation::ImageValidator;
