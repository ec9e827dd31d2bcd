pub mod command_executor;
pub mod token_manager;

pub use command_executor::{ALLOWED_COMMANDS, CommandError, SafeCommandExecutor};
pub use token_manager::{ECR_USERNAME, RegistryCredentials, mask_token};
