pub mod cli;

pub use cli::{ContainerCli, build_args};
