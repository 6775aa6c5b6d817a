pub mod aws;
pub mod config;
pub mod core;
pub mod domain;
pub mod stack;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{PortForwardArgs, StackArgs};

pub use aws::{AwsCliSession, EcsTaskDiscovery};
pub use config::{cli::LocalStorage, Environment, StackConfig};
pub use core::forwarder::PortForwarder;
pub use stack::{App, BastionStack};
pub use utils::error::{BastionError, Result};
