pub mod cli;
pub mod toml_config;

pub use toml_config::StackConfig;

#[cfg(feature = "cli")]
use crate::domain::model::PortForwardOptions;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_aws_region, validate_host, validate_non_empty_string};
#[cfg(feature = "cli")]
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::env;

/// Account and region the stack is synthesized for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    pub fn from_env() -> Self {
        Self {
            account: non_empty_var("CDK_DEFAULT_ACCOUNT"),
            region: non_empty_var("CDK_DEFAULT_REGION"),
        }
    }

    /// `aws://<account>/<region>`, with placeholders for unknown parts.
    pub fn name(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "bastion-stack")]
#[command(about = "Synthesize the ECS Fargate bastion stack to a CloudFormation template")]
pub struct StackArgs {
    /// Path to a TOML stack configuration; built-in defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory that receives the template and manifest
    #[arg(short, long, default_value = "cdk.out")]
    pub output_dir: String,

    /// Override the stack name from the configuration
    #[arg(long)]
    pub stack_name: Option<String>,

    /// Print the template to stdout instead of writing files
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "port-forward-helper")]
#[command(about = "Forward a local port to a remote host through a running ECS task")]
pub struct PortForwardArgs {
    /// ECS cluster name
    pub cluster: String,

    /// ECS service name
    pub service: String,

    /// Host reachable from the task, e.g. an RDS endpoint
    pub remote_host: String,

    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub remote_port: u16,

    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub local_port: u16,

    /// AWS region (default: ap-northeast-1)
    pub region: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl PortForwardArgs {
    pub fn into_options(self) -> Result<PortForwardOptions> {
        validate_non_empty_string("cluster", &self.cluster)?;
        validate_non_empty_string("service", &self.service)?;
        validate_host("remote_host", &self.remote_host)?;
        if let Some(region) = &self.region {
            validate_aws_region("region", region)?;
        }

        Ok(PortForwardOptions {
            cluster_name: self.cluster,
            service_name: self.service,
            remote_host: self.remote_host,
            remote_port: self.remote_port,
            local_port: self.local_port,
            region: self.region,
        })
    }
}
