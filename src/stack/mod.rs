//! Declarative description of the bastion stack, rendered as a
//! CloudFormation template.

pub mod app;
pub mod cidr;
pub mod compute;
pub mod database;
pub mod iam;
pub mod network;
pub mod outputs;
pub mod template;

use crate::config::StackConfig;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use template::Template;

pub use app::{App, SynthOutput};

pub struct BastionStack;

impl BastionStack {
    /// Validates `config` and declares every resource of the stack.
    pub fn synthesize(config: &StackConfig) -> Result<Template> {
        config.validate()?;

        let mut template = Template::new(&config.stack.description);

        let network = network::declare(&mut template, config)?;
        let log_group = compute::declare_log_group(&mut template, config)?;
        let roles = iam::declare(&mut template, &log_group)?;
        let compute = compute::declare(&mut template, config, &network, &roles, &log_group)?;

        let database = if config.database.enabled {
            Some(database::declare(
                &mut template,
                config,
                &network,
                &compute.security_group,
            )?)
        } else {
            None
        };

        outputs::declare(
            &mut template,
            config,
            &compute.cluster,
            &compute.service,
            database.as_ref().map(|d| d.instance.as_str()),
        )?;

        template.validate()?;

        tracing::info!(
            "Synthesized stack {} with {} resources and {} outputs",
            config.stack.name,
            template.resources.len(),
            template.outputs.len()
        );

        Ok(template)
    }
}
