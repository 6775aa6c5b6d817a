use clap::Parser;
use ecs_fargate_bastion::stack::template::Template;
use ecs_fargate_bastion::utils::error::BastionError;
use ecs_fargate_bastion::utils::{logger, validation::validate_path};
use ecs_fargate_bastion::{App, BastionStack, Environment, LocalStorage, StackArgs, StackConfig};

#[tokio::main]
async fn main() {
    let args = StackArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    if let Err(e) = run(&args).await {
        tracing::error!(
            "❌ Synthesis failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }
}

async fn run(args: &StackArgs) -> Result<(), BastionError> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            StackConfig::from_file(path)?
        }
        None => {
            tracing::info!("Using built-in stack configuration");
            StackConfig::default()
        }
    };

    // 應用命令列覆蓋設定
    if let Some(name) = &args.stack_name {
        config.stack.name = name.clone();
        tracing::info!("🔧 Stack name overridden to: {}", name);
    }

    let mut environment = Environment::from_env();
    if config.stack.region.is_some() {
        environment.region = config.stack.region.clone();
    }

    let template = BastionStack::synthesize(&config)?;

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - printing template only");
        println!("{}", template.to_json_pretty()?);
        return Ok(());
    }

    display_summary(&config, &environment, &template);

    validate_path("output_dir", &args.output_dir)?;
    let app = App::new(LocalStorage::new(&args.output_dir));
    let output = app
        .synth(&config.stack.name, &environment, &template)
        .await?;

    println!("✅ Stack synthesized successfully!");
    println!("📁 Template: {}/{}", args.output_dir, output.template_file);
    println!("📁 Manifest: {}/{}", args.output_dir, output.manifest_file);

    Ok(())
}

fn display_summary(config: &StackConfig, environment: &Environment, template: &Template) {
    println!("📋 Stack Summary:");
    println!("  Stack: {} ({})", config.stack.name, environment.name());
    println!(
        "  VPC: {} across {} AZs, {} NAT gateway(s)",
        config.network.vpc_cidr, config.network.max_azs, config.network.nat_gateways
    );
    println!(
        "  Cluster/Service: {}/{}",
        config.cluster.name, config.service.name
    );
    if config.database.enabled {
        println!(
            "  Database: mysql {} on {} (port {})",
            config.database.engine_version, config.database.instance_class, config.database.port
        );
    }
    println!(
        "  Resources: {}, Outputs: {}",
        template.resources.len(),
        template.outputs.len()
    );
    println!();
}
