use clap::error::ErrorKind;
use clap::Parser;
use ecs_fargate_bastion::utils::error::BastionError;
use ecs_fargate_bastion::utils::logger;
use ecs_fargate_bastion::{AwsCliSession, EcsTaskDiscovery, PortForwardArgs, PortForwarder};

const USAGE: &str = "Usage: port-forward-helper <cluster> <service> <remote_host> <remote_port> <local_port> [region]";
const EXAMPLE: &str = "  port-forward-helper bastion-cluster bastion-service mydb.cluster-xxx.rds.amazonaws.com 3306 3306";

#[tokio::main]
async fn main() {
    let args = match PortForwardArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let err = BastionError::UsageError {
                message: e.kind().to_string(),
            };
            eprint!("{}", e);
            print_usage();
            std::process::exit(err.exit_code());
        }
    };

    logger::init_cli_logger(args.verbose);

    if let Err(e) = run(args).await {
        tracing::error!(
            "❌ Port forwarding failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("Error: {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        if matches!(e, BastionError::InvalidConfigValueError { .. }) {
            print_usage();
        }
        std::process::exit(e.exit_code());
    }
}

async fn run(args: PortForwardArgs) -> Result<(), BastionError> {
    let options = args.into_options()?;

    let discovery = EcsTaskDiscovery::for_region(options.region()).await;
    let forwarder = PortForwarder::new(discovery, AwsCliSession::default());

    let outcome = forwarder.start(&options).await?;
    if !outcome.is_success() {
        return Err(BastionError::SessionFailedError {
            code: outcome.exit_code,
        });
    }
    Ok(())
}

fn print_usage() {
    println!("{}", USAGE);
    println!();
    println!("Example:");
    println!("{}", EXAMPLE);
}
