//! Stack outputs, including a ready-to-edit port forwarding command.

use crate::config::toml_config::StackConfig;
use crate::domain::model::PORT_FORWARD_DOCUMENT;
use crate::stack::template::{get_att, join, reference, Template};
use crate::utils::error::Result;
use serde_json::json;

pub fn declare(
    template: &mut Template,
    config: &StackConfig,
    cluster_id: &str,
    service_id: &str,
    database_id: Option<&str>,
) -> Result<()> {
    template.add_output("ClusterName", reference(cluster_id), "ECS Cluster Name")?;
    template.add_output("ServiceName", get_att(service_id, "Name"), "ECS Service Name")?;

    if let Some(database_id) = database_id {
        let endpoint = get_att(database_id, "Endpoint.Address");
        template.add_output("RdsEndpoint", endpoint.clone(), "RDS Endpoint")?;

        let port = config.database.port;
        template.add_output(
            "PortForwardCommand",
            join(
                " ",
                vec![
                    json!("aws ssm start-session"),
                    json!(format!(
                        "--target ecs:{}_<TASK_ID>_<RUNTIME_ID>",
                        config.cluster.name
                    )),
                    json!(format!("--document-name {}", PORT_FORWARD_DOCUMENT)),
                    join(
                        "",
                        vec![
                            json!("--parameters '{\"host\":[\""),
                            endpoint,
                            json!(format!(
                                "\"],\"portNumber\":[\"{}\"],\"localPortNumber\":[\"{}\"]}}'",
                                port, port
                            )),
                        ],
                    ),
                ],
            ),
            "SSM Port Forward Command Template",
        )?;
    }

    Ok(())
}
