//! ECS cluster, Fargate task definition and the bastion service.

use crate::config::toml_config::{StackConfig, SubnetKind};
use crate::stack::iam::RoleRefs;
use crate::stack::network::NetworkRefs;
use crate::stack::template::{get_att, pseudo, reference, RemovalPolicy, Resource, Template};
use crate::utils::error::Result;
use serde_json::{json, Value};

pub const CLUSTER_ID: &str = "BastionCluster";
pub const CAPACITY_PROVIDERS_ID: &str = "BastionClusterCapacityProviders";
pub const LOG_GROUP_ID: &str = "BastionLogGroup";
pub const TASK_DEFINITION_ID: &str = "BastionTaskDefinition";
pub const SECURITY_GROUP_ID: &str = "BastionSecurityGroup";
pub const SERVICE_ID: &str = "BastionService";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeRefs {
    pub cluster: String,
    pub service: String,
    pub security_group: String,
}

pub fn declare_log_group(template: &mut Template, config: &StackConfig) -> Result<String> {
    template.add_resource(
        LOG_GROUP_ID,
        Resource::new(
            "AWS::Logs::LogGroup",
            json!({
                "LogGroupName": config.task.log_group_name,
                "RetentionInDays": config.task.log_retention_days,
            }),
        )
        .removal_policy(RemovalPolicy::Delete),
    )?;
    Ok(LOG_GROUP_ID.to_string())
}

/// Security group with no ingress; all outbound traffic is allowed.
pub fn security_group(vpc_id: &str, description: &str) -> Resource {
    Resource::new(
        "AWS::EC2::SecurityGroup",
        json!({
            "GroupDescription": description,
            "SecurityGroupEgress": [{
                "CidrIp": "0.0.0.0/0",
                "Description": "Allow all outbound traffic by default",
                "IpProtocol": "-1",
            }],
            "VpcId": reference(vpc_id),
        }),
    )
}

pub fn declare(
    template: &mut Template,
    config: &StackConfig,
    network: &NetworkRefs,
    roles: &RoleRefs,
    log_group_id: &str,
) -> Result<ComputeRefs> {
    template.add_resource(
        CLUSTER_ID,
        Resource::new("AWS::ECS::Cluster", json!({ "ClusterName": config.cluster.name })),
    )?;

    if config.cluster.enable_fargate_capacity_providers {
        template.add_resource(
            CAPACITY_PROVIDERS_ID,
            Resource::new(
                "AWS::ECS::ClusterCapacityProviderAssociations",
                json!({
                    "CapacityProviders": ["FARGATE", "FARGATE_SPOT"],
                    "Cluster": reference(CLUSTER_ID),
                    "DefaultCapacityProviderStrategy": [],
                }),
            ),
        )?;
    }

    template.add_resource(
        TASK_DEFINITION_ID,
        Resource::new(
            "AWS::ECS::TaskDefinition",
            json!({
                "ContainerDefinitions": [container_definition(config, log_group_id)],
                "Cpu": config.task.cpu.to_string(),
                "ExecutionRoleArn": get_att(&roles.execution_role, "Arn"),
                "Family": format!("{}{}", config.stack.name, TASK_DEFINITION_ID),
                "Memory": config.task.memory_mib.to_string(),
                "NetworkMode": "awsvpc",
                "RequiresCompatibilities": ["FARGATE"],
                "TaskRoleArn": get_att(&roles.task_role, "Arn"),
            }),
        ),
    )?;

    template.add_resource(
        SECURITY_GROUP_ID,
        security_group(&network.vpc, "Security group for ECS Fargate bastion"),
    )?;

    let subnets: Vec<Value> = network
        .subnet_ids(SubnetKind::PrivateWithEgress)
        .iter()
        .map(|id| reference(id))
        .collect();

    let mut service = Resource::new(
        "AWS::ECS::Service",
        json!({
            "Cluster": reference(CLUSTER_ID),
            "DeploymentConfiguration": {
                "MaximumPercent": 200,
                "MinimumHealthyPercent": 50,
            },
            "DesiredCount": config.service.desired_count,
            "EnableECSManagedTags": false,
            "EnableExecuteCommand": config.service.enable_execute_command,
            "LaunchType": "FARGATE",
            "NetworkConfiguration": {
                "AwsvpcConfiguration": {
                    "AssignPublicIp": "DISABLED",
                    "SecurityGroups": [get_att(SECURITY_GROUP_ID, "GroupId")],
                    "Subnets": subnets,
                },
            },
            "ServiceName": config.service.name,
            "TaskDefinition": reference(TASK_DEFINITION_ID),
        }),
    )
    .depends_on(&roles.execution_policy);

    // Tasks in private subnets pull images through the NAT routes.
    for route in &network.egress_routes {
        service = service.depends_on(route);
    }
    if config.cluster.enable_fargate_capacity_providers {
        service = service.depends_on(CAPACITY_PROVIDERS_ID);
    }
    template.add_resource(SERVICE_ID, service)?;

    Ok(ComputeRefs {
        cluster: CLUSTER_ID.to_string(),
        service: SERVICE_ID.to_string(),
        security_group: SECURITY_GROUP_ID.to_string(),
    })
}

fn container_definition(config: &StackConfig, log_group_id: &str) -> Value {
    json!({
        "Command": config.task.command,
        "Essential": true,
        "Image": config.task.image,
        "LogConfiguration": {
            "LogDriver": "awslogs",
            "Options": {
                "awslogs-group": reference(log_group_id),
                "awslogs-stream-prefix": config.task.log_stream_prefix,
                "awslogs-region": pseudo("Region"),
            },
        },
        "Name": config.task.container_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{iam, network};

    fn declared(config: &StackConfig) -> Template {
        let mut template = Template::new("test");
        let net = network::declare(&mut template, config).unwrap();
        let log_group = declare_log_group(&mut template, config).unwrap();
        let roles = iam::declare(&mut template, &log_group).unwrap();
        declare(&mut template, config, &net, &roles, &log_group).unwrap();
        template
    }

    #[test]
    fn test_service_runs_in_private_subnets_with_exec() {
        let template = declared(&StackConfig::default());
        let service = template.resource(SERVICE_ID).unwrap();
        let vpc_config = &service.property("NetworkConfiguration").unwrap()["AwsvpcConfiguration"];
        assert_eq!(vpc_config["AssignPublicIp"], "DISABLED");
        assert_eq!(
            vpc_config["Subnets"],
            json!([
                { "Ref": "BastionVpcPrivateSubnet1" },
                { "Ref": "BastionVpcPrivateSubnet2" }
            ])
        );
        assert_eq!(service.property("EnableExecuteCommand"), Some(&json!(true)));
        assert_eq!(service.property("ServiceName"), Some(&json!("bastion-service")));
        assert!(service
            .depends_on
            .contains(&"BastionVpcPrivateSubnet1DefaultRoute".to_string()));
    }

    #[test]
    fn test_task_definition_sizes_and_logging() {
        let template = declared(&StackConfig::default());
        let task = template.resource(TASK_DEFINITION_ID).unwrap();
        assert_eq!(task.property("Cpu"), Some(&json!("256")));
        assert_eq!(task.property("Memory"), Some(&json!("512")));

        let container = &task.property("ContainerDefinitions").unwrap()[0];
        assert_eq!(container["Image"], "amazonlinux:2");
        assert_eq!(container["Command"][0], "/bin/bash");
        assert_eq!(
            container["LogConfiguration"]["Options"]["awslogs-stream-prefix"],
            "bastion"
        );
    }

    #[test]
    fn test_log_group_is_destroyed_with_stack() {
        let template = declared(&StackConfig::default());
        let log_group = template.resource(LOG_GROUP_ID).unwrap();
        assert_eq!(log_group.deletion_policy, Some(RemovalPolicy::Delete));
        assert_eq!(log_group.property("RetentionInDays"), Some(&json!(7)));
        assert_eq!(log_group.property("LogGroupName"), Some(&json!("/ecs/bastion-task")));
    }

    #[test]
    fn test_capacity_providers_can_be_disabled() {
        let mut config = StackConfig::default();
        config.cluster.enable_fargate_capacity_providers = false;
        let template = declared(&config);
        assert!(template.resource(CAPACITY_PROVIDERS_ID).is_none());
        assert!(template.validate().is_ok());
    }
}
