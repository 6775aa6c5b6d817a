//! Task and execution roles for the bastion task.

use crate::stack::template::{get_att, managed_policy_arn, reference, Resource, Template};
use crate::utils::error::Result;
use serde_json::{json, Value};

pub const TASK_ROLE_ID: &str = "BastionTaskRole";
pub const EXECUTION_ROLE_ID: &str = "BastionExecutionRole";
pub const EXECUTION_ROLE_POLICY_ID: &str = "BastionExecutionRoleDefaultPolicy";

const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Channels the SSM agent opens for ECS Exec and port forwarding.
pub const SSM_MESSAGES_ACTIONS: [&str; 4] = [
    "ssmmessages:CreateControlChannel",
    "ssmmessages:CreateDataChannel",
    "ssmmessages:OpenControlChannel",
    "ssmmessages:OpenDataChannel",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRefs {
    pub task_role: String,
    pub execution_role: String,
    pub execution_policy: String,
}

pub fn assume_role_policy(service: &str) -> Value {
    json!({
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": service },
        }],
        "Version": "2012-10-17",
    })
}

pub fn policy_document(statements: Vec<Value>) -> Value {
    json!({ "Statement": statements, "Version": "2012-10-17" })
}

pub fn allow(actions: &[&str], resource: Value) -> Value {
    let action = match actions {
        [single] => json!(single),
        many => json!(many),
    };
    json!({ "Action": action, "Effect": "Allow", "Resource": resource })
}

/// Declares both roles. The execution role's log permissions are scoped to
/// `log_group_id`, which must be declared by the caller.
pub fn declare(template: &mut Template, log_group_id: &str) -> Result<RoleRefs> {
    template.add_resource(
        TASK_ROLE_ID,
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role_policy(ECS_TASKS_PRINCIPAL),
                "ManagedPolicyArns": [managed_policy_arn("AmazonSSMManagedInstanceCore")],
                "Policies": [{
                    "PolicyName": "ECSExecPolicy",
                    "PolicyDocument": policy_document(vec![allow(&SSM_MESSAGES_ACTIONS, json!("*"))]),
                }],
            }),
        ),
    )?;

    template.add_resource(
        EXECUTION_ROLE_ID,
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role_policy(ECS_TASKS_PRINCIPAL),
                "ManagedPolicyArns": [
                    managed_policy_arn("service-role/AmazonECSTaskExecutionRolePolicy")
                ],
            }),
        ),
    )?;

    template.add_resource(
        EXECUTION_ROLE_POLICY_ID,
        Resource::new(
            "AWS::IAM::Policy",
            json!({
                "PolicyName": EXECUTION_ROLE_POLICY_ID,
                "PolicyDocument": policy_document(vec![allow(
                    &["logs:CreateLogStream", "logs:PutLogEvents"],
                    get_att(log_group_id, "Arn"),
                )]),
                "Roles": [reference(EXECUTION_ROLE_ID)],
            }),
        ),
    )?;

    Ok(RoleRefs {
        task_role: TASK_ROLE_ID.to_string(),
        execution_role: EXECUTION_ROLE_ID.to_string(),
        execution_policy: EXECUTION_ROLE_POLICY_ID.to_string(),
    })
}
