//! Sample MySQL instance reachable only from the bastion.

use crate::config::toml_config::{StackConfig, SubnetKind};
use crate::stack::compute::security_group;
use crate::stack::network::NetworkRefs;
use crate::stack::template::{get_att, join, reference, RemovalPolicy, Resource, Template};
use crate::utils::error::Result;
use serde_json::{json, Value};

pub const SECURITY_GROUP_ID: &str = "RdsSecurityGroup";
pub const INGRESS_ID: &str = "RdsSecurityGroupIngressFromBastion";
pub const SUBNET_GROUP_ID: &str = "RdsSubnetGroup";
pub const SECRET_ID: &str = "SampleDatabaseSecret";
pub const SECRET_ATTACHMENT_ID: &str = "SampleDatabaseSecretAttachment";
pub const INSTANCE_ID: &str = "SampleDatabase";

/// Characters RDS rejects in master passwords, plus shell-hostile ones.
const EXCLUDED_PASSWORD_CHARACTERS: &str = " %+~`#$&*()|[]{}:;<>?!'/@\"\\";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRefs {
    pub instance: String,
    pub security_group: String,
    pub secret: String,
}

pub fn declare(
    template: &mut Template,
    config: &StackConfig,
    network: &NetworkRefs,
    bastion_security_group: &str,
) -> Result<DatabaseRefs> {
    let database = &config.database;

    template.add_resource(
        SECURITY_GROUP_ID,
        security_group(&network.vpc, "Security group for RDS"),
    )?;

    template.add_resource(
        INGRESS_ID,
        Resource::new(
            "AWS::EC2::SecurityGroupIngress",
            json!({
                "Description": "Allow access from bastion",
                "FromPort": database.port,
                "GroupId": get_att(SECURITY_GROUP_ID, "GroupId"),
                "IpProtocol": "tcp",
                "SourceSecurityGroupId": get_att(bastion_security_group, "GroupId"),
                "ToPort": database.port,
            }),
        ),
    )?;

    let subnets: Vec<Value> = network
        .subnet_ids(SubnetKind::PrivateIsolated)
        .iter()
        .map(|id| reference(id))
        .collect();
    template.add_resource(
        SUBNET_GROUP_ID,
        Resource::new(
            "AWS::RDS::DBSubnetGroup",
            json!({
                "DBSubnetGroupDescription": "Subnet group for RDS",
                "SubnetIds": subnets,
            }),
        ),
    )?;

    let username_template = serde_json::to_string(&json!({ "username": database.master_username }))?;
    template.add_resource(
        SECRET_ID,
        Resource::new(
            "AWS::SecretsManager::Secret",
            json!({
                "Description": format!("Generated credentials for {}/{}", config.stack.name, INSTANCE_ID),
                "GenerateSecretString": {
                    "ExcludeCharacters": EXCLUDED_PASSWORD_CHARACTERS,
                    "GenerateStringKey": "password",
                    "PasswordLength": 30,
                    "SecretStringTemplate": username_template,
                },
            }),
        )
        .removal_policy(RemovalPolicy::Delete),
    )?;

    template.add_resource(
        INSTANCE_ID,
        Resource::new(
            "AWS::RDS::DBInstance",
            json!({
                "AllocatedStorage": database.allocated_storage_gib.to_string(),
                "CopyTagsToSnapshot": true,
                "DBInstanceClass": database.instance_class,
                "DBName": database.database_name,
                "DBSubnetGroupName": reference(SUBNET_GROUP_ID),
                "DeleteAutomatedBackups": database.delete_automated_backups,
                "Engine": "mysql",
                "EngineVersion": database.engine_version,
                "MasterUsername": secret_field("username"),
                "MasterUserPassword": secret_field("password"),
                "Port": database.port.to_string(),
                "PubliclyAccessible": false,
                "StorageType": "gp2",
                "VPCSecurityGroups": [get_att(SECURITY_GROUP_ID, "GroupId")],
            }),
        )
        .removal_policy(RemovalPolicy::Delete),
    )?;

    template.add_resource(
        SECRET_ATTACHMENT_ID,
        Resource::new(
            "AWS::SecretsManager::SecretTargetAttachment",
            json!({
                "SecretId": reference(SECRET_ID),
                "TargetId": reference(INSTANCE_ID),
                "TargetType": "AWS::RDS::DBInstance",
            }),
        ),
    )?;

    Ok(DatabaseRefs {
        instance: INSTANCE_ID.to_string(),
        security_group: SECURITY_GROUP_ID.to_string(),
        secret: SECRET_ID.to_string(),
    })
}

/// Dynamic reference resolved by CloudFormation at deploy time, so the
/// password never appears in the template.
fn secret_field(key: &str) -> Value {
    join(
        "",
        vec![
            json!("{{resolve:secretsmanager:"),
            reference(SECRET_ID),
            json!(format!(":SecretString:{}::}}}}", key)),
        ],
    )
}
