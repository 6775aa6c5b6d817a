use crate::stack::cidr::Ipv4Cidr;
use crate::utils::error::{BastionError, Result};
use crate::utils::validation::{
    validate_aws_region, validate_non_empty_string, validate_one_of, validate_positive_number,
    validate_range, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

/// Retention periods CloudWatch Logs accepts, in days.
pub const LOG_RETENTION_DAYS: [u32; 22] = [
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub stack: StackSection,
    pub network: NetworkConfig,
    pub cluster: ClusterConfig,
    pub task: TaskConfig,
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSection {
    pub name: String,
    pub description: String,
    pub region: Option<String>,
}

impl Default for StackSection {
    fn default() -> Self {
        Self {
            name: "EcsFargateBastionStack".to_string(),
            description: "ECS Fargate bastion with SSM port forwarding to RDS".to_string(),
            region: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubnetKind {
    Public,
    PrivateWithEgress,
    PrivateIsolated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubnetGroupConfig {
    pub name: String,
    pub kind: SubnetKind,
    pub cidr_mask: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub vpc_cidr: String,
    pub max_azs: usize,
    pub nat_gateways: usize,
    pub subnets: Vec<SubnetGroupConfig>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vpc_cidr: "10.0.0.0/16".to_string(),
            max_azs: 2,
            nat_gateways: 1,
            subnets: vec![
                SubnetGroupConfig {
                    name: "Public".to_string(),
                    kind: SubnetKind::Public,
                    cidr_mask: 24,
                },
                SubnetGroupConfig {
                    name: "Private".to_string(),
                    kind: SubnetKind::PrivateWithEgress,
                    cidr_mask: 24,
                },
                SubnetGroupConfig {
                    name: "Database".to_string(),
                    kind: SubnetKind::PrivateIsolated,
                    cidr_mask: 24,
                },
            ],
        }
    }
}

impl NetworkConfig {
    pub fn has_kind(&self, kind: SubnetKind) -> bool {
        self.subnets.iter().any(|s| s.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub name: String,
    pub enable_fargate_capacity_providers: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "bastion-cluster".to_string(),
            enable_fargate_capacity_providers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub cpu: u32,
    pub memory_mib: u32,
    pub container_name: String,
    pub image: String,
    pub command: Vec<String>,
    pub log_group_name: String,
    pub log_retention_days: u32,
    pub log_stream_prefix: String,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            cpu: 256,
            memory_mib: 512,
            container_name: "BastionContainer".to_string(),
            image: "amazonlinux:2".to_string(),
            command: vec![
                "/bin/bash".to_string(),
                "-c".to_string(),
                "yum update -y && yum install -y amazon-ssm-agent && /usr/bin/amazon-ssm-agent & while true; do sleep 30; done".to_string(),
            ],
            log_group_name: "/ecs/bastion-task".to_string(),
            log_retention_days: 7,
            log_stream_prefix: "bastion".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub desired_count: u32,
    pub enable_execute_command: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "bastion-service".to_string(),
            desired_count: 1,
            enable_execute_command: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub engine_version: String,
    pub instance_class: String,
    pub database_name: String,
    pub master_username: String,
    pub port: u16,
    pub allocated_storage_gib: u32,
    pub delete_automated_backups: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engine_version: "8.0".to_string(),
            instance_class: "db.t3.micro".to_string(),
            database_name: "sampledb".to_string(),
            master_username: "admin".to_string(),
            port: 3306,
            allocated_storage_gib: 100,
            delete_automated_backups: true,
        }
    }
}

impl StackConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BastionError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| BastionError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unset variables are left as-is.
    fn substitute_env_vars(content: &str) -> String {
        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn vpc_cidr(&self) -> Result<Ipv4Cidr> {
        self.network
            .vpc_cidr
            .parse::<Ipv4Cidr>()
            .map_err(|e| BastionError::InvalidConfigValueError {
                field: "network.vpc_cidr".to_string(),
                value: self.network.vpc_cidr.clone(),
                reason: e.to_string(),
            })
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_stack_name(&self.stack.name)?;
        if let Some(region) = &self.stack.region {
            validate_aws_region("stack.region", region)?;
        }

        self.validate_network()?;

        validate_non_empty_string("cluster.name", &self.cluster.name)?;
        validate_non_empty_string("service.name", &self.service.name)?;

        validate_fargate_size(self.task.cpu, self.task.memory_mib)?;
        validate_non_empty_string("task.container_name", &self.task.container_name)?;
        validate_non_empty_string("task.image", &self.task.image)?;
        validate_positive_number("task.command", self.task.command.len(), 1)?;
        validate_non_empty_string("task.log_group_name", &self.task.log_group_name)?;
        validate_non_empty_string("task.log_stream_prefix", &self.task.log_stream_prefix)?;
        validate_one_of(
            "task.log_retention_days",
            self.task.log_retention_days,
            &LOG_RETENTION_DAYS,
        )?;

        if self.database.enabled {
            validate_non_empty_string("database.engine_version", &self.database.engine_version)?;
            validate_non_empty_string("database.instance_class", &self.database.instance_class)?;
            validate_database_name(&self.database.database_name)?;
            validate_non_empty_string("database.master_username", &self.database.master_username)?;
            validate_range("database.port", self.database.port, 1150, 65535)?;
            validate_range(
                "database.allocated_storage_gib",
                self.database.allocated_storage_gib,
                20,
                65536,
            )?;
        }

        Ok(())
    }

    fn validate_network(&self) -> Result<()> {
        let network = &self.network;
        let vpc = self.vpc_cidr()?;
        validate_range("network.vpc_cidr", vpc.mask, 16, 28)?;
        // RDS subnet groups must span at least two availability zones.
        validate_range("network.max_azs", network.max_azs, 2, 6)?;
        validate_range("network.nat_gateways", network.nat_gateways, 0, network.max_azs)?;
        validate_positive_number("network.subnets", network.subnets.len(), 1)?;

        let mut names = HashSet::new();
        for subnet in &network.subnets {
            if subnet.name.is_empty() || !subnet.name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(BastionError::InvalidConfigValueError {
                    field: "network.subnets.name".to_string(),
                    value: subnet.name.clone(),
                    reason: "Subnet group names may only contain A-Z, a-z and 0-9".to_string(),
                });
            }
            if !names.insert(subnet.name.as_str()) {
                return Err(BastionError::ConfigValidationError {
                    field: "network.subnets".to_string(),
                    message: format!("Subnet group '{}' is declared twice", subnet.name),
                });
            }
            validate_range("network.subnets.cidr_mask", subnet.cidr_mask, vpc.mask.max(16), 28)?;
        }

        for kind in [SubnetKind::PrivateWithEgress, SubnetKind::PrivateIsolated] {
            if !network.has_kind(kind) && (kind == SubnetKind::PrivateWithEgress || self.database.enabled) {
                return Err(BastionError::ConfigValidationError {
                    field: "network.subnets".to_string(),
                    message: format!("A {:?} subnet group is required", kind),
                });
            }
        }

        if network.has_kind(SubnetKind::PrivateWithEgress) {
            if network.nat_gateways == 0 {
                return Err(BastionError::ConfigValidationError {
                    field: "network.nat_gateways".to_string(),
                    message: "Private subnets with egress need at least one NAT gateway".to_string(),
                });
            }
            if !network.has_kind(SubnetKind::Public) {
                return Err(BastionError::ConfigValidationError {
                    field: "network.subnets".to_string(),
                    message: "NAT gateways need a Public subnet group".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Validate for StackConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn validate_stack_name(name: &str) -> Result<()> {
    let valid = name.len() <= 128
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(BastionError::InvalidConfigValueError {
            field: "stack.name".to_string(),
            value: name.to_string(),
            reason: "Stack names start with a letter and contain only letters, digits and hyphens"
                .to_string(),
        });
    }
    Ok(())
}

fn validate_database_name(name: &str) -> Result<()> {
    let valid = name.len() <= 64
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(BastionError::InvalidConfigValueError {
            field: "database.database_name".to_string(),
            value: name.to_string(),
            reason: "Database names start with a letter and contain only letters, digits and underscores"
                .to_string(),
        });
    }
    Ok(())
}

/// Fargate only runs specific CPU/memory pairings.
pub fn validate_fargate_size(cpu: u32, memory_mib: u32) -> Result<()> {
    let allowed: Vec<u32> = match cpu {
        256 => vec![512, 1024, 2048],
        512 => (1..=4).map(|gb| gb * 1024).collect(),
        1024 => (2..=8).map(|gb| gb * 1024).collect(),
        2048 => (4..=16).map(|gb| gb * 1024).collect(),
        4096 => (8..=30).map(|gb| gb * 1024).collect(),
        8192 => (16..=60).step_by(4).map(|gb| gb * 1024).collect(),
        16384 => (32..=120).step_by(8).map(|gb| gb * 1024).collect(),
        other => {
            return Err(BastionError::InvalidConfigValueError {
                field: "task.cpu".to_string(),
                value: other.to_string(),
                reason: "Fargate CPU must be one of 256, 512, 1024, 2048, 4096, 8192, 16384"
                    .to_string(),
            })
        }
    };
    validate_one_of("task.memory_mib", memory_mib, &allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = StackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cluster.name, "bastion-cluster");
        assert_eq!(config.service.name, "bastion-service");
        assert_eq!(config.network.subnets.len(), 3);
        assert_eq!(config.database.port, 3306);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = StackConfig::from_toml_str("").unwrap();
        assert_eq!(config, StackConfig::default());
    }

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
[stack]
name = "StagingBastion"

[network]
vpc_cidr = "172.16.0.0/16"
max_azs = 3
nat_gateways = 2

[[network.subnets]]
name = "Ingress"
kind = "PUBLIC"
cidr_mask = 26

[[network.subnets]]
name = "App"
kind = "PRIVATE_WITH_EGRESS"
cidr_mask = 22

[[network.subnets]]
name = "Data"
kind = "PRIVATE_ISOLATED"
cidr_mask = 24

[task]
cpu = 512
memory_mib = 1024
"#;

        let config = StackConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.stack.name, "StagingBastion");
        assert_eq!(config.network.max_azs, 3);
        assert_eq!(config.network.subnets[1].kind, SubnetKind::PrivateWithEgress);
        assert_eq!(config.task.cpu, 512);
        assert_eq!(config.task.image, "amazonlinux:2");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("BASTION_TEST_CLUSTER", "staging-cluster");

        let toml_content = r#"
[cluster]
name = "${BASTION_TEST_CLUSTER}"

[service]
name = "${BASTION_TEST_UNSET_SERVICE}"
"#;

        let config = StackConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.cluster.name, "staging-cluster");
        assert_eq!(config.service.name, "${BASTION_TEST_UNSET_SERVICE}");

        std::env::remove_var("BASTION_TEST_CLUSTER");
    }

    #[test]
    fn test_invalid_fargate_size() {
        let mut config = StackConfig::default();
        config.task.memory_mib = 4096;
        assert!(config.validate().is_err());
        assert!(validate_fargate_size(300, 512).is_err());
        assert!(validate_fargate_size(4096, 30720).is_ok());
    }

    #[test]
    fn test_network_validation() {
        let mut config = StackConfig::default();
        config.network.nat_gateways = 0;
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.network.max_azs = 1;
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.network.subnets[2].name = "Public".to_string();
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.network.vpc_cidr = "10.0.0.0/8".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_isolated_subnets_optional_without_database() {
        let mut config = StackConfig::default();
        config.network.subnets.pop();
        assert!(config.validate().is_err());

        config.database.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_retention() {
        let mut config = StackConfig::default();
        config.task.log_retention_days = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_subnet_kind_fails_parsing() {
        let toml_content = r#"
[[network.subnets]]
name = "Odd"
kind = "DMZ"
cidr_mask = 24
"#;
        assert!(StackConfig::from_toml_str(toml_content).is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[database]\ndatabase_name = \"appdb\"\n")
            .unwrap();

        let config = StackConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.database.database_name, "appdb");
        assert_eq!(config.database.master_username, "admin");
    }
}
