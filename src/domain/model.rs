use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_REGION: &str = "ap-northeast-1";
pub const PORT_FORWARD_DOCUMENT: &str = "AWS-StartPortForwardingSessionToRemoteHost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortForwardOptions {
    pub cluster_name: String,
    pub service_name: String,
    pub remote_host: String,
    pub remote_port: u16,
    pub local_port: u16,
    pub region: Option<String>,
}

impl PortForwardOptions {
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn parameters(&self) -> PortForwardParameters {
        PortForwardParameters::new(&self.remote_host, self.remote_port, self.local_port)
    }
}

/// Session Manager target for an ECS container: `ecs:<cluster>_<task id>_<runtime id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsmTarget {
    pub cluster: String,
    pub task_id: String,
    pub runtime_id: String,
}

impl SsmTarget {
    pub fn new(cluster: &str, task_arn: &str, runtime_id: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            task_id: task_id_from_arn(task_arn).to_string(),
            runtime_id: runtime_id.to_string(),
        }
    }
}

impl fmt::Display for SsmTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ecs:{}_{}_{}", self.cluster, self.task_id, self.runtime_id)
    }
}

/// Last `/` segment of a task ARN, or the whole input when it has none.
pub fn task_id_from_arn(task_arn: &str) -> &str {
    task_arn.rsplit('/').next().unwrap_or(task_arn)
}

/// Parameters of the port forwarding document. Every value is a
/// one-element list of strings, as Session Manager documents expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortForwardParameters {
    pub host: Vec<String>,
    #[serde(rename = "portNumber")]
    pub port_number: Vec<String>,
    #[serde(rename = "localPortNumber")]
    pub local_port_number: Vec<String>,
}

impl PortForwardParameters {
    /// Bracketed IPv6 literals are unwrapped; the document wants a bare address.
    pub fn new(host: &str, port: u16, local_port: u16) -> Self {
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        Self {
            host: vec![host.to_string()],
            port_number: vec![port.to_string()],
            local_port_number: vec![local_port.to_string()],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub target: SsmTarget,
    pub document_name: String,
    pub parameters: String,
}

impl SessionRequest {
    pub fn port_forward(target: SsmTarget, parameters: &PortForwardParameters) -> serde_json::Result<Self> {
        Ok(Self {
            target,
            document_name: PORT_FORWARD_DOCUMENT.to_string(),
            parameters: parameters.to_json()?,
        })
    }

    /// Arguments passed to the `aws` executable.
    pub fn cli_args(&self) -> Vec<String> {
        vec![
            "ssm".to_string(),
            "start-session".to_string(),
            "--target".to_string(),
            self.target.to_string(),
            "--document-name".to_string(),
            self.document_name.clone(),
            "--parameters".to_string(),
            self.parameters.clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub exit_code: Option<i32>,
    pub interrupted: bool,
}

impl SessionOutcome {
    /// A session the user stopped with Ctrl+C counts as a clean end.
    pub fn is_success(&self) -> bool {
        self.interrupted || self.exit_code == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssm_target_from_task_arn() {
        let target = SsmTarget::new(
            "bastion-cluster",
            "arn:aws:ecs:ap-northeast-1:123456789012:task/bastion-cluster/0123456789abcdef0123456789abcdef",
            "0123456789abcdef0123456789abcdef-1234567890",
        );
        assert_eq!(
            target.to_string(),
            "ecs:bastion-cluster_0123456789abcdef0123456789abcdef_0123456789abcdef0123456789abcdef-1234567890"
        );
    }

    #[test]
    fn test_task_id_without_slash() {
        assert_eq!(task_id_from_arn("abc123"), "abc123");
        assert_eq!(task_id_from_arn("task/abc123"), "abc123");
    }

    #[test]
    fn test_parameters_json_layout() {
        let json = PortForwardParameters::new("mydb.example.com", 3306, 13306)
            .to_json()
            .unwrap();
        assert_eq!(
            json,
            r#"{"host":["mydb.example.com"],"portNumber":["3306"],"localPortNumber":["13306"]}"#
        );
    }

    #[test]
    fn test_ipv6_host_is_unbracketed() {
        let bracketed = PortForwardParameters::new("[fd00:ec2::23]", 5432, 5432);
        assert_eq!(bracketed.host, vec!["fd00:ec2::23".to_string()]);

        let bare = PortForwardParameters::new("fd00:ec2::23", 5432, 5432);
        assert_eq!(bare, bracketed);
    }

    #[test]
    fn test_default_region() {
        let options = PortForwardOptions {
            cluster_name: "c".to_string(),
            service_name: "s".to_string(),
            remote_host: "h".to_string(),
            remote_port: 1,
            local_port: 2,
            region: None,
        };
        assert_eq!(options.region(), "ap-northeast-1");
    }

    #[test]
    fn test_cli_args_order() {
        let request = SessionRequest::port_forward(
            SsmTarget::new("c", "arn/t", "r"),
            &PortForwardParameters::new("h", 3306, 3306),
        )
        .unwrap();
        let args = request.cli_args();
        assert_eq!(args[0..2], ["ssm", "start-session"]);
        assert_eq!(args[3], "ecs:c_t_r");
        assert_eq!(args[5], PORT_FORWARD_DOCUMENT);
        assert_eq!(args.len(), 8);
    }

    #[test]
    fn test_interrupted_session_is_success() {
        let outcome = SessionOutcome {
            exit_code: Some(130),
            interrupted: true,
        };
        assert!(outcome.is_success());
        assert!(!SessionOutcome {
            exit_code: Some(255),
            interrupted: false
        }
        .is_success());
    }
}
