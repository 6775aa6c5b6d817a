use thiserror::Error;

#[derive(Error, Debug)]
pub enum BastionError {
    #[error("No running tasks found for service {service} in cluster {cluster}")]
    NoRunningTasks { cluster: String, service: String },

    #[error("Could not get task details for {task_arn}")]
    TaskDetailsUnavailable { task_arn: String },

    #[error("Could not get runtime ID for {task_arn}")]
    MissingRuntimeId { task_arn: String },

    #[error("ECS {operation} failed: {message}")]
    EcsError { operation: String, message: String },

    #[error("Failed to start session with `{program}`: {source}")]
    SessionSpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Session ended with code: {code:?}")]
    SessionFailedError { code: Option<i32> },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Template error in {logical_id}: {message}")]
    TemplateError { logical_id: String, message: String },

    #[error("Usage error: {message}")]
    UsageError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Discovery,
    Session,
    Configuration,
    Template,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BastionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BastionError::NoRunningTasks { .. }
            | BastionError::TaskDetailsUnavailable { .. }
            | BastionError::MissingRuntimeId { .. }
            | BastionError::EcsError { .. } => ErrorCategory::Discovery,
            BastionError::SessionSpawnError { .. } | BastionError::SessionFailedError { .. } => {
                ErrorCategory::Session
            }
            BastionError::InvalidConfigValueError { .. }
            | BastionError::ConfigValidationError { .. }
            | BastionError::UsageError { .. } => ErrorCategory::Configuration,
            BastionError::TemplateError { .. } | BastionError::SerializationError(_) => {
                ErrorCategory::Template
            }
            BastionError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Discovery => ErrorSeverity::Medium,
            ErrorCategory::Session | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Template | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Every failure of the helper binaries maps to exit status 1.
    pub fn exit_code(&self) -> i32 {
        1
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BastionError::NoRunningTasks { cluster, service } => format!(
                "Service '{}' in cluster '{}' has no running tasks",
                service, cluster
            ),
            BastionError::TaskDetailsUnavailable { .. } => {
                "The running task has no container details yet".to_string()
            }
            BastionError::MissingRuntimeId { .. } => {
                "The task's container has not reported a runtime ID yet".to_string()
            }
            BastionError::EcsError { operation, .. } => {
                format!("Could not query ECS ({})", operation)
            }
            BastionError::SessionSpawnError { program, .. } => {
                format!("Could not run '{}'", program)
            }
            BastionError::SessionFailedError { code } => match code {
                Some(code) => format!("The port forwarding session exited with code {}", code),
                None => "The port forwarding session was terminated by a signal".to_string(),
            },
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BastionError::NoRunningTasks { .. } => {
                "Check the service's desired count and that the cluster and service names are correct"
            }
            BastionError::TaskDetailsUnavailable { .. } | BastionError::MissingRuntimeId { .. } => {
                "Wait until the task reaches RUNNING and try again"
            }
            BastionError::EcsError { .. } => {
                "Check your AWS credentials, region and ecs:ListTasks / ecs:DescribeTasks permissions"
            }
            BastionError::SessionSpawnError { .. } => {
                "Install the AWS CLI v2 and the Session Manager plugin and make sure `aws` is on PATH"
            }
            BastionError::SessionFailedError { .. } => {
                "Check that ECS Exec is enabled on the service and the SSM agent is running in the task"
            }
            BastionError::InvalidConfigValueError { .. }
            | BastionError::ConfigValidationError { .. } => {
                "Fix the configuration value and run again"
            }
            BastionError::UsageError { .. } => "Run with the arguments shown in the usage text",
            BastionError::TemplateError { .. } | BastionError::SerializationError(_) => {
                "This is a bug in the stack declaration; please report it"
            }
            BastionError::IoError(_) => "Check file permissions and free disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, BastionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_errors_are_medium_severity() {
        let err = BastionError::NoRunningTasks {
            cluster: "bastion-cluster".to_string(),
            service: "bastion-service".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Discovery);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "No running tasks found for service bastion-service in cluster bastion-cluster"
        );
    }

    #[test]
    fn test_session_failure_message() {
        let err = BastionError::SessionFailedError { code: Some(255) };
        assert_eq!(err.category(), ErrorCategory::Session);
        assert!(err.user_friendly_message().contains("255"));

        let killed = BastionError::SessionFailedError { code: None };
        assert!(killed.user_friendly_message().contains("signal"));
    }
}
