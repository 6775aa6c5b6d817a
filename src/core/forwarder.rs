use crate::domain::model::{PortForwardOptions, SessionOutcome, SessionRequest, SsmTarget};
use crate::domain::ports::{SessionLauncher, TaskDiscovery};
use crate::utils::error::{BastionError, Result};

/// Finds a running task of an ECS service and opens a port forwarding
/// session through it.
pub struct PortForwarder<D: TaskDiscovery, L: SessionLauncher> {
    discovery: D,
    launcher: L,
}

impl<D: TaskDiscovery, L: SessionLauncher> PortForwarder<D, L> {
    pub fn new(discovery: D, launcher: L) -> Self {
        Self {
            discovery,
            launcher,
        }
    }

    /// Resolves the SSM target of the service's first running task.
    pub async fn resolve_target(&self, cluster: &str, service: &str) -> Result<SsmTarget> {
        let task_arns = self.discovery.list_running_tasks(cluster, service).await?;
        let task_arn = task_arns
            .first()
            .ok_or_else(|| BastionError::NoRunningTasks {
                cluster: cluster.to_string(),
                service: service.to_string(),
            })?;
        if task_arns.len() > 1 {
            tracing::debug!(
                "{} running tasks, using {}",
                task_arns.len(),
                task_arn
            );
        }

        let runtime_ids = self
            .discovery
            .container_runtime_ids(cluster, task_arn)
            .await?;
        let runtime_id = match runtime_ids.first() {
            None => {
                return Err(BastionError::TaskDetailsUnavailable {
                    task_arn: task_arn.clone(),
                })
            }
            Some(None) => {
                return Err(BastionError::MissingRuntimeId {
                    task_arn: task_arn.clone(),
                })
            }
            Some(Some(runtime_id)) => runtime_id,
        };

        Ok(SsmTarget::new(cluster, task_arn, runtime_id))
    }

    pub async fn start(&self, options: &PortForwardOptions) -> Result<SessionOutcome> {
        println!("Setting up port forwarding...");
        println!("Remote: {}:{}", options.remote_host, options.remote_port);
        println!("Local: localhost:{}", options.local_port);
        tracing::info!(
            "Port forwarding {}:{} -> localhost:{} via {}/{} in {}",
            options.remote_host,
            options.remote_port,
            options.local_port,
            options.cluster_name,
            options.service_name,
            options.region()
        );

        let target = self
            .resolve_target(&options.cluster_name, &options.service_name)
            .await?;
        println!("SSM Target: {}", target);

        let request = SessionRequest::port_forward(target, &options.parameters())?;

        println!("Starting port forwarding session...");
        println!("Press Ctrl+C to stop");

        self.launcher.launch(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const TASK_ARN: &str =
        "arn:aws:ecs:ap-northeast-1:123456789012:task/bastion-cluster/5f1c2a9e0b8d4e7a9c3b2d1e0f4a5b6c";

    struct FakeDiscovery {
        tasks: Vec<String>,
        runtime_ids: Vec<Option<String>>,
    }

    #[async_trait]
    impl TaskDiscovery for FakeDiscovery {
        async fn list_running_tasks(&self, _cluster: &str, _service: &str) -> Result<Vec<String>> {
            Ok(self.tasks.clone())
        }

        async fn container_runtime_ids(
            &self,
            _cluster: &str,
            _task_arn: &str,
        ) -> Result<Vec<Option<String>>> {
            Ok(self.runtime_ids.clone())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingLauncher {
        requests: Arc<Mutex<Vec<SessionRequest>>>,
    }

    #[async_trait]
    impl SessionLauncher for RecordingLauncher {
        async fn launch(&self, request: &SessionRequest) -> Result<SessionOutcome> {
            self.requests.lock().await.push(request.clone());
            Ok(SessionOutcome {
                exit_code: Some(0),
                interrupted: false,
            })
        }
    }

    fn options() -> PortForwardOptions {
        PortForwardOptions {
            cluster_name: "bastion-cluster".to_string(),
            service_name: "bastion-service".to_string(),
            remote_host: "mydb.cluster-xxx.rds.amazonaws.com".to_string(),
            remote_port: 3306,
            local_port: 13306,
            region: None,
        }
    }

    fn discovery(tasks: &[&str], runtime_ids: Vec<Option<&str>>) -> FakeDiscovery {
        FakeDiscovery {
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
            runtime_ids: runtime_ids
                .into_iter()
                .map(|r| r.map(str::to_string))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_resolve_target_uses_first_task_and_container() {
        let forwarder = PortForwarder::new(
            discovery(&[TASK_ARN, "arn:other/task"], vec![Some("rt-1"), Some("rt-2")]),
            RecordingLauncher::default(),
        );
        let target = forwarder
            .resolve_target("bastion-cluster", "bastion-service")
            .await
            .unwrap();
        assert_eq!(
            target.to_string(),
            "ecs:bastion-cluster_5f1c2a9e0b8d4e7a9c3b2d1e0f4a5b6c_rt-1"
        );
    }

    #[tokio::test]
    async fn test_no_running_tasks() {
        let forwarder = PortForwarder::new(discovery(&[], vec![]), RecordingLauncher::default());
        let err = forwarder
            .resolve_target("bastion-cluster", "bastion-service")
            .await
            .unwrap_err();
        assert!(matches!(err, BastionError::NoRunningTasks { .. }));
    }

    #[tokio::test]
    async fn test_task_without_containers() {
        let forwarder =
            PortForwarder::new(discovery(&[TASK_ARN], vec![]), RecordingLauncher::default());
        let err = forwarder.resolve_target("c", "s").await.unwrap_err();
        assert!(matches!(err, BastionError::TaskDetailsUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_missing_runtime_id_aborts_before_launch() {
        let launcher = RecordingLauncher::default();
        let forwarder = PortForwarder::new(
            discovery(&[TASK_ARN], vec![None, Some("rt-2")]),
            launcher.clone(),
        );
        let err = forwarder.start(&options()).await.unwrap_err();
        assert!(matches!(err, BastionError::MissingRuntimeId { .. }));
        assert!(launcher.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_launches_port_forward_session() {
        let launcher = RecordingLauncher::default();
        let forwarder =
            PortForwarder::new(discovery(&[TASK_ARN], vec![Some("rt-1")]), launcher.clone());

        let outcome = forwarder.start(&options()).await.unwrap();
        assert!(outcome.is_success());

        let requests = launcher.requests.lock().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].document_name,
            "AWS-StartPortForwardingSessionToRemoteHost"
        );
        assert_eq!(
            requests[0].parameters,
            r#"{"host":["mydb.cluster-xxx.rds.amazonaws.com"],"portNumber":["3306"],"localPortNumber":["13306"]}"#
        );
    }
}
