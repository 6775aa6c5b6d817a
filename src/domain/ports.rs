use crate::domain::model::{SessionOutcome, SessionRequest};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Read-only lookups against the container orchestrator.
#[async_trait]
pub trait TaskDiscovery: Send + Sync {
    /// ARNs of the service's tasks whose desired status is RUNNING.
    async fn list_running_tasks(&self, cluster: &str, service: &str) -> Result<Vec<String>>;

    /// Runtime IDs of the task's containers, in task-definition order.
    /// An empty list means the task has no container details.
    async fn container_runtime_ids(&self, cluster: &str, task_arn: &str)
        -> Result<Vec<Option<String>>>;
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, request: &SessionRequest) -> Result<SessionOutcome>;
}
