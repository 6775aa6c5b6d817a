use crate::domain::ports::TaskDiscovery;
use crate::utils::error::{BastionError, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ecs::config::Region;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::types::DesiredStatus;
use aws_sdk_ecs::Client as EcsClient;

#[derive(Debug, Clone)]
pub struct EcsTaskDiscovery {
    client: EcsClient,
}

impl EcsTaskDiscovery {
    pub fn new(client: EcsClient) -> Self {
        Self { client }
    }

    /// Client for `region` using the default credential chain.
    pub async fn for_region(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::new(EcsClient::new(&config))
    }
}

fn ecs_error(operation: &str, err: impl std::error::Error) -> BastionError {
    BastionError::EcsError {
        operation: operation.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl TaskDiscovery for EcsTaskDiscovery {
    async fn list_running_tasks(&self, cluster: &str, service: &str) -> Result<Vec<String>> {
        let resp = self
            .client
            .list_tasks()
            .cluster(cluster)
            .service_name(service)
            .desired_status(DesiredStatus::Running)
            .send()
            .await
            .map_err(|e| ecs_error("ListTasks", e))?;

        tracing::debug!(
            "ListTasks returned {} task(s) for {}/{}",
            resp.task_arns().len(),
            cluster,
            service
        );
        Ok(resp.task_arns().to_vec())
    }

    async fn container_runtime_ids(
        &self,
        cluster: &str,
        task_arn: &str,
    ) -> Result<Vec<Option<String>>> {
        let resp = self
            .client
            .describe_tasks()
            .cluster(cluster)
            .tasks(task_arn)
            .send()
            .await
            .map_err(|e| ecs_error("DescribeTasks", e))?;

        for failure in resp.failures() {
            tracing::warn!(
                "DescribeTasks failure for {}: {}",
                failure.arn().unwrap_or(task_arn),
                failure.reason().unwrap_or("unknown reason")
            );
        }

        let runtime_ids = resp
            .tasks()
            .first()
            .map(|task| {
                task.containers()
                    .iter()
                    .map(|c| c.runtime_id().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(runtime_ids)
    }
}
