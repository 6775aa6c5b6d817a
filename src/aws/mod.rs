// Adapters for AWS: the ECS API for task discovery and the `aws` CLI for sessions.

pub mod ecs;
pub mod session;

pub use ecs::EcsTaskDiscovery;
pub use session::AwsCliSession;
