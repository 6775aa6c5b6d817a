pub mod forwarder;

pub use crate::domain::model::{PortForwardOptions, SessionOutcome, SessionRequest, SsmTarget};
pub use crate::domain::ports::{SessionLauncher, Storage, TaskDiscovery};
pub use crate::utils::error::Result;
pub use forwarder::PortForwarder;
