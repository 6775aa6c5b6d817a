// Domain layer: value types and ports (interfaces). Nothing here talks to AWS.

pub mod model;
pub mod ports;
