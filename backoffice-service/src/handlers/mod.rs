pub mod health;
pub mod rpc;

pub use health::{health_check, metrics_handler, readiness_check};
pub use rpc::rpc;
