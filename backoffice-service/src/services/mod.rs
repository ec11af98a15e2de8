//! Services module for backoffice-service.

pub mod backoffice;
pub mod demo;
pub mod fares;
pub mod ids;
pub mod metrics;
pub mod numbering;
pub mod reports;
pub mod workflow;
pub mod zatca;

pub use backoffice::{BackOffice, SubmitOutcome, WorkflowSettings};
pub use demo::seed_demo_data;
pub use metrics::{get_metrics, init_metrics, record_error, record_rpc_request};
