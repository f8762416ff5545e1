//! service-core: Shared infrastructure for the billing workspace.
pub mod config;
pub mod error;
pub mod observability;

pub use serde;
pub use tracing;
