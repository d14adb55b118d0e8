//! QueryHub: Declarative Report Execution
//!
//! Runs the components of a report concurrently against shared, lazily created
//! backend handles, applies per-component retry and timeout policy, and
//! assembles every outcome, failed ones included, into one rendered report.

pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod definition;
pub mod error;
pub mod execution;
pub mod logging;
pub mod pool;
pub mod render;
pub mod resources;
pub mod retry;

pub use app::ApplicationBuilder;
pub use backend::{BackendClient, BackendConfig, BackendRegistry, ProviderResolver, QueryResult};
pub use config::{ConfigLoader, QueryHubConfig};
pub use definition::{ComponentDefinition, RenderSpec, ReportDefinition};
pub use error::{BackendError, ComponentError, ComponentErrorKind, ReleaseError, ReportError};
pub use execution::{ComponentExecutionResult, ComponentExecutor, ReportExecutionResult, ReportExecutor};
pub use retry::{RetryPolicy, RetryStrategy};
