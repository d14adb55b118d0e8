//! Execution engine
//!
//! The component executor runs one component under retry and timeout policy;
//! the report executor fans a report's components out concurrently and folds
//! their outcomes back into one ordered result.

pub mod component;
pub mod report;

pub use component::{ComponentExecutionResult, ComponentExecutor, ComponentOutcome};
pub use report::{
    ComponentSummary, ReportExecutionResult, ReportExecutor, ReportMetadata, ReportSummary,
    RunPhase,
};
