//! CLI domain: parse, route, output and presentation only.
//! Report execution lives in the library; handlers stay thin.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, ListFormat, RunFormat};
pub use presentation::{
    format_report_list_json, format_report_list_text, format_run_status, format_validation_result,
};
pub use route::{CommandOutcome, RunContext};
