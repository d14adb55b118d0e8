//! Integration tests for the QueryHub report execution engine

mod config_loading;
mod csv_backend;
mod report_execution;
mod test_utils;
