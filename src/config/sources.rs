//! File and environment sources layered over the defaults.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MAIN_FILE_NAME: &str = "queryhub.toml";
pub const ENVIRONMENT_VAR: &str = "QUERYHUB_ENV";
pub const ENV_PREFIX: &str = "QUERYHUB";

/// Path of the main config file inside `config_dir`.
pub fn main_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(MAIN_FILE_NAME)
}

/// Add the main config file.
///
/// An explicit file must exist; the default `queryhub.toml` is optional.
pub fn add_main_file(
    builder: ConfigBuilder<DefaultState>,
    config_dir: &Path,
    explicit: Option<&Path>,
) -> ConfigBuilder<DefaultState> {
    match explicit {
        Some(path) => {
            debug!(config_path = %path.display(), "Using explicit config file");
            builder.add_source(File::from(path).required(true))
        }
        None => {
            let path = main_file_path(config_dir);
            debug!(config_path = %path.display(), exists = path.exists(), "Using default config file");
            builder.add_source(File::from(path.as_path()).required(false))
        }
    }
}

/// Add `queryhub.{environment}.toml` when an environment name is given.
pub fn add_environment_overlay(
    builder: ConfigBuilder<DefaultState>,
    config_dir: &Path,
    environment: Option<&str>,
) -> ConfigBuilder<DefaultState> {
    let Some(environment) = environment.filter(|e| !e.trim().is_empty()) else {
        return builder;
    };
    let path = config_dir.join(format!("queryhub.{}.toml", environment));
    debug!(config_path = %path.display(), environment, "Adding environment overlay");
    builder.add_source(File::from(path.as_path()).required(false))
}

/// Add `QUERYHUB__SECTION__KEY=value` overrides.
pub fn add_environment_overrides(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
