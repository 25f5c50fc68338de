//! Configuration loading (file layered under `BLUESEC__SECTION__KEY` env vars)

use anyhow::{Context, Result};
use bluesec_core::AppConfig;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "~/.bluesec/config";
const ENV_PREFIX: &str = "BLUESEC";

/// Load and validate the configuration
///
/// An explicit path (flag or `BLUESEC_CONFIG`) must exist; the default
/// `~/.bluesec/config.{yaml,toml,json}` is optional.
pub fn load(explicit: Option<&Path>) -> Result<AppConfig> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => (
            PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).into_owned()),
            false,
        ),
    };
    debug!(path = %path.display(), required, "Loading configuration");

    let name = path.to_string_lossy().into_owned();
    let file = if path.extension().is_some() {
        File::from(path.as_path())
    } else {
        File::with_name(&name)
    };

    let config: AppConfig = Config::builder()
        .add_source(file.required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to read configuration from {name}"))?
        .try_deserialize()
        .context("Invalid configuration")?;

    config.validate()?;
    Ok(config)
}

/// Expand `~` in configured paths
pub fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
