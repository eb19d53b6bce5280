use std::path::Path;

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::config::proc_loader::{file_to_config, parse_config};
use crate::config::settings::FetcherConfig;

/// Load the config at `config_path`.
///
/// A missing file is only tolerated when the path was not given explicitly;
/// built-in defaults are used then.
pub async fn run(config_path: &str, explicit: bool) -> Result<FetcherConfig> {
    let path = Path::new(config_path);
    if !explicit && !path.exists() {
        debug!("config file '{}' not found, using defaults", config_path);
        return parse_config("");
    }
    file_to_config(path)
        .await
        .map_err(|e| anyhow!(format!("Invalid config '{}': {}", config_path, e)))
}
