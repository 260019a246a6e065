//! Configuration loading shared by the commands.

use std::path::Path;

use contracts::RelayBlueprint;
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::error::{CliError, Result};

/// Load a blueprint from `path`, or fall back to the built-in defaults
pub fn load_blueprint(path: Option<&Path>) -> Result<RelayBlueprint> {
    let Some(path) = path else {
        info!("No configuration file given, using defaults");
        return Ok(RelayBlueprint::default());
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }

    config_loader::ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config_invalid(format!("{}: {}", path.display(), e)))
}

/// Apply command-line overrides and re-validate
pub fn apply_overrides(
    blueprint: &mut RelayBlueprint,
    interval_ms: Option<u64>,
    timeout_ms: Option<u64>,
) -> Result<()> {
    if let Some(interval_ms) = interval_ms {
        info!(interval_ms, "Overriding flush interval from CLI");
        blueprint.scheduler.interval_ms = interval_ms;
    }
    if let Some(timeout_ms) = timeout_ms {
        info!(timeout_ms, "Overriding dispatch timeout from CLI");
        blueprint.dispatch.timeout_ms = timeout_ms;
    }

    config_loader::ConfigLoader::validate(blueprint)
        .map_err(|e| CliError::config_invalid(e.to_string()))
}

/// Read a whole file, or stdin when `path` is "-"
pub async fn read_to_string(path: &Path) -> Result<String> {
    let display = path.display().to_string();

    if path == Path::new("-") {
        let mut content = String::new();
        tokio::io::stdin()
            .read_to_string(&mut content)
            .await
            .map_err(|e| CliError::input(display, e))?;
        return Ok(content);
    }

    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::input(display, e))
}
