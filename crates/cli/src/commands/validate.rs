//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{RelayBlueprint, SinkType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    interval_ms: u64,
    timeout_ms: u64,
    sink_count: usize,
    delivery_sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    interval_ms: blueprint.scheduler.interval_ms,
                    timeout_ms: blueprint.dispatch.timeout_ms,
                    sink_count: blueprint.sinks.len(),
                    delivery_sink_count: blueprint.delivery_sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &RelayBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - every non-empty flush cycle will fail".to_string());
    }

    if blueprint.delivery_sinks.is_empty() {
        warnings.push("No delivery sinks configured - submitted batches go nowhere".to_string());
    }

    if blueprint.dispatch.timeout_ms >= blueprint.scheduler.interval_ms {
        warnings.push(format!(
            "dispatch.timeout_ms ({}) is not shorter than scheduler.interval_ms ({}) - slow sinks will delay flush cycles",
            blueprint.dispatch.timeout_ms, blueprint.scheduler.interval_ms
        ));
    }

    if !blueprint
        .sinks
        .iter()
        .any(|s| s.sink_type != SinkType::Log)
        && !blueprint.sinks.is_empty()
    {
        warnings.push("Only log sinks configured - batch sets are not persisted".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Flush interval: {} ms", summary.interval_ms);
            println!("  Dispatch timeout: {} ms", summary.timeout_ms);
            println!("  Sinks: {}", summary.sink_count);
            println!("  Delivery sinks: {}", summary.delivery_sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blueprint_warnings() {
        let warnings = collect_warnings(&RelayBlueprint::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Only log sinks"));
    }

    #[test]
    fn test_empty_sinks_warning() {
        let mut blueprint = RelayBlueprint::default();
        blueprint.sinks.clear();
        let warnings = collect_warnings(&blueprint);
        assert!(warnings.iter().any(|w| w.contains("No sinks configured")));
    }

    #[test]
    fn test_slow_timeout_warning() {
        let mut blueprint = RelayBlueprint::default();
        blueprint.dispatch.timeout_ms = blueprint.scheduler.interval_ms;
        let warnings = collect_warnings(&blueprint);
        assert!(warnings.iter().any(|w| w.contains("dispatch.timeout_ms")));
    }
}
