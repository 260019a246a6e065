//! Configuration validation
//!
//! Rules:
//! - scheduler.interval_ms > 0
//! - dispatch.timeout_ms > 0
//! - sink names non-empty and unique within each list
//! - required sink params present
//! - http endpoints are absolute http(s) URLs

use std::collections::HashSet;

use contracts::{ContractError, RelayBlueprint, SinkConfig, SinkType};

/// Validate a RelayBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    validate_scheduler(blueprint)?;
    validate_dispatch(blueprint)?;
    validate_sinks("sinks", &blueprint.sinks)?;
    validate_sinks("delivery_sinks", &blueprint.delivery_sinks)?;
    Ok(())
}

fn validate_scheduler(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    if blueprint.scheduler.interval_ms == 0 {
        return Err(ContractError::config_validation(
            "scheduler.interval_ms",
            "interval_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_dispatch(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    if blueprint.dispatch.timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "dispatch.timeout_ms",
            "timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// Validate one list of sink configs
fn validate_sinks(section: &str, sinks: &[SinkConfig]) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("{section}[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("{section}[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("{section}[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
        for param in sink.sink_type.required_params() {
            if sink.params.get(*param).is_none_or(|v| v.is_empty()) {
                return Err(ContractError::config_validation(
                    format!("{section}[{}].params.{param}", sink.name),
                    format!("missing required parameter '{param}'"),
                ));
            }
        }
        if sink.sink_type == SinkType::Http {
            validate_endpoint(section, sink)?;
        }
    }
    Ok(())
}

fn validate_endpoint(section: &str, sink: &SinkConfig) -> Result<(), ContractError> {
    let field = format!("{section}[{}].params.endpoint", sink.name);
    let raw = sink.params.get("endpoint").map(String::as_str).unwrap_or_default();
    let parsed = url::Url::parse(raw)
        .map_err(|e| ContractError::config_validation(&field, format!("invalid url: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ContractError::config_validation(
            field,
            format!("unsupported scheme '{other}'"),
        )),
    }
}
