//! `run` command implementation.

use anyhow::{Context, Result};
use ingestion::MockSourceConfig;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::config::{apply_overrides, load_blueprint};
use crate::pipeline::{InputSource, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    // Load and validate configuration
    let mut blueprint = load_blueprint(args.config.as_deref())?;
    apply_overrides(&mut blueprint, args.interval_ms, args.timeout_ms)?;

    info!(
        interval_ms = blueprint.scheduler.interval_ms,
        timeout_ms = blueprint.dispatch.timeout_ms,
        sinks = blueprint.sinks.len(),
        delivery_sinks = blueprint.delivery_sinks.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let input = if args.mock {
        InputSource::Mock(MockSourceConfig {
            destinations: args.mock_destinations.clone(),
            rate_hz: args.mock_rate,
            limit: (args.mock_limit > 0).then_some(args.mock_limit),
            ..Default::default()
        })
    } else {
        match args.input.as_deref() {
            Some(path) if path == Path::new("-") => InputSource::Stdin,
            Some(path) => InputSource::File(path.to_path_buf()),
            None => InputSource::Idle,
        }
    };

    let drain = blueprint.scheduler.drain_on_shutdown && !args.no_drain;
    let pipeline_config = PipelineConfig {
        blueprint,
        input,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        drain,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    info!("Starting relay...");
    let stats = Pipeline::new(pipeline_config)
        .run()
        .await
        .context("Relay execution failed")?;

    info!(
        messages = stats.messages_ingested,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Relay completed"
    );

    stats.print_summary();
    Ok(())
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::RelayBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Scheduler:");
    println!("  Interval: {} ms", blueprint.scheduler.interval_ms);
    println!("  Drain on shutdown: {}", blueprint.scheduler.drain_on_shutdown);
    println!("\nDispatch:");
    println!("  Timeout: {} ms", blueprint.dispatch.timeout_ms);

    println!("\nSinks ({}):", blueprint.sinks.len());
    for sink in &blueprint.sinks {
        println!("  - {} ({:?})", sink.name, sink.sink_type);
    }

    println!("\nDelivery sinks ({}):", blueprint.delivery_sinks.len());
    for sink in &blueprint.delivery_sinks {
        println!("  - {} ({:?})", sink.name, sink.sink_type);
    }

    println!();
}
