//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::{RelayBlueprint, SinkConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    scheduler: SchedulerInfo,
    dispatch: DispatchInfo,
    sinks: Vec<SinkInfo>,
    delivery_sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SchedulerInfo {
    interval_ms: u64,
    drain_on_shutdown: bool,
}

#[derive(Serialize)]
struct DispatchInfo {
    timeout_ms: u64,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn sink_info(sink: &SinkConfig, with_params: bool) -> SinkInfo {
    SinkInfo {
        name: sink.name.clone(),
        sink_type: format!("{:?}", sink.sink_type),
        queue_capacity: sink.queue_capacity,
        params: if with_params {
            sink.params.clone()
        } else {
            HashMap::new()
        },
    }
}

fn build_config_info(blueprint: &RelayBlueprint, args: &InfoArgs) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        scheduler: SchedulerInfo {
            interval_ms: blueprint.scheduler.interval_ms,
            drain_on_shutdown: blueprint.scheduler.drain_on_shutdown,
        },
        dispatch: DispatchInfo {
            timeout_ms: blueprint.dispatch.timeout_ms,
        },
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| sink_info(s, args.sinks))
            .collect(),
        delivery_sinks: blueprint
            .delivery_sinks
            .iter()
            .map(|s| sink_info(s, args.sinks))
            .collect(),
    }
}

fn print_sinks(title: &str, sinks: &[SinkConfig], with_params: bool) {
    println!("\n📤 {} ({})", title, sinks.len());
    if sinks.is_empty() {
        println!("   └─ (none)");
        return;
    }

    for (i, sink) in sinks.iter().enumerate() {
        let is_last = i == sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({:?}, queue {})",
            prefix, sink.name, sink.sink_type, sink.queue_capacity
        );

        if with_params {
            let mut params: Vec<_> = sink.params.iter().collect();
            params.sort();
            for (key, value) in params {
                println!("   {}  • {} = {}", child_prefix, key, value);
            }
        }
    }
}

fn print_config_info(blueprint: &RelayBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Batch Relay Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⏱  Scheduler");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Flush interval: {} ms", blueprint.scheduler.interval_ms);
    println!(
        "   └─ Drain on shutdown: {}",
        blueprint.scheduler.drain_on_shutdown
    );

    println!("\n⚙️  Dispatch");
    println!("   └─ Sink timeout: {} ms", blueprint.dispatch.timeout_ms);

    print_sinks("Sinks", &blueprint.sinks, args.sinks);
    print_sinks("Delivery sinks", &blueprint.delivery_sinks, args.sinks);

    println!();
}
