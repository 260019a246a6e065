//! `deliver` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use ingestion::MessageQueue;
use relay::RelayService;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::DeliverArgs;
use crate::config::{apply_overrides, load_blueprint, read_to_string};
use crate::error::CliError;

/// Dispatch report for JSON output
#[derive(Serialize)]
struct DeliveryResult {
    dispatch_id: u64,
    batches: usize,
    messages: usize,
    sinks: usize,
    body_bytes: usize,
}

/// Execute the `deliver` command
pub async fn run_deliver(args: &DeliverArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())?;
    apply_overrides(&mut blueprint, None, args.timeout_ms)?;

    let body = read_to_string(&args.batches).await?;

    let delivery = dispatcher::create_dispatcher(
        blueprint.delivery_sinks.clone(),
        &blueprint.dispatch,
    )
    .await
    .map_err(|e| CliError::startup("delivery dispatcher", e.to_string()))?;
    let delivery = Arc::new(delivery);

    info!(
        sinks = delivery.sink_count(),
        source = %args.batches.display(),
        "Forwarding aggregated batches"
    );

    let service = RelayService::new(Arc::new(MessageQueue::new()), Arc::clone(&delivery));
    let result = service.submit_batches_json(&body).await;
    observability::record_submission("batches", result.is_ok());

    drop(service);
    match Arc::try_unwrap(delivery) {
        Ok(delivery) => delivery.shutdown().await,
        Err(_) => warn!("Delivery dispatcher still referenced, sinks not closed"),
    }

    let report = result
        .map_err(|e| anyhow::anyhow!("{} ({})", e, e.kind()))
        .context("Delivery rejected")?;

    if args.json {
        let output = DeliveryResult {
            dispatch_id: report.dispatch_id,
            batches: report.batches,
            messages: report.messages,
            sinks: report.sinks,
            body_bytes: report.body_bytes,
        };
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialize delivery result")?;
        println!("{}", json);
    } else if report.is_empty() {
        println!("✓ Nothing to deliver (empty batch set)");
    } else {
        println!(
            "✓ Delivered {} batch(es), {} message(s) to {} sink(s)",
            report.batches, report.messages, report.sinks
        );
    }

    Ok(())
}
