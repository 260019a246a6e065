//! Mock message source
//!
//! Generates messages round-robin over a destination list, for demos and
//! tests without a real producer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use contracts::Message;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::intake::MessageIntake;

/// Mock source configuration
#[derive(Debug, Clone)]
pub struct MockSourceConfig {
    /// Source name (used in message text and logs)
    pub name: String,

    /// Destinations cycled through in order
    pub destinations: Vec<String>,

    /// Messages per second
    pub rate_hz: f64,

    /// Stop after this many messages (None = until stopped)
    pub limit: Option<u64>,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            destinations: vec!["compliance".to_string(), "audit".to_string()],
            rate_hz: 10.0,
            limit: None,
        }
    }
}

/// Mock message source
pub struct MockMessageSource {
    config: MockSourceConfig,
    running: Arc<AtomicBool>,
}

impl MockMessageSource {
    pub fn new(config: MockSourceConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start producing into `intake`; the handle resolves to the number of messages accepted
    pub fn start<I: MessageIntake + 'static>(&self, intake: Arc<I>) -> JoinHandle<u64> {
        let config = self.config.clone();
        let running = self.running.clone();

        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let interval = Duration::from_secs_f64(1.0 / config.rate_hz.max(f64::EPSILON));
            let mut sent: u64 = 0;
            let mut attempts: u64 = 0;

            debug!(
                source = %config.name,
                destinations = config.destinations.len(),
                rate_hz = config.rate_hz,
                "mock message source started"
            );

            while running.load(Ordering::Relaxed) && !config.destinations.is_empty() {
                if config.limit.is_some_and(|limit| attempts >= limit) {
                    break;
                }

                let destination =
                    &config.destinations[(attempts as usize) % config.destinations.len()];
                let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                let message = Message::new(
                    destination.clone(),
                    format!("{} event #{}", config.name, attempts + 1),
                    timestamp,
                );
                attempts += 1;

                match intake.accept(message) {
                    Ok(()) => {
                        sent += 1;
                        trace!(source = %config.name, destination = %destination, sent, "mock message sent");
                    }
                    Err(e) => warn!(source = %config.name, error = %e, "mock message rejected"),
                }

                tokio::time::sleep(interval).await;
            }

            running.store(false, Ordering::SeqCst);
            debug!(source = %config.name, sent, "mock message source stopped");
            sent
        })
    }

    /// Stop producing
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check whether the source is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
