//! Duplicate-destination check for pre-aggregated input.

use std::collections::HashSet;

use contracts::{BatchSet, ContractError};
use tracing::debug;

/// Reject a batch set in which two batches share a destination
///
/// Walks batches in order and reports the first repeated destination.
pub fn validate_no_duplicate_destinations(batch_set: &BatchSet) -> Result<(), ContractError> {
    let mut seen = HashSet::with_capacity(batch_set.len());
    for batch in &batch_set.batches {
        if !seen.insert(batch.destination.as_str()) {
            debug!(destination = %batch.destination, "duplicate destination in batch set");
            metrics::counter!("relay_duplicate_destination_total").increment(1);
            return Err(ContractError::duplicate_destination(&batch.destination));
        }
    }
    Ok(())
}
