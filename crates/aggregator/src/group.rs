//! Stable partition of messages by destination.

use std::collections::HashMap;

use contracts::{Batch, BatchSet, Message};
use tracing::instrument;

/// Partition messages into one batch per destination
///
/// Batches appear in order of each destination's first message; messages keep
/// their relative order within a batch. Never yields an empty batch.
#[instrument(level = "trace", name = "aggregator_group", skip(messages), fields(messages = messages.len()))]
pub fn group_by_destination(messages: Vec<Message>) -> BatchSet {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut batches: Vec<Batch> = Vec::new();

    for message in messages {
        let (destination, batch_message) = message.into_parts();
        let slot = match index.get(&destination) {
            Some(&slot) => slot,
            None => {
                index.insert(destination.clone(), batches.len());
                batches.push(Batch::new(destination));
                batches.len() - 1
            }
        };
        batches[slot].messages.push(batch_message);
    }

    metrics::histogram!("relay_aggregated_batches").record(batches.len() as f64);
    BatchSet::new(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::BatchMessage;

    #[test]
    fn test_groups_by_destination() {
        let messages = vec![
            Message::new("a", "x", "t1"),
            Message::new("b", "y", "t2"),
            Message::new("a", "z", "t3"),
        ];

        let set = group_by_destination(messages);
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.get("a").unwrap().messages,
            vec![BatchMessage::new("x", "t1"), BatchMessage::new("z", "t3")]
        );
        assert_eq!(
            set.get("b").unwrap().messages,
            vec![BatchMessage::new("y", "t2")]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(group_by_destination(Vec::new()).is_empty());
    }

    #[test]
    fn test_first_appearance_order() {
        let messages = vec![
            Message::new("c", "1", "t"),
            Message::new("a", "2", "t"),
            Message::new("c", "3", "t"),
            Message::new("b", "4", "t"),
        ];
        let set = group_by_destination(messages);
        let order: Vec<_> = set.batches.iter().map(|b| b.destination.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_order_preserved_within_destination() {
        let messages: Vec<_> = (0..100)
            .map(|i| Message::new(if i % 2 == 0 { "even" } else { "odd" }, i.to_string(), "t"))
            .collect();

        let set = group_by_destination(messages);
        let even: Vec<u32> = set
            .get("even")
            .unwrap()
            .messages
            .iter()
            .map(|m| m.text.parse().unwrap())
            .collect();
        assert!(even.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(even.len(), 50);
        assert_eq!(set.message_count(), 100);
    }

    #[test]
    fn test_no_empty_batches_and_unique_destinations() {
        let messages = vec![
            Message::new("a", "1", "t"),
            Message::new("a", "2", "t"),
            Message::new("a", "3", "t"),
        ];
        let set = group_by_destination(messages);
        assert_eq!(set.len(), 1);
        assert!(set.batches.iter().all(|b| !b.is_empty()));
    }
}
