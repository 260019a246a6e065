//! # Integration Tests
//!
//! Cross-crate tests for the relay:
//! - wire format and config contract checks
//! - queue -> scheduler -> dispatcher -> sink runs with real sinks
//! - direct batch submission through the relay service

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Batch, BatchMessage, BatchSet, SinkType};

    #[test]
    fn test_wire_format() {
        let set = BatchSet::new(vec![Batch {
            destination: "compliance".to_string(),
            messages: vec![BatchMessage::new("event", "2021-01-01T12:00:00.000Z")],
        }]);

        let body = dispatcher::encode_body(&set).unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"batches":[{"destination":"compliance","messages":[{"text":"event","timestamp":"2021-01-01T12:00:00.000Z"}]}]}"#
        );
    }

    #[test]
    fn test_blueprint_from_toml() {
        let content = r#"
[scheduler]
interval_ms = 250

[[sinks]]
name = "out"
sink_type = "file"
[sinks.params]
path = "/tmp/relay-out.jsonl"
"#;
        let bp = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.scheduler.interval_ms, 250);
        assert_eq!(bp.dispatch.timeout_ms, 5_000);
        assert_eq!(bp.sinks.len(), 1);
        assert_eq!(bp.sinks[0].sink_type, SinkType::File);
        assert_eq!(bp.sinks[0].queue_capacity, 16);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Batch, BatchMessage, BatchSet, ErrorKind, Message, RelayBlueprint};
    use dispatcher::create_dispatcher;
    use ingestion::MessageQueue;
    use relay::RelayService;
    use scheduler::{BatchScheduler, FlushOutcome};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn file_blueprint(out: &Path, interval_ms: u64) -> RelayBlueprint {
        let content = format!(
            r#"
[scheduler]
interval_ms = {interval_ms}

[dispatch]
timeout_ms = 1000

[[sinks]]
name = "out"
sink_type = "file"
[sinks.params]
path = "{}"
"#,
            out.display()
        );
        ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap()
    }

    fn read_batch_sets(out: &Path) -> Vec<BatchSet> {
        std::fs::read_to_string(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Many producers racing a draining consumer: nothing lost, nothing
    /// taken twice, and each producer's messages stay in order.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_append_and_take_all() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 500;

        let queue = Arc::new(MessageQueue::new());

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    for n in 0..PER_PRODUCER {
                        queue.append(Message::new(format!("p{p}"), format!("{n}"), "t"));
                        if n % 50 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut taken = Vec::new();
                for _ in 0..200 {
                    taken.extend(queue.take_all());
                    tokio::task::yield_now().await;
                }
                taken
            })
        };

        for producer in producers {
            producer.await.unwrap();
        }
        let mut taken = consumer.await.unwrap();
        taken.extend(queue.take_all());

        assert_eq!(taken.len(), PRODUCERS * PER_PRODUCER);
        let unique: HashSet<_> = taken.iter().collect();
        assert_eq!(unique.len(), taken.len());

        for p in 0..PRODUCERS {
            let destination = format!("p{p}");
            let sequence: Vec<usize> = taken
                .iter()
                .filter(|m| m.destination == destination)
                .map(|m| m.text.parse().unwrap())
                .collect();
            assert_eq!(sequence, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
        assert!(queue.is_empty());
    }

    /// Config -> dispatcher -> scheduler -> file sink, one manual flush
    #[tokio::test]
    async fn test_flush_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out/batches.jsonl");
        let bp = file_blueprint(&out, 60_000);

        let dispatcher = Arc::new(create_dispatcher(bp.sinks.clone(), &bp.dispatch).await.unwrap());
        let queue = Arc::new(MessageQueue::new());
        let scheduler = BatchScheduler::new(Arc::clone(&queue), Arc::clone(&dispatcher), bp.scheduler);

        queue.append(Message::new("a", "x", "t1"));
        queue.append(Message::new("b", "y", "t2"));
        queue.append(Message::new("a", "z", "t3"));

        let outcome = scheduler.flush_once().await;
        assert!(matches!(outcome, FlushOutcome::Dispatched(_)));
        assert_eq!(outcome.messages(), 3);
        assert!(matches!(scheduler.flush_once().await, FlushOutcome::Empty));

        drop(scheduler);
        Arc::try_unwrap(dispatcher).ok().unwrap().shutdown().await;

        let sets = read_batch_sets(&out);
        assert_eq!(sets.len(), 1);
        assert_eq!(
            sets[0],
            BatchSet::new(vec![
                Batch {
                    destination: "a".to_string(),
                    messages: vec![BatchMessage::new("x", "t1"), BatchMessage::new("z", "t3")],
                },
                Batch {
                    destination: "b".to_string(),
                    messages: vec![BatchMessage::new("y", "t2")],
                },
            ])
        );
    }

    /// Timer loop with producers running, then a draining shutdown.
    /// Every appended message ends up in exactly one written batch set.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_timer_loop_delivers_everything() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("batches.jsonl");
        let bp = file_blueprint(&out, 10);

        let dispatcher = Arc::new(create_dispatcher(bp.sinks.clone(), &bp.dispatch).await.unwrap());
        let queue = Arc::new(MessageQueue::new());
        let scheduler = BatchScheduler::new(Arc::clone(&queue), Arc::clone(&dispatcher), bp.scheduler);
        let handle = scheduler.spawn();

        let producers: Vec<_> = ["compliance", "audit", "billing"]
            .into_iter()
            .map(|destination| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    for n in 0..100 {
                        queue.append(Message::new(destination, format!("{n}"), "t"));
                        if n % 10 == 0 {
                            tokio::time::sleep(Duration::from_millis(2)).await;
                        }
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }

        let report = handle.shutdown_with_drain(true).await;
        assert!(report.drain.is_some());
        assert!(queue.is_empty());

        drop(scheduler);
        Arc::try_unwrap(dispatcher).ok().unwrap().shutdown().await;

        let sets = read_batch_sets(&out);
        let mut per_destination: std::collections::HashMap<String, Vec<usize>> = Default::default();
        for set in &sets {
            let mut seen = HashSet::new();
            for batch in &set.batches {
                assert!(seen.insert(batch.destination.clone()), "destination repeated in one set");
                per_destination
                    .entry(batch.destination.clone())
                    .or_default()
                    .extend(batch.messages.iter().map(|m| m.text.parse::<usize>().unwrap()));
            }
        }

        assert_eq!(per_destination.len(), 3);
        for sequence in per_destination.values() {
            assert_eq!(*sequence, (0..100).collect::<Vec<_>>());
        }
    }

    /// A scheduled flush POSTs the grouped wire body to an HTTP sink
    #[tokio::test]
    async fn test_flush_to_http_sink() {
        let server = MockServer::start().await;
        let expected = serde_json::json!({
            "batches": [
                {"destination": "compliance", "messages": [
                    {"text": "first", "timestamp": "2021-01-01T12:00:00.000Z"},
                    {"text": "second", "timestamp": "2021-01-01T12:00:01.000Z"}
                ]}
            ]
        });
        Mock::given(method("POST"))
            .and(path("/aggregated-messages"))
            .and(body_json(&expected))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let content = format!(
            r#"
[[sinks]]
name = "forward"
sink_type = "http"
[sinks.params]
endpoint = "{}/aggregated-messages"
"#,
            server.uri()
        );
        let bp = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();
        let dispatcher = Arc::new(create_dispatcher(bp.sinks.clone(), &bp.dispatch).await.unwrap());
        let queue = Arc::new(MessageQueue::new());
        let scheduler = BatchScheduler::new(Arc::clone(&queue), dispatcher, bp.scheduler);

        queue.append(Message::new("compliance", "first", "2021-01-01T12:00:00.000Z"));
        queue.append(Message::new("compliance", "second", "2021-01-01T12:00:01.000Z"));

        let outcome = scheduler.flush_once().await;
        assert!(matches!(outcome, FlushOutcome::Dispatched(_)), "{outcome:?}");
    }

    /// Out of the box, flush output goes to a log sink; with no sinks at all
    /// the cycle fails instead of claiming delivery
    #[tokio::test]
    async fn test_default_blueprint_flush_is_delivered() {
        let bp = RelayBlueprint::default();
        let dispatcher = Arc::new(create_dispatcher(bp.sinks.clone(), &bp.dispatch).await.unwrap());
        let queue = Arc::new(MessageQueue::new());
        let scheduler = BatchScheduler::new(Arc::clone(&queue), dispatcher, bp.scheduler.clone());

        queue.append(Message::new("compliance", "event", "t1"));
        match scheduler.flush_once().await {
            FlushOutcome::Dispatched(report) => assert_eq!(report.sinks, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let no_sinks = Arc::new(create_dispatcher(Vec::new(), &bp.dispatch).await.unwrap());
        let scheduler = BatchScheduler::new(Arc::clone(&queue), no_sinks, bp.scheduler);

        queue.append(Message::new("compliance", "event", "t2"));
        let outcome = scheduler.flush_once().await;
        assert!(
            matches!(
                outcome,
                FlushOutcome::Failed {
                    messages: 1,
                    kind: ErrorKind::DeliveryFailure,
                    ..
                }
            ),
            "{outcome:?}"
        );
    }

    /// A failing endpoint drops the cycle's batch set instead of requeueing it
    #[tokio::test]
    async fn test_failed_flush_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let content = format!(
            r#"
[[sinks]]
name = "forward"
sink_type = "http"
[sinks.params]
endpoint = "{}/aggregated-messages"
"#,
            server.uri()
        );
        let bp = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();
        let dispatcher = Arc::new(create_dispatcher(bp.sinks.clone(), &bp.dispatch).await.unwrap());
        let queue = Arc::new(MessageQueue::new());
        let scheduler = BatchScheduler::new(Arc::clone(&queue), dispatcher, bp.scheduler);

        queue.append(Message::new("compliance", "event", "t1"));

        let outcome = scheduler.flush_once().await;
        assert!(matches!(outcome, FlushOutcome::Failed { messages: 1, .. }), "{outcome:?}");
        assert!(queue.is_empty());
        assert!(matches!(scheduler.flush_once().await, FlushOutcome::Empty));
    }

    /// Direct submission: a duplicate destination forwards nothing,
    /// a valid set is written as one line.
    #[tokio::test]
    async fn test_submit_batches_through_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("delivered.jsonl");
        let bp = file_blueprint(&out, 60_000);

        let delivery = Arc::new(create_dispatcher(bp.sinks.clone(), &bp.dispatch).await.unwrap());
        let service = RelayService::new(Arc::new(MessageQueue::new()), Arc::clone(&delivery));

        let duplicate = r#"{"batches":[
            {"destination":"a","messages":[{"text":"x","timestamp":"t1"}]},
            {"destination":"a","messages":[{"text":"y","timestamp":"t2"}]}
        ]}"#;
        let err = service.submit_batches_json(duplicate).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let valid = r#"{"batches":[
            {"destination":"a","messages":[{"text":"x","timestamp":"t1"}]},
            {"destination":"b","messages":[{"text":"y","timestamp":"t2"}]}
        ]}"#;
        let report = service.submit_batches_json(valid).await.unwrap();
        assert_eq!(report.batches, 2);
        assert_eq!(report.messages, 2);

        drop(service);
        Arc::try_unwrap(delivery).ok().unwrap().shutdown().await;

        let sets = read_batch_sets(&out);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].get("a").unwrap().messages[0].text, "x");
        assert_eq!(sets[0].get("b").unwrap().messages[0].text, "y");
    }
}
