
    use super::*;
    use crate::testing::{RecordingHandler, ScriptedSource};

    const POLL: Duration = Duration::from_secs(30);

    fn consumer(source: Arc<ScriptedSource>, handler: Arc<RecordingHandler>) -> PullConsumer {
        PullConsumer::new(
            source,
            handler,
            Arc::new(DeliveryStatus::new()),
            &DeliveryConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_retry_batch_scenario() {
        let token = CancellationToken::new();
        let source = Arc::new(
            ScriptedSource::new()
                .fetch(Ok(vec![1, 2, 3]))
                .fetch(Err(SourceError::Transient("connection reset".to_string())))
                .fetch(Ok(vec![4]))
                .cancel_when_idle(token.clone()),
        );
        let handler = Arc::new(RecordingHandler::new());
        let consumer = consumer(source.clone(), handler.clone());
        let status = consumer.status.clone();

        let offset = consumer.run(token).await.unwrap();

        assert_eq!(offset, 5);
        assert_eq!(handler.seen(), vec![1, 2, 3, 4]);
        assert_eq!(status.snapshot().retries, 1);
        assert_eq!(status.offset(), 5);
        assert!(!status.is_pull_running());
        assert_eq!(
            source.fetch_calls(),
            vec![(0, POLL), (4, POLL), (4, POLL), (5, POLL)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_fixed_delay() {
        let token = CancellationToken::new();
        let source = Arc::new(
            ScriptedSource::new()
                .fetch(Err(SourceError::Transient("502".to_string())))
                .cancel_when_idle(token.clone()),
        );
        let consumer = consumer(source, Arc::new(RecordingHandler::new()));

        let started = tokio::time::Instant::now();
        consumer.run(token).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_uses_longer_server_delay() {
        let token = CancellationToken::new();
        let source = Arc::new(
            ScriptedSource::new()
                .fetch(Err(SourceError::Throttled {
                    retry_after: Duration::from_secs(20),
                }))
                .cancel_when_idle(token.clone()),
        );
        let consumer = consumer(source, Arc::new(RecordingHandler::new()));

        let started = tokio::time::Instant::now();
        consumer.run(token).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_timeout_retries_without_delay() {
        let token = CancellationToken::new();
        let source = Arc::new(
            ScriptedSource::new()
                .fetch(Err(SourceError::TimedOut))
                .fetch(Err(SourceError::TimedOut))
                .fetch(Ok(vec![10]))
                .cancel_when_idle(token.clone()),
        );
        let handler = Arc::new(RecordingHandler::new());
        let consumer = consumer(source.clone(), handler.clone());
        let status = consumer.status.clone();

        let offset = consumer.run(token).await.unwrap();

        assert_eq!(offset, 11);
        assert_eq!(handler.seen(), vec![10]);
        assert_eq!(status.snapshot().retries, 2);
        assert_eq!(source.fetch_calls().len(), 4);
    }

    #[tokio::test]
    async fn test_unauthenticated_stops_permanently() {
        let source = Arc::new(
            ScriptedSource::new().fetch(Err(SourceError::Unauthenticated("401".to_string()))),
        );
        let consumer = consumer(source.clone(), Arc::new(RecordingHandler::new()));
        let status = consumer.status.clone();

        let err = consumer.run(CancellationToken::new()).await.unwrap_err();

        assert_eq!(err, DeliveryError::Fatal("401".to_string()));
        assert_eq!(source.fetch_calls().len(), 1);
        assert!(status.stopped_reason().is_some());
        assert!(!status.is_pull_running());
    }

    #[tokio::test]
    async fn test_conflict_stops_without_retry() {
        let source = Arc::new(
            ScriptedSource::new()
                .fetch(Err(SourceError::Conflict("terminated by other getUpdates request".to_string()))),
        );
        let consumer = consumer(source.clone(), Arc::new(RecordingHandler::new()));

        let err = consumer.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Conflict(_)));
        assert_eq!(source.fetch_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_stops_as_configuration() {
        let source = Arc::new(
            ScriptedSource::new().fetch(Err(SourceError::Rejected("bad offset".to_string()))),
        );
        let consumer = consumer(source, Arc::new(RecordingHandler::new()));

        let err = consumer.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_block_offset() {
        let token = CancellationToken::new();
        let source = Arc::new(
            ScriptedSource::new()
                .fetch(Ok(vec![1, 2, 3]))
                .cancel_when_idle(token.clone()),
        );
        let handler = Arc::new(RecordingHandler::failing(&[2]));
        let consumer = consumer(source, handler.clone());
        let status = consumer.status.clone();

        let offset = consumer.run(token).await.unwrap();

        assert_eq!(offset, 4);
        assert_eq!(handler.seen(), vec![1, 2, 3]);
        let snapshot = status.snapshot();
        assert_eq!(snapshot.handler_failures, 1);
        assert_eq!(snapshot.events_dispatched, 2);
    }

    #[tokio::test]
    async fn test_offset_is_monotonic() {
        let token = CancellationToken::new();
        // A replayed lower id must neither be dispatched nor move the offset back.
        let source = Arc::new(
            ScriptedSource::new()
                .fetch(Ok(vec![5, 6]))
                .fetch(Ok(vec![3, 7]))
                .fetch(Ok(vec![]))
                .cancel_when_idle(token.clone()),
        );
        let handler = Arc::new(RecordingHandler::new());
        let consumer = consumer(source.clone(), handler.clone());

        let offset = consumer.run(token).await.unwrap();

        assert_eq!(offset, 8);
        assert_eq!(handler.seen(), vec![5, 6, 7]);
        let offsets: Vec<i64> = source.fetch_calls().iter().map(|(o, _)| *o).collect();
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]), "{:?}", offsets);
    }

    #[tokio::test]
    async fn test_resume_from_offset() {
        let token = CancellationToken::new();
        let source = Arc::new(ScriptedSource::new().cancel_when_idle(token.clone()));
        let consumer = consumer(source.clone(), Arc::new(RecordingHandler::new())).with_offset(42);
        assert_eq!(consumer.offset(), 42);

        consumer.run(token).await.unwrap();
        assert_eq!(source.fetch_calls()[0].0, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_retry_sleep() {
        let token = CancellationToken::new();
        let source = Arc::new(
            ScriptedSource::new().fetch(Err(SourceError::Transient("down".to_string()))),
        );
        let consumer = consumer(source.clone(), Arc::new(RecordingHandler::new()))
            .with_policy(RetryPolicy {
                max_attempts: None,
                base_delay: Duration::from_secs(3600),
                max_delay: Duration::from_secs(3600),
                backoff_multiplier: 1.0,
            });

        let handle = tokio::spawn(consumer.run(token.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();

        let started = tokio::time::Instant::now();
        handle.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(3600));
        assert_eq!(source.fetch_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_replay_after_restart_is_idempotent() {
        // First run dispatches 1..=3 but "crashes" before acknowledging:
        // a second consumer from offset 0 sees the same ids and ends at the same offset.
        let first_token = CancellationToken::new();
        let first = Arc::new(
            ScriptedSource::new()
                .fetch(Ok(vec![1, 2, 3]))
                .cancel_when_idle(first_token.clone()),
        );
        let handler = Arc::new(RecordingHandler::new());
        let offset_a = consumer(first, handler.clone()).run(first_token).await.unwrap();

        let second_token = CancellationToken::new();
        let second = Arc::new(
            ScriptedSource::new()
                .fetch(Ok(vec![1, 2, 3]))
                .cancel_when_idle(second_token.clone()),
        );
        let offset_b = consumer(second, handler.clone()).run(second_token).await.unwrap();

        assert_eq!(offset_a, 4);
        assert_eq!(offset_b, 4);
        assert_eq!(handler.seen(), vec![1, 2, 3, 1, 2, 3]);
    }
