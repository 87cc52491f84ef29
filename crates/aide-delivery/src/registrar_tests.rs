
    use super::*;
    use crate::testing::{Call, RecordingHandler, ScriptedSource};

    const URL: &str = "https://bot.acme.dev/webhook";

    fn registrar(source: Arc<ScriptedSource>, handler: Arc<RecordingHandler>) -> PushRegistrar {
        PushRegistrar::new(
            source,
            handler,
            Arc::new(DeliveryStatus::new()),
            &DeliveryConfig::default(),
        )
    }

    fn transient() -> SourceError {
        SourceError::Transient("connection reset".to_string())
    }

    #[tokio::test]
    async fn test_register_success() {
        let source = Arc::new(ScriptedSource::new());
        let handler = Arc::new(RecordingHandler::new());
        let registrar = registrar(source.clone(), handler);

        let result = registrar.register(URL, &CancellationToken::new()).await;

        assert!(result.success);
        assert_eq!(result.buffered_count, 0);
        assert!(result.error.is_none());
        assert_eq!(
            source.calls(),
            vec![Call::Register(URL.to_string()), Call::Status]
        );
        assert_eq!(registrar.status.registration().unwrap().url, URL);
    }

    #[tokio::test]
    async fn test_invalid_target_makes_no_network_call() {
        let source = Arc::new(ScriptedSource::new());
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));

        let result = registrar
            .register("http://localhost/webhook", &CancellationToken::new())
            .await;

        assert!(!result.success);
        assert!(matches!(result.error, Some(DeliveryError::Configuration(_))));
        assert!(source.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling() {
        let source = Arc::new(
            ScriptedSource::new()
                .register(Err(transient()))
                .register(Err(transient()))
                .register(Err(transient())),
        );
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));

        let started = tokio::time::Instant::now();
        let result = registrar.register(URL, &CancellationToken::new()).await;
        let elapsed = started.elapsed();

        assert!(!result.success);
        assert!(matches!(result.error, Some(DeliveryError::Transient(_))));
        assert_eq!(source.register_calls(), 3);
        assert!(elapsed <= Duration::from_secs(6), "took {:?}", elapsed);
        assert!(elapsed >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_second_attempt() {
        let source = Arc::new(ScriptedSource::new().register(Err(transient())));
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));

        let result = registrar.register(URL, &CancellationToken::new()).await;

        assert!(result.success);
        assert_eq!(source.register_calls(), 2);
        assert_eq!(registrar.status.snapshot().retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_delay_honoured() {
        let source = Arc::new(ScriptedSource::new().register(Err(SourceError::Throttled {
            retry_after: Duration::from_secs(9),
        })));
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));

        let started = tokio::time::Instant::now();
        let result = registrar.register(URL, &CancellationToken::new()).await;

        assert!(result.success);
        assert!(started.elapsed() >= Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_unauthenticated_is_fatal() {
        let source = Arc::new(
            ScriptedSource::new().register(Err(SourceError::Unauthenticated(
                "Unauthorized".to_string(),
            ))),
        );
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));

        let result = registrar.register(URL, &CancellationToken::new()).await;

        assert!(!result.success);
        assert!(result.is_fatal());
        assert_eq!(source.register_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejected_aborts_without_retry() {
        let source = Arc::new(
            ScriptedSource::new()
                .register(Err(SourceError::Rejected("bad webhook".to_string()))),
        );
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));

        let result = registrar.register(URL, &CancellationToken::new()).await;

        assert!(!result.success);
        assert!(!result.is_fatal());
        assert!(matches!(result.error, Some(DeliveryError::Configuration(_))));
        assert_eq!(source.register_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_false_and_mismatch_count_as_failures() {
        let source = Arc::new(
            ScriptedSource::new()
                .register(Ok(false))
                .status(Ok(PushStatus {
                    url: "https://other.acme.dev/webhook".to_string(),
                    ..Default::default()
                }))
                .register(Ok(true))
                .register(Ok(true)),
        );
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));

        let result = registrar.register(URL, &CancellationToken::new()).await;

        // Attempt 1: not accepted. Attempt 2: URL mismatch. Attempt 3: verified.
        assert!(result.success);
        assert_eq!(source.register_calls(), 3);
    }

    #[tokio::test]
    async fn test_drains_buffered_events() {
        let source = Arc::new(ScriptedSource::new().pending(2).fetch(Ok(vec![7, 8])));
        let handler = Arc::new(RecordingHandler::new());
        let registrar = registrar(source.clone(), handler.clone());

        let result = registrar.register(URL, &CancellationToken::new()).await;

        assert!(result.success);
        assert_eq!(result.buffered_count, 2);
        assert_eq!(handler.seen(), vec![7, 8]);

        let fetches = source.fetch_calls();
        let drains = fetches
            .iter()
            .filter(|(offset, timeout)| *offset == 0 && timeout.is_zero())
            .count();
        assert_eq!(drains, 1);
        assert_eq!(fetches.last(), Some(&(9, Duration::ZERO)));
    }

    #[tokio::test]
    async fn test_drain_failure_keeps_registration() {
        let source = Arc::new(
            ScriptedSource::new()
                .pending(3)
                .fetch(Err(SourceError::Conflict("webhook is active".to_string()))),
        );
        let handler = Arc::new(RecordingHandler::new());
        let registrar = registrar(source.clone(), handler.clone());

        let result = registrar.register(URL, &CancellationToken::new()).await;

        assert!(result.success);
        assert!(handler.seen().is_empty());
        assert!(registrar.status.registration().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = Arc::new(ScriptedSource::new());
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));
        let token = CancellationToken::new();
        token.cancel();

        let result = registrar.register(URL, &token).await;

        assert!(!result.success);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_registration() {
        let source = Arc::new(ScriptedSource::new());
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));
        registrar.register(URL, &CancellationToken::new()).await;

        assert!(registrar.clear(true).await.unwrap());
        assert!(registrar.status.registration().is_none());
        assert_eq!(source.calls().last(), Some(&Call::Clear(true)));
    }

    #[tokio::test]
    async fn test_clear_unauthenticated_is_fatal() {
        let source = Arc::new(
            ScriptedSource::new().clear(Err(SourceError::Unauthenticated("401".to_string()))),
        );
        let registrar = registrar(source, Arc::new(RecordingHandler::new()));

        let err = registrar.clear(false).await.unwrap_err();
        assert_eq!(err, DeliveryError::Fatal("401".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_until_done_outlasts_registration_budget() {
        let source = Arc::new(
            ScriptedSource::new()
                .clear(Err(transient()))
                .clear(Err(transient()))
                .clear(Err(transient()))
                .clear(Err(transient())),
        );
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));

        let started = tokio::time::Instant::now();
        let cleared = registrar
            .clear_until_done(false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(cleared);
        assert_eq!(source.calls(), vec![Call::Clear(false); 5]);
        assert!(started.elapsed() >= Duration::from_secs(8));
        assert_eq!(registrar.status.snapshot().retries, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_until_done_stops_on_rejection() {
        let source = Arc::new(
            ScriptedSource::new()
                .clear(Err(transient()))
                .clear(Err(SourceError::Rejected("bad request".to_string()))),
        );
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));

        let err = registrar
            .clear_until_done(false, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Configuration(_)));
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_until_done_interrupted_by_shutdown() {
        let source = Arc::new(ScriptedSource::new().clear(Err(transient())));
        let registrar = registrar(source.clone(), Arc::new(RecordingHandler::new()));
        let token = CancellationToken::new();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel.cancel();
        });

        let err = registrar.clear_until_done(false, &token).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Transient(_)));
        assert_eq!(source.calls(), vec![Call::Clear(false)]);
    }
