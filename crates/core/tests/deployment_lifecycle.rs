//! Deployment lifecycle integration tests.
//!
//! These tests drive approval events through the orchestrator with mock
//! platforms and a recording bus:
//! approved -> per-platform attempts -> status events -> aggregate event

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use zamc_connectors_core::{
    bus::{DeadLetterReason, EventBus, Subjects},
    orchestrator::ApprovalListener,
    platform::PlatformError,
    testing::{fixtures, MockPlatform, RecordingBus},
    AssetStatus, AssetStatusChangedEvent, BusMessage, ConsumerConfig, DeploymentConfig,
    DeploymentOrchestrator, DeploymentStatus, DeploymentStatusChangedEvent, OrchestratorError,
    OrchestratorMetrics, Platform, PlatformRegistry,
};

/// Test helper holding the mocks shared by orchestrator instances.
struct TestHarness {
    bus: RecordingBus,
    google: Arc<MockPlatform>,
    meta: Arc<MockPlatform>,
    subjects: Subjects,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            bus: RecordingBus::new(),
            google: Arc::new(MockPlatform::new(Platform::GoogleAds)),
            meta: Arc::new(MockPlatform::new(Platform::Meta)),
            subjects: Subjects::default(),
        }
    }

    fn orchestrator(&self) -> DeploymentOrchestrator {
        self.orchestrator_with(DeploymentConfig::default())
    }

    fn orchestrator_with(&self, config: DeploymentConfig) -> DeploymentOrchestrator {
        DeploymentOrchestrator::new(
            config,
            PlatformRegistry::new()
                .with(self.google.clone())
                .with(self.meta.clone()),
            Arc::new(self.bus.clone()),
            self.subjects.clone(),
            OrchestratorMetrics::new().expect("metrics"),
        )
    }

    async fn status_events(&self) -> Vec<DeploymentStatusChangedEvent> {
        self.bus
            .messages_on(&self.subjects.deployment_status)
            .await
            .into_iter()
            .filter_map(|m| match m {
                BusMessage::DeploymentStatusChanged(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    async fn completed_events(&self) -> Vec<AssetStatusChangedEvent> {
        self.bus
            .messages_on(&self.subjects.deployment_completed)
            .await
            .into_iter()
            .filter_map(|m| match m {
                BusMessage::DeploymentCompleted(e) => Some(e),
                _ => None,
            })
            .collect()
    }
}

fn transient() -> PlatformError {
    PlatformError::Transient("HTTP 503: upstream unavailable".to_string())
}

// =============================================================================
// Filtering
// =============================================================================

#[tokio::test]
async fn test_non_approved_statuses_do_nothing() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator();

    for status in [
        AssetStatus::Draft,
        AssetStatus::Review,
        AssetStatus::Rejected,
        AssetStatus::Deployed,
        AssetStatus::Failed,
    ] {
        let mut event = fixtures::approval_event(&[Platform::GoogleAds, Platform::Meta]);
        event.status = status;

        let outcome = orchestrator
            .handle_approval_event(&event, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    assert_eq!(harness.google.call_count().await, 0);
    assert_eq!(harness.meta.call_count().await, 0);
    assert!(harness.bus.recorded_publishes().await.is_empty());
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_approved_asset_deploys_to_every_platform() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator();
    let event = fixtures::approval_event(&[Platform::GoogleAds, Platform::Meta]);

    let summary = orchestrator
        .handle_approval_event(&event, &CancellationToken::new())
        .await
        .unwrap()
        .expect("approved event is processed");

    assert_eq!(summary.final_status, AssetStatus::Deployed);
    assert_eq!(summary.successful, 2);
    assert_eq!(harness.google.call_count().await, 1);
    assert_eq!(harness.meta.call_count().await, 1);

    let statuses = harness.status_events().await;
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].platform, Platform::GoogleAds);
    assert_eq!(statuses[1].platform, Platform::Meta);
    for status in &statuses {
        assert_eq!(status.asset_id, event.asset_id);
        assert_eq!(status.status, AssetStatus::Deployed);
        assert_eq!(status.prev_status, AssetStatus::Approved);
        assert_eq!(status.deployment_result.metrics.retry_count, 0);
        assert!(status.deployment_result.platform_id.is_some());
    }

    let completed = harness.completed_events().await;
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status, AssetStatus::Deployed);
    assert_eq!(completed[0].prev_status, Some(AssetStatus::Approved));
    assert_eq!(completed[0].asset_id, event.asset_id);
    assert_eq!(completed[0].metadata, event.metadata);

    // Aggregate goes out last
    let publishes = harness.bus.recorded_publishes().await;
    assert_eq!(publishes.len(), 3);
    assert_eq!(publishes[2].subject, harness.subjects.deployment_completed);
}

#[tokio::test]
async fn test_requests_carry_event_content() {
    let harness = TestHarness::new();
    let event = fixtures::approval_event(&[Platform::Meta]);

    harness
        .orchestrator()
        .handle_approval_event(&event, &CancellationToken::new())
        .await
        .unwrap();

    let calls = harness.meta.recorded_calls().await;
    assert_eq!(calls.len(), 1);
    let request = &calls[0].request;
    assert_eq!(request.asset_id, event.asset_id);
    assert_eq!(request.project_id, event.project_id);
    assert_eq!(request.strategy_id, event.strategy_id);
    assert_eq!(request.platform, Platform::Meta);
    assert_eq!(request.title, event.title);
    assert_eq!(request.metadata, event.metadata);
}

// =============================================================================
// Retry behavior
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_always_failing_platform_is_retried_with_delay() {
    let harness = TestHarness::new();
    harness.meta.set_always_fail(Some(transient())).await;
    let orchestrator = harness.orchestrator();
    let request = fixtures::deployment_request(Platform::Meta);

    let result = orchestrator
        .deploy_to_platform(&request, &CancellationToken::new())
        .await;

    assert_eq!(result.status, DeploymentStatus::Failed);
    assert_eq!(result.metrics.retry_count, 2);
    assert_eq!(
        result.error.as_deref(),
        Some("Transient platform error: HTTP 503: upstream unavailable")
    );

    let calls = harness.meta.recorded_calls().await;
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_secs(5));
    }
    // Two waits, no wait after the last attempt
    assert!(result.metrics.duration_ms >= 10_000);
    assert!(result.metrics.duration_ms < 15_000);
}

#[tokio::test(start_paused = true)]
async fn test_retry_count_matches_configured_attempts() {
    for attempts in [1u32, 2, 5] {
        let harness = TestHarness::new();
        harness.google.set_always_fail(Some(transient())).await;
        let orchestrator = harness.orchestrator_with(DeploymentConfig {
            max_retry_attempts: attempts,
            retry_delay_secs: 1,
            timeout_secs: 30,
        });

        let result = orchestrator
            .deploy_to_platform(
                &fixtures::deployment_request(Platform::GoogleAds),
                &CancellationToken::new(),
            )
            .await;

        assert!(result.is_failed());
        assert_eq!(result.metrics.retry_count, attempts - 1);
        assert_eq!(harness.google.call_count().await, attempts as usize);
    }
}

#[tokio::test(start_paused = true)]
async fn test_recovery_after_two_failures_is_deployed() {
    let harness = TestHarness::new();
    harness.meta.fail_next(2, transient()).await;
    let event = fixtures::approval_event(&[Platform::GoogleAds, Platform::Meta]);

    let summary = harness
        .orchestrator()
        .handle_approval_event(&event, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.final_status, AssetStatus::Deployed);
    let meta = summary.result_for(&Platform::Meta).unwrap();
    assert!(meta.is_success());
    assert_eq!(meta.metrics.retry_count, 2);
    assert!(meta.error.is_none());
    assert_eq!(harness.meta.call_count().await, 3);

    let google = summary.result_for(&Platform::GoogleAds).unwrap();
    assert_eq!(google.metrics.retry_count, 0);

    let completed = harness.completed_events().await;
    assert_eq!(completed[0].status, AssetStatus::Deployed);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_platform_fails_the_asset() {
    let harness = TestHarness::new();
    harness.meta.fail_next(3, transient()).await;
    let event = fixtures::approval_event(&[Platform::GoogleAds, Platform::Meta]);

    let summary = harness
        .orchestrator()
        .handle_approval_event(&event, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.final_status, AssetStatus::Failed);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 1);

    let statuses = harness.status_events().await;
    assert_eq!(statuses[0].status, AssetStatus::Deployed);
    assert_eq!(statuses[1].status, AssetStatus::Failed);
    assert_eq!(
        statuses[1].deployment_result.error.as_deref(),
        Some("Transient platform error: HTTP 503: upstream unavailable")
    );

    let completed = harness.completed_events().await;
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status, AssetStatus::Failed);
    assert_eq!(completed[0].prev_status, Some(AssetStatus::Approved));
}

#[tokio::test(start_paused = true)]
async fn test_rejection_is_not_retried() {
    let harness = TestHarness::new();
    harness
        .google
        .set_always_fail(Some(PlatformError::Rejected("policy violation".into())))
        .await;

    let result = harness
        .orchestrator()
        .deploy_to_platform(
            &fixtures::deployment_request(Platform::GoogleAds),
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_failed());
    assert_eq!(result.metrics.retry_count, 0);
    assert_eq!(harness.google.call_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_each_attempt_gets_its_own_timeout() {
    let harness = TestHarness::new();
    harness.meta.set_delay(Duration::from_secs(600)).await;
    let orchestrator = harness.orchestrator_with(DeploymentConfig {
        max_retry_attempts: 2,
        retry_delay_secs: 5,
        timeout_secs: 300,
    });

    let result = orchestrator
        .deploy_to_platform(
            &fixtures::deployment_request(Platform::Meta),
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_failed());
    assert_eq!(result.metrics.retry_count, 1);
    assert_eq!(
        result.error.as_deref(),
        Some("Deployment timed out after 300s")
    );
    // 300s + 5s + 300s
    assert_eq!(result.metrics.duration_ms / 1000, 605);
}

// =============================================================================
// Edge cases
// =============================================================================

#[tokio::test]
async fn test_unsupported_platform_fails_without_calls() {
    let harness = TestHarness::new();
    let event = fixtures::approval_event(&[
        Platform::GoogleAds,
        Platform::Other("tiktok".to_string()),
    ]);

    let summary = harness
        .orchestrator()
        .handle_approval_event(&event, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.final_status, AssetStatus::Failed);
    let tiktok = summary
        .result_for(&Platform::Other("tiktok".to_string()))
        .unwrap();
    assert_eq!(tiktok.metrics.retry_count, 0);
    assert_eq!(tiktok.error.as_deref(), Some("Unsupported platform: tiktok"));
    assert_eq!(harness.status_events().await.len(), 2);
}

#[tokio::test]
async fn test_duplicate_platforms_deploy_once() {
    let harness = TestHarness::new();
    let event = fixtures::approval_event(&[Platform::Meta, Platform::Meta, Platform::GoogleAds]);

    let summary = harness
        .orchestrator()
        .handle_approval_event(&event, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.results.len(), 2);
    assert_eq!(harness.meta.call_count().await, 1);
    assert_eq!(harness.status_events().await.len(), 2);
}

#[tokio::test]
async fn test_empty_platform_list_is_deployed() {
    let harness = TestHarness::new();
    let event = fixtures::approval_event(&[]);

    let summary = harness
        .orchestrator()
        .handle_approval_event(&event, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert!(summary.results.is_empty());
    assert_eq!(summary.final_status, AssetStatus::Deployed);
    assert!(harness.status_events().await.is_empty());
    assert_eq!(harness.completed_events().await.len(), 1);
}

#[tokio::test]
async fn test_status_publish_failure_does_not_abort() {
    let harness = TestHarness::new();
    harness
        .bus
        .fail_subject(&harness.subjects.deployment_status)
        .await;
    let orchestrator = harness.orchestrator();
    let event = fixtures::approval_event(&[Platform::GoogleAds, Platform::Meta]);

    let summary = orchestrator
        .handle_approval_event(&event, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.final_status, AssetStatus::Deployed);
    assert_eq!(harness.meta.call_count().await, 1);
    assert_eq!(harness.completed_events().await.len(), 1);
    assert_eq!(orchestrator.stats().publish_failures, 2);
}

#[tokio::test]
async fn test_aggregate_publish_failure_is_an_error() {
    let harness = TestHarness::new();
    harness
        .bus
        .fail_subject(&harness.subjects.deployment_completed)
        .await;
    let event = fixtures::approval_event(&[Platform::Meta]);

    let err = harness
        .orchestrator()
        .handle_approval_event(&event, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Publish {
            event_type: "asset.deployment_completed",
            ..
        }
    ));
    assert_eq!(harness.status_events().await.len(), 1);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_retry_wait() {
    let harness = TestHarness::new();
    harness.meta.set_always_fail(Some(transient())).await;
    let orchestrator = Arc::new(harness.orchestrator());
    let event = fixtures::approval_event(&[Platform::GoogleAds, Platform::Meta]);
    let cancel = CancellationToken::new();

    let handle = {
        let orchestrator = Arc::clone(&orchestrator);
        let cancel = cancel.clone();
        let event = event.clone();
        tokio::spawn(async move { orchestrator.handle_approval_event(&event, &cancel).await })
    };

    // Wait for the first meta attempt; the orchestrator is then in its 5s wait
    while harness.meta.call_count().await < 1 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Cancelled {
            platform: Platform::Meta,
            ..
        }
    ));
    assert_eq!(harness.meta.call_count().await, 1);

    let statuses = harness.status_events().await;
    assert_eq!(statuses.len(), 2);
    assert_eq!(
        statuses[1].deployment_result.status,
        DeploymentStatus::Cancelled
    );
    assert_eq!(statuses[1].status, AssetStatus::Approved);

    assert!(harness.completed_events().await.is_empty());
    assert_eq!(orchestrator.stats().cancelled_deployments, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_attempt() {
    let harness = TestHarness::new();
    harness.google.set_delay(Duration::from_secs(120)).await;
    let orchestrator = harness.orchestrator();
    let request = fixtures::deployment_request(Platform::GoogleAds);
    let cancel = CancellationToken::new();

    let cancel_later = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        }
    };

    let (result, _) = tokio::join!(
        orchestrator.deploy_to_platform(&request, &cancel),
        cancel_later
    );

    assert_eq!(result.status, DeploymentStatus::Cancelled);
    assert_eq!(result.metrics.retry_count, 0);
}

// =============================================================================
// Listener
// =============================================================================

async fn publish_approval(bus: &RecordingBus, subjects: &Subjects, event: AssetStatusChangedEvent) {
    bus.publish(
        &subjects.approvals,
        BusMessage::AssetStatusChanged(event).encode().unwrap(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_listener_processes_approval_end_to_end() {
    let harness = TestHarness::new();
    let orchestrator = Arc::new(harness.orchestrator());
    let listener = ApprovalListener::new(Arc::clone(&orchestrator), &ConsumerConfig::default());
    let subscription = harness
        .bus
        .queue_subscribe(&harness.subjects.approvals, "connectors")
        .await
        .unwrap();
    let mut completed = harness
        .bus
        .inner()
        .observe(&harness.subjects.deployment_completed);
    let cancel = CancellationToken::new();

    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { listener.run(subscription, cancel).await })
    };

    let event = fixtures::approval_event(&[Platform::GoogleAds, Platform::Meta]);
    publish_approval(&harness.bus, &harness.subjects, event.clone()).await;

    let delivery = tokio::time::timeout(Duration::from_secs(5), completed.next())
        .await
        .expect("aggregate published")
        .unwrap();
    let BusMessage::DeploymentCompleted(aggregate) = BusMessage::decode(&delivery.payload).unwrap()
    else {
        panic!("expected asset.deployment_completed");
    };
    assert_eq!(aggregate.asset_id, event.asset_id);
    assert_eq!(aggregate.status, AssetStatus::Deployed);

    cancel.cancel();
    run.await.unwrap();
    assert_eq!(orchestrator.stats().events_processed, 1);
    assert!(harness.bus.inner().dead_letters().is_empty());
}

#[tokio::test]
async fn test_listener_dead_letters_malformed_messages() {
    let harness = TestHarness::new();
    let orchestrator = Arc::new(harness.orchestrator());
    let listener = ApprovalListener::new(Arc::clone(&orchestrator), &ConsumerConfig::default());
    let subscription = harness
        .bus
        .queue_subscribe(&harness.subjects.approvals, "connectors")
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { listener.run(subscription, cancel).await })
    };

    harness
        .bus
        .publish(&harness.subjects.approvals, b"{\"event_type\":".to_vec())
        .await
        .unwrap();
    // The loop keeps going after a bad message
    publish_approval(
        &harness.bus,
        &harness.subjects,
        fixtures::approval_event(&[Platform::Meta]),
    )
    .await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while orchestrator.stats().events_processed < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("approval processed");

    cancel.cancel();
    run.await.unwrap();

    let dead = harness.bus.inner().dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].reason, DeadLetterReason::Terminated);
    assert_eq!(orchestrator.stats().events_malformed, 1);
}

#[tokio::test]
async fn test_listener_nacks_until_dead_lettered() {
    let harness = TestHarness::new();
    harness
        .bus
        .fail_subject(&harness.subjects.deployment_completed)
        .await;
    let orchestrator = Arc::new(harness.orchestrator());
    let listener = ApprovalListener::new(Arc::clone(&orchestrator), &ConsumerConfig::default());
    let subscription = harness
        .bus
        .queue_subscribe(&harness.subjects.approvals, "connectors")
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { listener.run(subscription, cancel).await })
    };

    publish_approval(
        &harness.bus,
        &harness.subjects,
        fixtures::approval_event(&[Platform::GoogleAds]),
    )
    .await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.bus.inner().dead_letters().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("message dead-lettered");

    cancel.cancel();
    run.await.unwrap();

    let dead = harness.bus.inner().dead_letters();
    assert_eq!(dead[0].reason, DeadLetterReason::MaxDeliveries);
    assert_eq!(dead[0].deliveries, 5);
    assert_eq!(harness.google.call_count().await, 5);
    assert_eq!(orchestrator.stats().events_nacked, 5);
}

#[tokio::test]
async fn test_queue_group_members_split_the_work() {
    let harness = TestHarness::new();
    let first = Arc::new(harness.orchestrator());
    let second = Arc::new(harness.orchestrator());
    let cancel = CancellationToken::new();

    let mut runs = Vec::new();
    for orchestrator in [&first, &second] {
        let listener = ApprovalListener::new(Arc::clone(orchestrator), &ConsumerConfig::default());
        let subscription = harness
            .bus
            .queue_subscribe(&harness.subjects.approvals, "connectors")
            .await
            .unwrap();
        let cancel = cancel.clone();
        runs.push(tokio::spawn(async move {
            listener.run(subscription, cancel).await
        }));
    }

    for _ in 0..4 {
        publish_approval(
            &harness.bus,
            &harness.subjects,
            fixtures::approval_event(&[Platform::Meta]),
        )
        .await;
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while first.stats().events_processed + second.stats().events_processed < 4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("all events processed");

    cancel.cancel();
    for run in runs {
        run.await.unwrap();
    }

    // Each event handled by exactly one member
    assert_eq!(harness.meta.call_count().await, 4);
    assert_eq!(first.stats().events_processed, 2);
    assert_eq!(second.stats().events_processed, 2);
    assert_eq!(harness.completed_events().await.len(), 4);
}
