// tests/retry_backoff.rs
mod support;

use std::time::Duration;

use profile_aggregator::{retry, FetchError, RetryPolicy, SourceKind, SourceRequest};
use serde_json::json;
use support::{calls, orchestrator, registry, StubConnector};

#[tokio::test(start_paused = true)]
async fn transient_failures_then_success() {
    let stub = StubConnector::flaky(SourceKind::Reddit, 2, json!({"submissions": []}));
    let counter = stub.counter();
    let orch = orchestrator(registry(vec![stub]));

    let out = orch
        .run(vec![SourceRequest::new(SourceKind::Reddit, "alice")])
        .await;

    assert_eq!(calls(&counter), 3);
    assert!(out[&SourceKind::Reddit].is_success());
}

#[tokio::test(start_paused = true)]
async fn persistent_transient_failure_stops_at_max_attempts() {
    let stub = StubConnector::failing(
        SourceKind::Twitter,
        FetchError::RateLimited("429 Too Many Requests".into()),
    );
    let counter = stub.counter();
    let orch = orchestrator(registry(vec![stub]));

    let out = orch
        .run(vec![SourceRequest::new(SourceKind::Twitter, "@alice")])
        .await;

    assert_eq!(calls(&counter), 3);
    assert_eq!(
        out[&SourceKind::Twitter].summary,
        "Twitter error: rate limited: 429 Too Many Requests"
    );
}

#[tokio::test(start_paused = true)]
async fn terminal_failures_are_attempted_once() {
    for err in [
        FetchError::NotFound("no such user".into()),
        FetchError::Unauthorized("bad token".into()),
        FetchError::MissingCredentials("missing bearer_token".into()),
        FetchError::Upstream("unexpected payload".into()),
    ] {
        let stub = StubConnector::failing(SourceKind::Twitter, err);
        let counter = stub.counter();
        let orch = orchestrator(registry(vec![stub]));
        orch.run(vec![SourceRequest::new(SourceKind::Twitter, "@x")])
            .await;
        assert_eq!(calls(&counter), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn backoff_waits_grow_geometrically() {
    let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0);
    let start = tokio::time::Instant::now();
    let mut attempts = 0u32;

    let res: Result<(), FetchError> = retry(&policy, "test", || {
        attempts += 1;
        async { Err(FetchError::Transient("reset".into())) }
    })
    .await;

    assert!(matches!(res, Err(FetchError::Transient(_))));
    assert_eq!(attempts, 3);
    // 100ms before the 2nd attempt, 200ms before the 3rd
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(start.elapsed() < Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn jitter_stays_near_the_nominal_schedule() {
    let policy = RetryPolicy::new(2, Duration::from_millis(1000), 2.0).with_jitter(true);
    let start = tokio::time::Instant::now();
    let _: Result<(), FetchError> = retry(&policy, "test", || async {
        Err(FetchError::Timeout(1))
    })
    .await;
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(750), "{waited:?}");
    assert!(waited <= Duration::from_millis(1250), "{waited:?}");
}
