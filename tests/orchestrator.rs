// tests/orchestrator.rs
mod support;

use std::sync::Arc;
use std::time::Duration;

use profile_aggregator::{FetchError, SourceKind, SourceRequest};
use serde_json::json;
use support::{calls, orchestrator, registry, PanickingConnector, StubConnector};

#[tokio::test]
async fn every_request_gets_a_result() {
    let reddit = StubConnector::ok(SourceKind::Reddit, json!({"submissions": []}));
    let twitter = StubConnector::ok(SourceKind::Twitter, json!({"posted_tweets": []}));
    let hibp = StubConnector::failing(
        SourceKind::HibpEmail,
        FetchError::MissingCredentials("missing api_key".into()),
    );
    let orch = orchestrator(registry(vec![reddit, twitter, hibp]));

    let out = orch
        .run(vec![
            SourceRequest::new(SourceKind::Reddit, "alice"),
            SourceRequest::new(SourceKind::Twitter, "@alice"),
            SourceRequest::new(SourceKind::HibpEmail, "alice@example.com"),
        ])
        .await;

    assert_eq!(out.len(), 3);
    assert!(out[&SourceKind::Reddit].is_success());
    assert!(out[&SourceKind::Twitter].is_success());
    let hibp = &out[&SourceKind::HibpEmail];
    assert!(hibp.raw.is_none());
    assert_eq!(hibp.summary, "Hibp Email skipped (missing api_key)");
}

#[tokio::test]
async fn one_failure_does_not_touch_the_others() {
    let ok = StubConnector::ok(SourceKind::Facebook, json!({"recent_posts": []}));
    let bad = StubConnector::failing(
        SourceKind::Instagram,
        FetchError::Unauthorized("token expired".into()),
    );
    let orch = orchestrator(registry(vec![ok, bad]));

    let out = orch
        .run(vec![
            SourceRequest::new(SourceKind::Instagram, "someone"),
            SourceRequest::new(SourceKind::Facebook, "me"),
        ])
        .await;

    assert_eq!(
        out[&SourceKind::Facebook].summary,
        "Facebook ok for me"
    );
    assert!(out[&SourceKind::Instagram]
        .summary
        .starts_with("Instagram error: authentication rejected"));
}

#[tokio::test]
async fn concurrent_duplicates_share_one_fetch() {
    let stub = StubConnector::ok(SourceKind::Reddit, json!({"submissions": []}))
        .slow(Duration::from_millis(50));
    let counter = stub.counter();
    let orch = orchestrator(registry(vec![stub]));

    let reqs = vec![SourceRequest::new(SourceKind::Reddit, "alice"); 5];
    let out = orch.run_detailed(reqs).await;

    assert_eq!(calls(&counter), 1);
    assert_eq!(out.len(), 5);
    assert!(out.iter().all(|(_, r)| r == &out[0].1));
}

#[tokio::test]
async fn cache_does_not_outlive_a_run() {
    let stub = StubConnector::ok(SourceKind::Twitter, json!({}));
    let counter = stub.counter();
    let orch = orchestrator(registry(vec![stub]));
    let req = || vec![SourceRequest::new(SourceKind::Twitter, "@alice")];

    orch.run(req()).await;
    orch.run(req()).await;
    assert_eq!(calls(&counter), 2);
}

#[tokio::test]
async fn different_targets_are_fetched_separately() {
    let stub = StubConnector::ok(SourceKind::Reddit, json!({}));
    let counter = stub.counter();
    let orch = orchestrator(registry(vec![stub]));

    let out = orch
        .run_detailed(vec![
            SourceRequest::new(SourceKind::Reddit, "alice"),
            SourceRequest::new(SourceKind::Reddit, "bob"),
        ])
        .await;
    assert_eq!(calls(&counter), 2);
    assert_eq!(out[0].1.summary, "Reddit ok for alice");
    assert_eq!(out[1].1.summary, "Reddit ok for bob");

    // keyed view keeps the first submission for a repeated source
    let keyed = orch
        .run(vec![
            SourceRequest::new(SourceKind::Reddit, "alice"),
            SourceRequest::new(SourceKind::Reddit, "bob"),
        ])
        .await;
    assert_eq!(keyed.len(), 1);
    assert_eq!(keyed[&SourceKind::Reddit].summary, "Reddit ok for alice");
}

#[tokio::test]
async fn unregistered_source_reports_module_not_found() {
    let orch = orchestrator(registry(vec![StubConnector::ok(
        SourceKind::Reddit,
        json!({}),
    )]));
    let req = SourceRequest::parse_pair("redit=alice").unwrap();
    let out = orch.run(vec![req]).await;

    let r = &out[&SourceKind::Custom("redit".into())];
    assert!(r.raw.is_none());
    assert_eq!(r.summary, "Redit module not found. Did you mean 'reddit'?");
}

#[tokio::test(start_paused = true)]
async fn slow_connector_hits_the_task_deadline() {
    let slow = StubConnector::ok(SourceKind::GoogleDork, json!({}))
        .slow(Duration::from_secs(30));
    let fast = StubConnector::ok(SourceKind::Reddit, json!({}));
    let orch = orchestrator(registry(vec![slow, fast]))
        .with_task_timeout(Some(Duration::from_secs(2)));

    let out = orch
        .run(vec![
            SourceRequest::new(SourceKind::GoogleDork, "alice"),
            SourceRequest::new(SourceKind::Reddit, "alice"),
        ])
        .await;

    assert_eq!(
        out[&SourceKind::GoogleDork].summary,
        "Google Dork error: timed out after 2s"
    );
    assert!(out[&SourceKind::Reddit].is_success());
}

#[tokio::test]
async fn worker_limit_still_completes_everything() {
    let stubs: Vec<_> = SourceKind::BUILTIN
        .iter()
        .map(|k| StubConnector::ok(k.clone(), json!({})).slow(Duration::from_millis(5)))
        .collect();
    let orch = orchestrator(registry(stubs)).with_max_workers(2);

    let reqs = SourceKind::BUILTIN
        .iter()
        .map(|k| SourceRequest::new(k.clone(), "alice"))
        .collect();
    let out = orch.run_detailed(reqs).await;

    assert_eq!(out.len(), SourceKind::BUILTIN.len());
    for ((req, res), kind) in out.iter().zip(SourceKind::BUILTIN.iter()) {
        assert_eq!(&req.source, kind);
        assert!(res.is_success());
    }
}

#[tokio::test]
async fn panicking_connector_is_isolated_and_fetched_once() {
    let boom = PanickingConnector::new(SourceKind::Reddit);
    let boom_calls = boom.calls.clone();
    let healthy = StubConnector::ok(SourceKind::Twitter, json!({"posted_tweets": []}));

    let mut reg = registry(vec![healthy]);
    reg.register(Arc::new(boom));
    let orch = orchestrator(reg);

    let mut reqs = vec![SourceRequest::new(SourceKind::Reddit, "alice"); 4];
    reqs.push(SourceRequest::new(SourceKind::Twitter, "@alice"));
    let out = orch.run_detailed(reqs).await;

    assert_eq!(out.len(), 5);
    assert_eq!(calls(&boom_calls), 1);
    for (req, res) in &out[..4] {
        assert_eq!(req.source, SourceKind::Reddit);
        assert!(res.raw.is_none());
        assert!(res.summary.starts_with("Reddit error:"), "{}", res.summary);
        assert_eq!(res, &out[0].1);
    }
    let (_, tw) = &out[4];
    assert_eq!(tw.summary, "Twitter ok for @alice");
    assert_eq!(tw.raw, Some(json!({"posted_tweets": []})));
}

#[tokio::test]
async fn empty_batch_is_empty() {
    let orch = orchestrator(registry(vec![]));
    assert!(orch.run(vec![]).await.is_empty());
}
