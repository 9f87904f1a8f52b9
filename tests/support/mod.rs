// tests/support/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use profile_aggregator::{
    Connector, ConnectorRegistry, Credentials, FetchContext, FetchError, Fetched, Orchestrator,
    RetryPolicy, SourceKind, Transport,
};
use serde_json::{json, Value};

/// Connector whose behaviour is scripted per call: fails `fail_first` times with `error`,
/// then returns `payload`. Every call is counted.
pub struct StubConnector {
    pub kind: SourceKind,
    pub calls: Arc<AtomicUsize>,
    pub fail_first: usize,
    pub error: FetchError,
    pub delay: Duration,
    pub payload: Value,
}

impl StubConnector {
    pub fn ok(kind: SourceKind, payload: Value) -> Self {
        Self {
            kind,
            calls: Arc::new(AtomicUsize::new(0)),
            fail_first: 0,
            error: FetchError::Transient("boom".into()),
            delay: Duration::ZERO,
            payload,
        }
    }

    pub fn failing(kind: SourceKind, error: FetchError) -> Self {
        Self {
            fail_first: usize::MAX,
            error,
            ..Self::ok(kind, Value::Null)
        }
    }

    pub fn flaky(kind: SourceKind, fail_first: usize, payload: Value) -> Self {
        Self {
            fail_first,
            ..Self::ok(kind, payload)
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Connector for StubConnector {
    fn kind(&self) -> SourceKind {
        self.kind.clone()
    }

    async fn fetch(&self, target: &str, _ctx: &FetchContext<'_>) -> Result<Fetched, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if n < self.fail_first {
            return Err(self.error.clone());
        }
        Ok(Fetched::new(
            self.payload.clone(),
            format!("{} ok for {target}", self.kind.display_name()),
        ))
    }
}

/// Connector that counts the call, then panics.
pub struct PanickingConnector {
    pub kind: SourceKind,
    pub calls: Arc<AtomicUsize>,
}

impl PanickingConnector {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Connector for PanickingConnector {
    fn kind(&self) -> SourceKind {
        self.kind.clone()
    }

    async fn fetch(&self, target: &str, _ctx: &FetchContext<'_>) -> Result<Fetched, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        panic!("connector blew up on {target}");
    }
}

pub fn calls(c: &Arc<AtomicUsize>) -> usize {
    c.load(Ordering::SeqCst)
}

pub fn registry(connectors: Vec<StubConnector>) -> ConnectorRegistry {
    let mut r = ConnectorRegistry::new();
    for c in connectors {
        r.register(Arc::new(c));
    }
    r
}

/// Orchestrator over stubs: direct transport, fast retries, no deadline.
pub fn orchestrator(registry: ConnectorRegistry) -> Orchestrator {
    let transport = Transport::direct(Duration::from_secs(5)).expect("direct transport");
    Orchestrator::new(registry, Credentials::empty(), transport)
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10), 2.0))
        .with_task_timeout(None)
}

pub fn reddit_payload(titles: &[&str]) -> Value {
    let subs: Vec<Value> = titles.iter().map(|t| json!({ "title": t })).collect();
    json!({ "user": "alice", "submissions": subs })
}
