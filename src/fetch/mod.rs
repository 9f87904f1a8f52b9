// src/fetch/mod.rs
//! Fetch orchestration: every request runs as its own task through
//! run cache -> retry wrapper -> connector, and always yields a `SourceResult`.

pub mod cache;
pub mod connectors;
pub mod registry;
pub mod retry;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;

use crate::config::credentials::Credentials;
use crate::config::run::RunConfig;
use crate::fetch::cache::RunCache;
use crate::fetch::registry::ConnectorRegistry;
use crate::fetch::retry::{retry, RetryPolicy};
use crate::fetch::types::{
    Connector, FetchContext, FetchError, SourceKind, SourceRequest, SourceResult,
};
use crate::transport::Transport;

/// One-time metrics registration (so series show up on scrape).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_requests_total", "Source requests submitted.");
        describe_counter!(
            "fetch_failures_total",
            "Requests that ended in a failure-shaped result."
        );
        describe_counter!("fetch_retries_total", "Backoff sleeps taken by the retry wrapper.");
        describe_counter!(
            "fetch_cache_hits_total",
            "Requests answered from the run cache (completed or in-flight entry)."
        );
        describe_counter!("fetch_timeouts_total", "Requests cut off by the task deadline.");
        describe_histogram!("fetch_duration_ms", "Connector pipeline time in milliseconds.");
    });
}

/// Short, non-reversible id for a target so raw identifiers never reach the logs.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

struct Shared {
    registry: Arc<ConnectorRegistry>,
    credentials: Arc<Credentials>,
    transport: Transport,
    policy: RetryPolicy,
    task_timeout: Option<Duration>,
}

/// Runs batches of source requests. Holds no per-run state: each `run` call builds a
/// fresh `RunCache` that is dropped when the batch completes.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<ConnectorRegistry>,
    credentials: Arc<Credentials>,
    transport: Transport,
    policy: RetryPolicy,
    task_timeout: Option<Duration>,
    max_workers: usize,
}

impl Orchestrator {
    pub fn new(
        registry: ConnectorRegistry,
        credentials: Credentials,
        transport: Transport,
    ) -> Self {
        Self::from_config(&RunConfig::default(), registry, credentials, transport)
    }

    pub fn from_config(
        cfg: &RunConfig,
        registry: ConnectorRegistry,
        credentials: Credentials,
        transport: Transport,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            credentials: Arc::new(credentials),
            transport,
            policy: cfg.retry.clone().sanitized(),
            task_timeout: cfg.task_timeout(),
            max_workers: cfg.max_workers.max(1),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy.sanitized();
        self
    }

    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = n.max(1);
        self
    }

    /// Run every request and return the results in submission order.
    /// Never fails: faults become failure-shaped results.
    pub async fn run_detailed(
        &self,
        requests: Vec<SourceRequest>,
    ) -> Vec<(SourceRequest, SourceResult)> {
        ensure_metrics_described();
        if requests.is_empty() {
            return Vec::new();
        }

        let shared = Arc::new(Shared {
            registry: self.registry.clone(),
            credentials: self.credentials.clone(),
            transport: self.transport.clone(),
            policy: self.policy.clone(),
            task_timeout: self.task_timeout,
        });
        let cache = Arc::new(RunCache::new());
        let workers = requests.len().min(self.max_workers);
        let permits = Arc::new(Semaphore::new(workers));
        tracing::info!(requests = requests.len(), workers, "fetch run started");

        let mut handles = Vec::with_capacity(requests.len());
        for req in requests {
            counter!("fetch_requests_total").increment(1);
            let shared = shared.clone();
            let cache = cache.clone();
            let permits = permits.clone();
            let task_req = req.clone();
            let handle = tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return SourceResult::failure(format!(
                        "{} error: worker pool closed",
                        task_req.source.display_name()
                    ));
                };
                execute(&shared, &cache, &task_req).await
            });
            handles.push((req, handle));
        }

        let mut out = Vec::with_capacity(handles.len());
        for (req, handle) in handles {
            let result = match handle.await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(source = %req.source, error = %e, "fetch task aborted");
                    counter!("fetch_failures_total").increment(1);
                    SourceResult::failure(format!(
                        "{} error: task failed: {e}",
                        req.source.display_name()
                    ))
                }
            };
            out.push((req, result));
        }

        let failed = out.iter().filter(|(_, r)| !r.is_success()).count();
        tracing::info!(
            results = out.len(),
            failed,
            cached = cache.len(),
            "fetch run finished"
        );
        out
    }

    /// Run every request and key the results by source. One entry per distinct source;
    /// if a source appears with several targets, the first submitted request owns the slot.
    pub async fn run(&self, requests: Vec<SourceRequest>) -> BTreeMap<SourceKind, SourceResult> {
        let mut map = BTreeMap::new();
        for (req, result) in self.run_detailed(requests).await {
            if map.contains_key(&req.source) {
                tracing::warn!(
                    source = %req.source,
                    target_id = %anon_hash(&req.target),
                    "source requested with more than one target; keeping the first result"
                );
                continue;
            }
            map.insert(req.source, result);
        }
        map
    }
}

async fn execute(shared: &Arc<Shared>, cache: &RunCache, req: &SourceRequest) -> SourceResult {
    let Some(connector) = shared.registry.get(&req.source) else {
        tracing::warn!(source = %req.source, "no connector registered");
        counter!("fetch_failures_total").increment(1);
        return SourceResult::failure(shared.registry.missing_summary(&req.source));
    };

    cache
        .get_or_fetch(&req.source, &req.target, || {
            let shared = Arc::clone(shared);
            let req = req.clone();
            async move {
                // The producer runs in its own task so a panic still fills the slot
                // and waiting duplicates never re-run the connector.
                let source = req.source.clone();
                match tokio::spawn(produce(shared, connector, req)).await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::error!(source = %source, error = %e, "connector task aborted");
                        counter!("fetch_failures_total").increment(1);
                        SourceResult::failure(format!(
                            "{} error: task failed: {e}",
                            source.display_name()
                        ))
                    }
                }
            }
        })
        .await
}

/// Timeout -> retry -> connector for one cache key.
async fn produce(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    req: SourceRequest,
) -> SourceResult {
    let target_id = anon_hash(&req.target);
    let t0 = Instant::now();
    let ctx = FetchContext {
        credentials: &shared.credentials,
        transport: &shared.transport,
        retry: &shared.policy,
    };
    let connector: &dyn Connector = connector.as_ref();
    let target = req.target.as_str();
    let ctx_ref = &ctx;
    let attempt = retry(&shared.policy, req.source.as_str(), || {
        connector.fetch(target, ctx_ref)
    });

    let outcome = match shared.task_timeout {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(r) => r,
            Err(_) => {
                counter!("fetch_timeouts_total").increment(1);
                Err(FetchError::Timeout(limit.as_secs()))
            }
        },
        None => attempt.await,
    };
    histogram!("fetch_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    match outcome {
        Ok(fetched) => {
            tracing::info!(source = %req.source, target_id = %target_id, "fetch ok");
            fetched.into()
        }
        Err(e) => {
            tracing::warn!(
                source = %req.source,
                target_id = %target_id,
                kind = e.kind(),
                error = %e,
                "fetch failed"
            );
            counter!("fetch_failures_total").increment(1);
            SourceResult::from_error(&req.source, &e)
        }
    }
}
