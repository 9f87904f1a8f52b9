// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod enrich;
pub mod fetch;
pub mod report;
pub mod sentiment;
pub mod transport;

// ---- Re-exports for stable public API ----
pub use crate::config::{Credentials, RunConfig, TransportConfig};
pub use crate::fetch::registry::ConnectorRegistry;
pub use crate::fetch::retry::{retry, RetryPolicy};
pub use crate::fetch::types::{
    Connector, FetchContext, FetchError, Fetched, Sentiment, SourceKind, SourceRequest,
    SourceResult,
};
pub use crate::fetch::Orchestrator;
pub use crate::report::{assemble, Report};
pub use crate::sentiment::{LexiconScorer, ScoreError, SentimentScorer};
pub use crate::transport::{build_transport, Transport, TransportError};

use chrono::Utc;

/// Whole pipeline for one run: fetch every request, enrich, and assemble the report.
/// Transport problems are the caller's concern and happen before this point.
pub async fn collect_report<S: SentimentScorer + ?Sized>(
    orchestrator: &Orchestrator,
    requests: Vec<SourceRequest>,
    scorer: &S,
) -> Report {
    let results = orchestrator.run(requests).await;
    let enriched = enrich::enrich(results, scorer);
    assemble(enriched, Utc::now())
}
