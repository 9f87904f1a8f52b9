// src/report.rs
//! Final report: generation timestamp plus the enriched per-source results.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fetch::types::{SourceKind, SourceResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Serialized as an RFC 3339 / ISO-8601 string.
    pub generated_at: DateTime<Utc>,
    pub results: BTreeMap<SourceKind, SourceResult>,
}

/// Wrap enriched results with their generation time.
pub fn assemble(results: BTreeMap<SourceKind, SourceResult>, generated_at: DateTime<Utc>) -> Report {
    Report {
        generated_at,
        results,
    }
}

impl Report {
    /// `osint_report_YYYYMMDD_HHMMSS.json`, from `generated_at`.
    pub fn file_name(&self) -> String {
        format!(
            "osint_report_{}.json",
            self.generated_at.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing report")
    }

    pub fn failed_sources(&self) -> Vec<&SourceKind> {
        self.results
            .iter()
            .filter(|(_, r)| !r.is_success())
            .map(|(k, _)| k)
            .collect()
    }
}

/// Write the report into `dir` (created if missing) and return the file path.
pub fn write_report(report: &Report, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(report.file_name());
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, report.to_json_pretty()?)
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("finalizing {}", path.display()))?;
    tracing::info!(path = %path.display(), sources = report.results.len(), "report written");
    Ok(path)
}

/// One block per source: summary, plus a sentiment line when present.
pub fn render_summary(report: &Report) -> String {
    let mut out = String::new();
    for (kind, r) in &report.results {
        out.push_str(&format!("{:<14} {}\n", kind.display_name(), r.summary));
        if let Some(s) = r.sentiment {
            out.push_str(&format!(
                "{:<14} → Sentiment: compound {:.3} (pos {:.3}, neg {:.3})\n",
                "", s.compound, s.pos, s.neg
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::types::Sentiment;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> Report {
        let mut results = BTreeMap::new();
        results.insert(
            SourceKind::Reddit,
            SourceResult::success(json!({"submissions": []}), "Reddit u/alice: 0 recent submissions")
                .with_sentiment(Sentiment {
                    pos: 0.4,
                    neu: 0.6,
                    neg: 0.0,
                    compound: 0.4,
                }),
        );
        results.insert(
            SourceKind::Twitter,
            SourceResult::failure("Twitter skipped (incomplete creds)"),
        );
        assemble(results, Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap())
    }

    #[test]
    fn file_name_embeds_timestamp() {
        assert_eq!(sample().file_name(), "osint_report_20240309_140507.json");
    }

    #[test]
    fn json_shape_is_nested_mapping_with_iso_timestamp() {
        let v: serde_json::Value = serde_json::from_str(&sample().to_json_pretty().unwrap()).unwrap();
        assert_eq!(v["generated_at"], "2024-03-09T14:05:07Z");
        assert_eq!(v["results"]["reddit"]["sentiment"]["compound"], 0.4);
        assert!(v["results"]["twitter"]["raw"].is_null());
        assert!(v["results"]["twitter"].get("sentiment").is_none());
    }

    #[test]
    fn report_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample();
        let path = write_report(&report, &dir.path().join("out")).unwrap();
        assert!(path.ends_with("osint_report_20240309_140507.json"));
        let back: Report = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.failed_sources(), vec![&SourceKind::Twitter]);
    }

    #[test]
    fn summary_lists_every_source() {
        let text = render_summary(&sample());
        assert!(text.contains("Reddit u/alice"));
        assert!(text.contains("compound 0.400"));
        assert!(text.contains("Twitter skipped"));
    }
}
