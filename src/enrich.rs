// src/enrich.rs
//! Text enrichment pass: pull text fragments out of known payload shapes, score them,
//! and attach the per-dimension mean as `sentiment`.

use std::collections::BTreeMap;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::fetch::types::{Sentiment, SourceKind, SourceResult};
use crate::sentiment::{ScoreError, SentimentScorer};

const MAX_FRAGMENT_CHARS: usize = 1500;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "enrich_scored_fragments_total",
            "Text fragments scored by the enrichment pass."
        );
        describe_counter!(
            "enrich_failures_total",
            "Sources whose enrichment was abandoned after a scoring error."
        );
    });
}

/// Where text lives in a source's payload: `(array field, text field)`.
pub fn text_fields(kind: &SourceKind) -> Option<(&'static str, &'static str)> {
    match kind {
        SourceKind::Instagram => Some(("latest_posts", "caption")),
        SourceKind::Twitter => Some(("posted_tweets", "text")),
        SourceKind::Facebook => Some(("recent_posts", "message")),
        SourceKind::Reddit => Some(("submissions", "title")),
        _ => None,
    }
}

/// Non-empty, normalized fragments for a payload; `None` when the kind has no mapping.
pub fn extract_texts(kind: &SourceKind, raw: &Value) -> Option<Vec<String>> {
    let (list, field) = text_fields(kind)?;
    let items = raw.get(list).and_then(Value::as_array);
    Some(
        items
            .into_iter()
            .flatten()
            .filter_map(|item| item.get(field).and_then(Value::as_str))
            .map(normalize_text)
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

/// Normalize text: decode entities, strip tags, straighten quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| {
        regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("static tag regex")
    });
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    // 5) Length cap
    if out.chars().count() > MAX_FRAGMENT_CHARS {
        out = out.chars().take(MAX_FRAGMENT_CHARS).collect();
    }
    out
}

/// Score all fragments and average each dimension. `Ok(None)` when there is nothing to score.
pub fn mean_sentiment<S: SentimentScorer + ?Sized>(
    scorer: &S,
    texts: &[String],
) -> Result<Option<Sentiment>, ScoreError> {
    if texts.is_empty() {
        return Ok(None);
    }
    let mut acc = Sentiment::default();
    for t in texts {
        let s = scorer.polarity_scores(t)?;
        acc.pos += s.pos;
        acc.neu += s.neu;
        acc.neg += s.neg;
        acc.compound += s.compound;
    }
    let n = texts.len() as f64;
    counter!("enrich_scored_fragments_total").increment(texts.len() as u64);
    Ok(Some(Sentiment {
        pos: acc.pos / n,
        neu: acc.neu / n,
        neg: acc.neg / n,
        compound: acc.compound / n,
    }))
}

/// Attach sentiment to every successful result with extractable text. Failed results,
/// unmapped kinds, and payloads without text pass through untouched. A scoring error
/// only affects the source it happened in.
pub fn enrich<S: SentimentScorer + ?Sized>(
    results: BTreeMap<SourceKind, SourceResult>,
    scorer: &S,
) -> BTreeMap<SourceKind, SourceResult> {
    ensure_metrics_described();
    results
        .into_iter()
        .map(|(kind, result)| {
            let enriched = enrich_one(&kind, result, scorer);
            (kind, enriched)
        })
        .collect()
}

fn enrich_one<S: SentimentScorer + ?Sized>(
    kind: &SourceKind,
    result: SourceResult,
    scorer: &S,
) -> SourceResult {
    let Some(texts) = result.raw.as_ref().and_then(|raw| extract_texts(kind, raw)) else {
        return result;
    };
    match mean_sentiment(scorer, &texts) {
        Ok(Some(s)) => {
            tracing::debug!(source = %kind, fragments = texts.len(), compound = s.compound, "sentiment attached");
            result.with_sentiment(s)
        }
        Ok(None) => result,
        Err(e) => {
            tracing::warn!(source = %kind, error = %e, "sentiment scoring failed; leaving result unenriched");
            counter!("enrich_failures_total").increment(1);
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_decodes_strips_and_collapses() {
        let s = "  Hello,&nbsp;&nbsp; <b>world</b> &ldquo;ok&rdquo;  ";
        assert_eq!(normalize_text(s), r#"Hello, world "ok""#);
        assert_eq!(normalize_text("a < b and c > d"), "a < b and c > d");
    }

    #[test]
    fn extraction_uses_per_source_fields() {
        let raw = json!({"posted_tweets": [{"text": "one"}, {"text": ""}, {"text": null}, {"id": 3}]});
        assert_eq!(
            extract_texts(&SourceKind::Twitter, &raw),
            Some(vec!["one".to_string()])
        );
        let raw = json!({"latest_posts": [{"caption": "sunset &amp; sea"}]});
        assert_eq!(
            extract_texts(&SourceKind::Instagram, &raw),
            Some(vec!["sunset & sea".to_string()])
        );
        assert_eq!(extract_texts(&SourceKind::HibpEmail, &raw), None);
        assert_eq!(extract_texts(&SourceKind::Reddit, &json!({})), Some(vec![]));
    }

    #[test]
    fn mean_of_nothing_is_none() {
        let scorer = |_: &str| -> Result<Sentiment, ScoreError> { Ok(Sentiment::default()) };
        assert_eq!(mean_sentiment(&scorer, &[]).unwrap(), None);
    }
}
