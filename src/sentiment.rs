//! # Sentiment scoring
//! The enrichment pass only depends on `SentimentScorer`; `LexiconScorer` is the
//! built-in implementation (valence lexicon + negation + emphasis, VADER-style output).

use once_cell::sync::Lazy;
use std::collections::HashMap;
use thiserror::Error;

use crate::fetch::types::Sentiment;

static LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).unwrap_or_else(|e| {
        tracing::error!(error = %e, "embedded sentiment lexicon is invalid; scoring neutral");
        HashMap::new()
    })
});

/// Negated valences are scaled by this factor.
const NEGATION_SCALAR: f64 = -0.74;
/// Normalization constant for `compound = s / sqrt(s^2 + ALPHA)`.
const ALPHA: f64 = 15.0;
const EXCLAMATION_BOOST: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("empty text")]
    Empty,
    #[error("scorer failed: {0}")]
    Failed(String),
}

/// Anything that turns one text fragment into polarity scores.
pub trait SentimentScorer: Send + Sync {
    fn polarity_scores(&self, text: &str) -> Result<Sentiment, ScoreError>;
}

impl<F> SentimentScorer for F
where
    F: Fn(&str) -> Result<Sentiment, ScoreError> + Send + Sync,
{
    fn polarity_scores(&self, text: &str) -> Result<Sentiment, ScoreError> {
        self(text)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    /// Lexicon valence for a lower-cased token (0.0 when unknown).
    #[inline]
    fn word_valence(&self, w: &str) -> f64 {
        *LEXICON.get(w).unwrap_or(&0.0)
    }

    /// Per-token valences after negation handling: if a negator appears within the
    /// previous 1..=3 tokens the valence is scaled by `NEGATION_SCALAR`.
    fn valences(&self, tokens: &[String]) -> Vec<f64> {
        (0..tokens.len())
            .map(|i| {
                let base = self.word_valence(&tokens[i]);
                if base == 0.0 {
                    return 0.0;
                }
                let negated = (1..=3).any(|k| i >= k && is_negator(&tokens[i - k]));
                if negated {
                    base * NEGATION_SCALAR
                } else {
                    base
                }
            })
            .collect()
    }
}

impl SentimentScorer for LexiconScorer {
    fn polarity_scores(&self, text: &str) -> Result<Sentiment, ScoreError> {
        if text.trim().is_empty() {
            return Err(ScoreError::Empty);
        }
        let tokens: Vec<String> = tokenize(text).collect();
        if tokens.is_empty() {
            // emoji / punctuation only
            return Ok(Sentiment {
                neu: 1.0,
                ..Sentiment::default()
            });
        }
        let vals = self.valences(&tokens);

        let mut sum: f64 = vals.iter().sum();
        let bangs = text.matches('!').count().min(MAX_EXCLAMATIONS) as f64;
        if sum > 0.0 {
            sum += bangs * EXCLAMATION_BOOST;
        } else if sum < 0.0 {
            sum -= bangs * EXCLAMATION_BOOST;
        }
        let compound = (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0);

        let mut pos_sum = 0.0;
        let mut neg_sum = 0.0;
        let mut neu_count = 0.0;
        for v in vals {
            if v > 0.0 {
                pos_sum += v + 1.0;
            } else if v < 0.0 {
                neg_sum += v - 1.0;
            } else {
                neu_count += 1.0;
            }
        }
        let total = pos_sum + neg_sum.abs() + neu_count;
        let (pos, neg, neu) = if total > 0.0 {
            (pos_sum / total, neg_sum.abs() / total, neu_count / total)
        } else {
            (0.0, 0.0, 1.0)
        };

        Ok(Sentiment {
            pos: round3(pos),
            neu: round3(neu),
            neg: round3(neg),
            compound: round4(compound),
        })
    }
}

fn round3(x: f64) -> f64 {
    (x * 1_000.0).round() / 1_000.0
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Alphanumeric tokens (apostrophes kept so "isn't" survives), lower-cased.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
            | "without"
            | "nor"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_and_negative_text_have_opposite_compound() {
        let s = LexiconScorer::new();
        let good = s.polarity_scores("What a great and happy day").unwrap();
        let bad = s.polarity_scores("This is a terrible, awful mess").unwrap();
        assert!(good.compound > 0.3, "{good:?}");
        assert!(bad.compound < -0.3, "{bad:?}");
        assert!(good.pos > good.neg);
        assert!(bad.neg > bad.pos);
    }

    #[test]
    fn negation_flips_polarity() {
        let s = LexiconScorer::new();
        let plain = s.polarity_scores("the food was good").unwrap();
        let negated = s.polarity_scores("the food was not good").unwrap();
        assert!(plain.compound > 0.0);
        assert!(negated.compound < 0.0);
    }

    #[test]
    fn exclamations_intensify() {
        let s = LexiconScorer::new();
        let calm = s.polarity_scores("good news").unwrap();
        let loud = s.polarity_scores("good news!!!").unwrap();
        assert!(loud.compound > calm.compound);
    }

    #[test]
    fn neutral_text_scores_zero_compound() {
        let s = LexiconScorer::new();
        let n = s.polarity_scores("the table is in the kitchen").unwrap();
        assert_eq!(n.compound, 0.0);
        assert_eq!(n.neu, 1.0);
    }

    #[test]
    fn proportions_sum_to_one() {
        let s = LexiconScorer::new();
        let r = s.polarity_scores("I love this but hate the ending").unwrap();
        assert!(((r.pos + r.neu + r.neg) - 1.0).abs() < 0.01, "{r:?}");
    }

    #[test]
    fn blank_is_an_error_but_punctuation_is_neutral() {
        let s = LexiconScorer::new();
        assert_eq!(s.polarity_scores("   "), Err(ScoreError::Empty));
        let p = s.polarity_scores("?!...").unwrap();
        assert_eq!(p.compound, 0.0);
        assert_eq!(p.neu, 1.0);
    }

    #[test]
    fn closures_are_scorers() {
        let f = |_: &str| -> Result<Sentiment, ScoreError> {
            Ok(Sentiment {
                compound: 0.5,
                ..Sentiment::default()
            })
        };
        assert_eq!(f.polarity_scores("x").unwrap().compound, 0.5);
    }
}
