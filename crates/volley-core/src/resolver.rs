// Player-name resolution: exact key match first, then approximate matching
// over the distinct player keys.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::DEFAULT_MATCH_THRESHOLD;
use crate::error::EngineError;
use crate::model::{display_names, player_key, Dataset, Row};

/// Length ratio at which the best-window comparison is also tried.
const PARTIAL_LENGTH_RATIO: f64 = 1.5;
/// Above this length ratio partial scores are discounted harder.
const PARTIAL_LONG_RATIO: f64 = 8.0;
const PARTIAL_SCALE: f64 = 0.9;
const PARTIAL_LONG_SCALE: f64 = 0.6;
const TOKEN_SCALE: f64 = 0.95;

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

/// Similarity in [0, 100] between two already case-folded strings.
///
/// The base score is the normalised Levenshtein ratio. Word order is
/// forgiven through the sorted-token and token-set ratios, scaled by 0.95.
/// When one string is at least 1.5x longer than the other, each comparison
/// is made against the best same-length window of the longer string and
/// scaled by 0.9, or by 0.6 once the length ratio exceeds 8.
pub fn similarity(a: &str, b: &str) -> u8 {
    if a == b {
        return 100;
    }
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 || b_len == 0 {
        return 0;
    }

    let base = ratio(a, b);
    let len_ratio = a_len.max(b_len) as f64 / a_len.min(b_len) as f64;

    let best = if len_ratio < PARTIAL_LENGTH_RATIO {
        let sorted = ratio(&sorted_tokens(a), &sorted_tokens(b)) * TOKEN_SCALE;
        let set = token_set_ratio(a, b, ratio) * TOKEN_SCALE;
        base.max(sorted).max(set)
    } else {
        let scale = if len_ratio > PARTIAL_LONG_RATIO {
            PARTIAL_LONG_SCALE
        } else {
            PARTIAL_SCALE
        };
        let partial = partial_ratio(a, b) * scale;
        let sorted = partial_ratio(&sorted_tokens(a), &sorted_tokens(b)) * TOKEN_SCALE * scale;
        let set = token_set_ratio(a, b, partial_ratio) * TOKEN_SCALE * scale;
        base.max(partial).max(sorted).max(set)
    };

    (best * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Levenshtein ratio in [0, 1]; zero when either side is empty.
fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// Best ratio of the shorter string against every same-length window of the
/// longer one.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = short.chars().count();
    if short_len == 0 {
        return 0.0;
    }
    let long_chars: Vec<char> = long.chars().collect();
    if long_chars.len() == short_len {
        return ratio(short, long);
    }
    long_chars
        .windows(short_len)
        .map(|w| {
            let window: String = w.iter().collect();
            ratio(short, &window)
        })
        .fold(0.0_f64, f64::max)
}

fn tokens(s: &str) -> BTreeSet<&str> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

fn sorted_tokens(s: &str) -> String {
    let mut words: Vec<&str> = s
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    words.sort_unstable();
    words.join(" ")
}

/// Compares the shared words against each side's shared-plus-remaining words
/// and keeps the best of the three pairings.
fn token_set_ratio(a: &str, b: &str, score: fn(&str, &str) -> f64) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    let join = |words: Vec<&str>| words.join(" ");

    let shared = join(ta.intersection(&tb).copied().collect());
    let with_rest = |only: Vec<&str>| {
        let rest = join(only);
        format!("{shared} {rest}").trim().to_string()
    };
    let a_full = with_rest(ta.difference(&tb).copied().collect());
    let b_full = with_rest(tb.difference(&ta).copied().collect());

    score(&shared, &a_full)
        .max(score(&shared, &b_full))
        .max(score(&a_full, &b_full))
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// The outcome of a successful resolution: a filtered view over the input
/// rows plus the name to show for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    pub rows: Vec<&'a Row>,
    /// Empty when no filter was requested.
    pub display_name: String,
    pub matched_key: Option<String>,
    /// Similarity of the matched key; 100 for exact matches.
    pub score: Option<u8>,
    pub exact: bool,
}

impl Resolution<'_> {
    pub fn is_filtered(&self) -> bool {
        self.matched_key.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerResolver {
    threshold: u8,
}

impl Default for PlayerResolver {
    fn default() -> Self {
        PlayerResolver::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl PlayerResolver {
    pub fn new(threshold: u8) -> Self {
        PlayerResolver { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// A candidate is accepted iff its score reaches the threshold.
    pub fn accepts(&self, score: u8) -> bool {
        score >= self.threshold
    }

    /// Resolve `query` against the dataset's players.
    ///
    /// Fails with `Schema` if the dataset has no `player_name` column and
    /// with `NoMatch` if no key reaches the threshold. A blank query selects
    /// every row with an empty display name.
    pub fn resolve<'a>(
        &self,
        dataset: &'a Dataset,
        query: Option<&str>,
    ) -> Result<Resolution<'a>, EngineError> {
        if !dataset.schema.has("player_name") {
            return Err(EngineError::Schema {
                column: "player_name".into(),
            });
        }

        let raw = query.unwrap_or("");
        if raw.trim().is_empty() {
            return Ok(Resolution {
                rows: dataset.row_refs(),
                display_name: String::new(),
                matched_key: None,
                score: None,
                exact: false,
            });
        }

        let query_key = player_key(raw);
        let mut keys: Vec<&str> = dataset
            .rows
            .iter()
            .map(|r| r.player_key.as_str())
            .filter(|k| !k.is_empty())
            .collect();
        keys.sort_unstable();
        keys.dedup();

        let (used_key, score, exact) = if keys.binary_search(&query_key.as_str()).is_ok() {
            (query_key.clone(), 100, true)
        } else {
            let (best_key, best_score) = self.best_candidate(&query_key, &keys).ok_or_else(|| {
                EngineError::NoMatch {
                    query: raw.to_string(),
                    closest: None,
                    score: None,
                }
            })?;
            if !self.accepts(best_score) {
                debug!(
                    "rejecting '{}' for query '{}': score {} < {}",
                    best_key, raw, best_score, self.threshold
                );
                return Err(EngineError::NoMatch {
                    query: raw.to_string(),
                    closest: Some(best_key.to_string()),
                    score: Some(best_score),
                });
            }
            info!(
                "no exact player match for '{}', using closest '{}' (score {})",
                raw, best_key, best_score
            );
            (best_key.to_string(), best_score, false)
        };

        let rows: Vec<&Row> = dataset
            .rows
            .iter()
            .filter(|r| r.player_key == used_key)
            .collect();
        let display_name = display_names(rows.iter().copied())
            .remove(&used_key)
            .unwrap_or_else(|| used_key.clone());

        Ok(Resolution {
            rows,
            display_name,
            matched_key: Some(used_key),
            score: Some(score),
            exact,
        })
    }

    /// Highest-scoring key; the first key in sorted order wins ties.
    fn best_candidate<'k>(&self, query_key: &str, keys: &[&'k str]) -> Option<(&'k str, u8)> {
        let mut best: Option<(&'k str, u8)> = None;
        for key in keys {
            let score = similarity(query_key, key);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((*key, score));
            }
        }
        best
    }
}
