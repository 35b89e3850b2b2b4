//! Fuzzy resolution of a requested name against the distinct stored names.
//!
//! Resolution is a pure function of the request and the name list, so the
//! same store contents always give the same answer.

use std::cmp::Ordering;

/// Minimum normalized request length for the substring fallback.
pub const MIN_SUBSTRING_LEN: usize = 4;

/// Maximum candidates listed for an ambiguous request.
pub const MAX_AMBIGUOUS_CANDIDATES: usize = 5;

/// A distinct stored card name and its lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    /// Normalized key (see [`crate::store::name_key`]).
    pub key: String,
    /// Display name.
    pub name: String,
}

/// How a request was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// One confident match.
    Matched {
        /// The matched entry.
        entry: NameEntry,
        /// Score in `0.0..=1.0`.
        similarity: f64,
    },
    /// Several names fit equally well.
    Ambiguous {
        /// Closest names, best first.
        candidates: Vec<String>,
    },
    /// Nothing fits.
    NoMatch,
}

/// Thresholds for [`resolve_name`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyPolicy {
    /// Minimum similarity for a fuzzy match.
    pub threshold: f64,
    /// Minimum lead of the best score over the runner-up.
    pub margin: f64,
}

/// Resolves `request_key` (already normalized) against `names`.
///
/// 1. Best `normalized_levenshtein` score, if at or above the threshold and
///    ahead of the runner-up by at least the margin.
/// 2. Otherwise the single stored name containing the request, if the request
///    is long enough and exactly one name contains it.
/// 3. Several containing names, or a close runner-up above the threshold,
///    make the request ambiguous. Anything else is no match.
#[must_use]
pub fn resolve_name(request_key: &str, names: &[NameEntry], policy: FuzzyPolicy) -> Resolution {
    if request_key.is_empty() || names.is_empty() {
        return Resolution::NoMatch;
    }

    let mut scored: Vec<(f64, &NameEntry)> = names
        .iter()
        .map(|entry| (fuzzy_similarity(request_key, &entry.key), entry))
        .collect();
    scored.sort_by(compare_scored);

    let mut close_candidates = Vec::new();
    if let Some(&(best, best_entry)) = scored.first()
        && best >= policy.threshold
    {
        let contenders: Vec<&NameEntry> = scored
            .iter()
            .take_while(|(score, _)| best - score < policy.margin)
            .map(|(_, entry)| *entry)
            .collect();
        if contenders.len() == 1 {
            return Resolution::Matched {
                entry: best_entry.clone(),
                similarity: best,
            };
        }
        close_candidates = contenders
            .into_iter()
            .map(|entry| entry.name.clone())
            .collect();
    }

    if request_key.chars().count() >= MIN_SUBSTRING_LEN {
        let containing: Vec<&NameEntry> = names
            .iter()
            .filter(|entry| entry.key.contains(request_key))
            .collect();
        match containing.as_slice() {
            [single] => {
                return Resolution::Matched {
                    entry: (*single).clone(),
                    similarity: length_ratio(request_key, &single.key),
                };
            }
            [] => {}
            several => {
                let mut candidates: Vec<&NameEntry> = several.to_vec();
                candidates.sort_by(|a, b| {
                    a.key
                        .chars()
                        .count()
                        .cmp(&b.key.chars().count())
                        .then_with(|| a.key.cmp(&b.key))
                });
                return Resolution::Ambiguous {
                    candidates: candidates
                        .into_iter()
                        .take(MAX_AMBIGUOUS_CANDIDATES)
                        .map(|entry| entry.name.clone())
                        .collect(),
                };
            }
        }
    }

    if close_candidates.is_empty() {
        Resolution::NoMatch
    } else {
        close_candidates.truncate(MAX_AMBIGUOUS_CANDIDATES);
        Resolution::Ambiguous {
            candidates: close_candidates,
        }
    }
}

/// Similarity between two normalized names.
#[must_use]
pub fn fuzzy_similarity(request_key: &str, stored_key: &str) -> f64 {
    strsim::normalized_levenshtein(request_key, stored_key)
}

#[allow(clippy::cast_precision_loss)]
fn length_ratio(request_key: &str, stored_key: &str) -> f64 {
    let stored = stored_key.chars().count();
    if stored == 0 {
        return 0.0;
    }
    (request_key.chars().count() as f64 / stored as f64).clamp(0.0, 1.0)
}

/// Best score first; equal scores by key so ordering never depends on input order.
fn compare_scored(left: &(f64, &NameEntry), right: &(f64, &NameEntry)) -> Ordering {
    right
        .0
        .partial_cmp(&left.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| left.1.key.cmp(&right.1.key))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::name_key;

    const POLICY: FuzzyPolicy = FuzzyPolicy {
        threshold: 0.85,
        margin: 0.05,
    };

    fn names(list: &[&str]) -> Vec<NameEntry> {
        list.iter()
            .map(|name| NameEntry {
                key: name_key(name),
                name: (*name).to_string(),
            })
            .collect()
    }

    fn matched_name(resolution: &Resolution) -> Option<&str> {
        match resolution {
            Resolution::Matched { entry, .. } => Some(entry.name.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_fuzzy_match_single_typo() {
        let store = names(&["Lightning Bolt", "Lightning Helix", "Shock"]);
        let resolution = resolve_name("lightnin bolt", &store, POLICY);
        assert_eq!(matched_name(&resolution), Some("Lightning Bolt"));
        if let Resolution::Matched { similarity, .. } = resolution {
            assert!(similarity >= 0.85);
        }
    }

    #[test]
    fn test_close_runner_up_is_ambiguous() {
        let store = names(&["Goblin Guide", "Goblin Guida"]);
        let resolution = resolve_name("goblin guid", &store, POLICY);
        assert_eq!(
            resolution,
            Resolution::Ambiguous {
                candidates: vec!["Goblin Guida".to_string(), "Goblin Guide".to_string()]
            }
        );
    }

    #[test]
    fn test_unique_substring_fallback() {
        let store = names(&["Lightning Bolt", "Shock"]);
        let resolution = resolve_name("bolt", &store, POLICY);
        assert_eq!(matched_name(&resolution), Some("Lightning Bolt"));
        if let Resolution::Matched { similarity, .. } = resolution {
            assert!((similarity - 4.0 / 14.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_several_substrings_are_ambiguous() {
        let store = names(&["Lightning Bolt", "Lightning Helix", "Shock"]);
        let resolution = resolve_name("lightning", &store, POLICY);
        assert_eq!(
            resolution,
            Resolution::Ambiguous {
                candidates: vec!["Lightning Bolt".to_string(), "Lightning Helix".to_string()]
            }
        );
    }

    #[test]
    fn test_short_request_does_not_use_substring() {
        let store = names(&["Opt", "Shock"]);
        assert_eq!(resolve_name("hoc", &store, POLICY), Resolution::NoMatch);
    }

    #[test]
    fn test_no_match() {
        let store = names(&["Lightning Bolt"]);
        assert_eq!(resolve_name("black lotus", &store, POLICY), Resolution::NoMatch);
        assert_eq!(resolve_name("", &store, POLICY), Resolution::NoMatch);
        assert_eq!(resolve_name("bolt", &[], POLICY), Resolution::NoMatch);
    }

    #[test]
    fn test_resolution_independent_of_input_order() {
        let forward = names(&["Goblin Guide", "Goblin Guida", "Shock"]);
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(
            resolve_name("goblin guid", &forward, POLICY),
            resolve_name("goblin guid", &backward, POLICY)
        );
    }
}
