//! Substitution report: every non-trivial decision made while assembling a deck.

use std::fmt;

use serde::Serialize;

/// Why a requested entry was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RemovalReason {
    /// No stored name is close enough.
    NoMatch,
    /// Several stored names fit equally well.
    Ambiguous {
        /// The competing names.
        candidates: Vec<String>,
    },
}

/// What happened to one requested entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportOutcome {
    /// Resolved to a different stored name.
    FuzzyMatched {
        /// Stored name used instead.
        resolved_name: String,
        /// Card id used.
        card_id: String,
        /// Match score in `0.0..=1.0`.
        similarity: f64,
    },
    /// More copies were requested than the copy limit allows.
    Trimmed {
        /// Total copies requested across entries.
        requested: u32,
        /// Copies kept.
        kept: u32,
        /// The copy limit.
        limit: u32,
    },
    /// Dropped from the deck.
    Removed {
        /// Why.
        #[serde(flatten)]
        reason: RemovalReason,
    },
}

/// One report line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    /// The requested name (or resolved card name for trims).
    pub requested: String,
    /// The decision taken.
    pub outcome: ReportOutcome,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            ReportOutcome::FuzzyMatched {
                resolved_name,
                similarity,
                ..
            } => write!(
                f,
                "{}: matched to {resolved_name} (similarity {similarity:.2})",
                self.requested
            ),
            ReportOutcome::Trimmed {
                requested,
                kept,
                limit,
            } => write!(
                f,
                "{}: trimmed from {requested} to {kept} (limit {limit})",
                self.requested
            ),
            ReportOutcome::Removed {
                reason: RemovalReason::NoMatch,
            } => write!(f, "{}: removed: no match", self.requested),
            ReportOutcome::Removed {
                reason: RemovalReason::Ambiguous { candidates },
            } => write!(
                f,
                "{}: removed: ambiguous ({})",
                self.requested,
                candidates.join(", ")
            ),
        }
    }
}

/// Ordered list of report entries. Exact matches produce no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubstitutionReport {
    /// Entries in decision order.
    pub entries: Vec<ReportEntry>,
}

impl SubstitutionReport {
    /// True when every request resolved exactly and nothing was trimmed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries that removed a request.
    pub fn removals(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, ReportOutcome::Removed { .. }))
    }

    pub(crate) fn push(&mut self, requested: impl Into<String>, outcome: ReportOutcome) {
        self.entries.push(ReportEntry {
            requested: requested.into(),
            outcome,
        });
    }
}
