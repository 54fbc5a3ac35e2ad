//! Non-fatal conditions collected during a pipeline run.
//!
//! Every diagnostic is logged when recorded and kept in the report returned
//! with the ledger, so totals can be audited after the fact.

use crate::error::{ColumnBoundaryError, SchemaError};
use crate::model::{Category, DateSource};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Coarse classification used for counting and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DiagnosticKind {
    /// A period was dropped because a mandatory column is missing.
    SchemaError,
    /// Club decomposition was skipped for a period.
    ColumnBoundaryError,
    /// A club label had no usable date and fell back to configuration.
    ParseWarning,
    /// Computed totals or counts disagree with a value in the sheet.
    DiscrepancyWarning,
    /// Identity data was ambiguous, inconsistent or unavailable.
    IdentityWarning,
    /// A cell or row could not be used as-is.
    DataWarning,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::SchemaError => "SchemaError",
            DiagnosticKind::ColumnBoundaryError => "ColumnBoundaryError",
            DiagnosticKind::ParseWarning => "ParseWarning",
            DiagnosticKind::DiscrepancyWarning => "DiscrepancyWarning",
            DiagnosticKind::IdentityWarning => "IdentityWarning",
            DiagnosticKind::DataWarning => "DataWarning",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    PeriodSkipped(SchemaError),
    /// The period source could not be read at all.
    SourceUnreadable {
        period: String,
        error: String,
    },
    ClubDecompositionSkipped(ColumnBoundaryError),
    /// The configured roster could not be loaded; the run continues without it.
    RosterUnreadable {
        path: String,
        error: String,
    },
    UndatedActivity {
        period: String,
        label: String,
        fallback: NaiveDate,
        source: DateSource,
    },
    InvalidActivityDate {
        period: String,
        label: String,
        token: String,
    },
    TotalDiscrepancy {
        period: String,
        participant: String,
        computed: f64,
        source: f64,
    },
    CountConflict {
        period: String,
        participant: String,
        category: Category,
        derived: u32,
        reported: u32,
    },
    ColumnLayoutMismatch {
        period: String,
        category: Category,
        matched_column: String,
        matched_index: usize,
        expected_index: usize,
    },
    InvalidCell {
        period: String,
        row: usize,
        column: String,
        value: String,
    },
    AmbiguousIdentity {
        period: String,
        name: String,
        candidate_ids: Vec<String>,
    },
    NameMismatch {
        period: String,
        id: String,
        known_name: String,
        seen_name: String,
    },
    DuplicateRow {
        period: String,
        participant: String,
    },
    UnknownGender {
        participant: String,
    },
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::PeriodSkipped(_) | Diagnostic::SourceUnreadable { .. } => {
                DiagnosticKind::SchemaError
            }
            Diagnostic::ClubDecompositionSkipped(_) => DiagnosticKind::ColumnBoundaryError,
            Diagnostic::UndatedActivity { .. } | Diagnostic::InvalidActivityDate { .. } => {
                DiagnosticKind::ParseWarning
            }
            Diagnostic::TotalDiscrepancy { .. } | Diagnostic::CountConflict { .. } => {
                DiagnosticKind::DiscrepancyWarning
            }
            Diagnostic::AmbiguousIdentity { .. }
            | Diagnostic::RosterUnreadable { .. }
            | Diagnostic::NameMismatch { .. }
            | Diagnostic::UnknownGender { .. } => DiagnosticKind::IdentityWarning,
            Diagnostic::ColumnLayoutMismatch { .. }
            | Diagnostic::InvalidCell { .. }
            | Diagnostic::DuplicateRow { .. } => DiagnosticKind::DataWarning,
        }
    }

    /// Period the diagnostic belongs to, if any.
    pub fn period(&self) -> Option<&str> {
        match self {
            Diagnostic::PeriodSkipped(e) => Some(&e.period),
            Diagnostic::ClubDecompositionSkipped(e) => Some(&e.period),
            Diagnostic::SourceUnreadable { period, .. }
            | Diagnostic::UndatedActivity { period, .. }
            | Diagnostic::InvalidActivityDate { period, .. }
            | Diagnostic::TotalDiscrepancy { period, .. }
            | Diagnostic::CountConflict { period, .. }
            | Diagnostic::ColumnLayoutMismatch { period, .. }
            | Diagnostic::InvalidCell { period, .. }
            | Diagnostic::AmbiguousIdentity { period, .. }
            | Diagnostic::NameMismatch { period, .. }
            | Diagnostic::DuplicateRow { period, .. } => Some(period),
            Diagnostic::RosterUnreadable { .. } | Diagnostic::UnknownGender { .. } => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::PeriodSkipped(e) => write!(f, "{} (period skipped)", e),
            Diagnostic::SourceUnreadable { period, error } => {
                write!(f, "period '{}': source unreadable: {} (period skipped)", period, error)
            }
            Diagnostic::ClubDecompositionSkipped(e) => {
                write!(f, "{} (club activities not decomposed)", e)
            }
            Diagnostic::RosterUnreadable { path, error } => write!(
                f,
                "roster {} unreadable: {} (ids, gender and department come from period sheets only)",
                path, error
            ),
            Diagnostic::UndatedActivity {
                period,
                label,
                fallback,
                source,
            } => {
                let origin = match source {
                    DateSource::LabelOverride => "label override",
                    _ => "period default",
                };
                write!(
                    f,
                    "period '{}': activity column '{}' has no date, using {} {}",
                    period,
                    label,
                    origin,
                    fallback.format("%Y/%m/%d")
                )
            }
            Diagnostic::InvalidActivityDate {
                period,
                label,
                token,
            } => write!(
                f,
                "period '{}': activity column '{}' has invalid date '{}'",
                period, label, token
            ),
            Diagnostic::TotalDiscrepancy {
                period,
                participant,
                computed,
                source,
            } => write!(
                f,
                "period '{}': {} computed total {} differs from sheet total {} (diff {:+})",
                period,
                participant,
                computed,
                source,
                computed - source
            ),
            Diagnostic::CountConflict {
                period,
                participant,
                category,
                derived,
                reported,
            } => write!(
                f,
                "period '{}': {} {} count derived {} but sheet reports {}",
                period, participant, category, derived, reported
            ),
            Diagnostic::ColumnLayoutMismatch {
                period,
                category,
                matched_column,
                matched_index,
                expected_index,
            } => write!(
                f,
                "period '{}': {} column '{}' found at index {}, expected offset {} (name match used)",
                period, category, matched_column, matched_index, expected_index
            ),
            Diagnostic::InvalidCell {
                period,
                row,
                column,
                value,
            } => write!(
                f,
                "period '{}': row {} column '{}' has unusable value '{}', treated as 0",
                period, row, column, value
            ),
            Diagnostic::AmbiguousIdentity {
                period,
                name,
                candidate_ids,
            } => write!(
                f,
                "period '{}': name '{}' matches several candidate identities ({}), not merged",
                period,
                name,
                candidate_ids.join(", ")
            ),
            Diagnostic::NameMismatch {
                period,
                id,
                known_name,
                seen_name,
            } => write!(
                f,
                "period '{}': id {} recorded as '{}' but earlier as '{}'",
                period, id, seen_name, known_name
            ),
            Diagnostic::DuplicateRow {
                period,
                participant,
            } => write!(
                f,
                "period '{}': {} appears on more than one row, rows summed",
                period, participant
            ),
            Diagnostic::UnknownGender { participant } => {
                write!(f, "{} has no recognized gender and is not ranked", participant)
            }
        }
    }
}

/// Ordered collection of diagnostics for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}: {}", diagnostic.kind().as_str(), diagnostic);
        self.entries.push(diagnostic);
    }

    /// Append another report, keeping its order. Entries were already logged.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind() == kind).count()
    }

    pub fn counts_by_kind(&self) -> BTreeMap<DiagnosticKind, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.entries {
            *counts.entry(d.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Ids of periods that were dropped entirely.
    pub fn skipped_periods(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|d| match d {
                Diagnostic::PeriodSkipped(e) => Some(e.period.as_str()),
                Diagnostic::SourceUnreadable { period, .. } => Some(period.as_str()),
                _ => None,
            })
            .collect()
    }
}
