//! Corpus-wide statistics, recomputed from a participant snapshot on every call.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::model::{AggregatedParticipant, Category, Gender};
use serde::Serialize;
use std::collections::BTreeMap;

/// Upper bounds (inclusive) of the score bands; anything above the last goes to `500+`.
const BAND_UPPER_BOUNDS: [f64; 5] = [100.0, 200.0, 300.0, 400.0, 500.0];
pub const BAND_LABELS: [&str; 6] = ["0-100", "101-200", "201-300", "301-400", "401-500", "500+"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: Category,
    pub total_score: f64,
    pub total_count: u64,
    /// Distinct participants with a nonzero score or count in this category.
    pub participants: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

impl ScoreSummary {
    fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        Self {
            mean: Some(scores.iter().sum::<f64>() / scores.len() as f64),
            max: scores.iter().copied().reduce(f64::max),
            min: scores.iter().copied().reduce(f64::min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentStats {
    pub department: String,
    pub gender: Gender,
    pub participants: usize,
    pub mean_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardStats {
    pub participant_count: usize,
    pub gender_counts: BTreeMap<Gender, usize>,
    pub categories: Vec<CategoryStats>,
    pub score: ScoreSummary,
    /// Share of participants with a body-fat upload, over those seen in a
    /// period that tracks uploads. `None` when no period does.
    pub completion_rate: Option<f64>,
    /// Counts per band, indexed like [`BAND_LABELS`].
    pub score_bands: BTreeMap<Gender, [usize; 6]>,
    pub departments: Vec<DepartmentStats>,
    pub diagnostics: BTreeMap<DiagnosticKind, usize>,
}

/// Index into [`BAND_LABELS`]. Zero is placed in the first band.
pub fn score_band(score: f64) -> usize {
    BAND_UPPER_BOUNDS
        .iter()
        .position(|upper| score <= *upper)
        .unwrap_or(BAND_UPPER_BOUNDS.len())
}

impl LeaderboardStats {
    pub fn compute(participants: &[AggregatedParticipant], diagnostics: &Diagnostics) -> Self {
        let mut gender_counts = BTreeMap::new();
        let mut score_bands: BTreeMap<Gender, [usize; 6]> = BTreeMap::new();
        let mut by_department: BTreeMap<(String, Gender), Vec<f64>> = BTreeMap::new();

        for p in participants {
            let gender = p.identity.gender;
            *gender_counts.entry(gender).or_insert(0) += 1;
            score_bands.entry(gender).or_insert([0; 6])[score_band(p.total_score)] += 1;
            let department = p
                .identity
                .department
                .clone()
                .unwrap_or_else(|| "(none)".to_string());
            by_department
                .entry((department, gender))
                .or_default()
                .push(p.total_score);
        }

        let categories = Category::ALL
            .iter()
            .map(|&category| CategoryStats {
                category,
                total_score: participants.iter().map(|p| p.category(category).score).sum(),
                total_count: participants
                    .iter()
                    .map(|p| p.category(category).count as u64)
                    .sum(),
                participants: participants
                    .iter()
                    .filter(|p| p.has_activity(category))
                    .count(),
            })
            .collect();

        let scores: Vec<f64> = participants.iter().map(|p| p.total_score).collect();

        let uploads: Vec<bool> = participants
            .iter()
            .filter_map(|p| p.body_fat_uploaded())
            .collect();
        let completion_rate = if uploads.is_empty() {
            None
        } else {
            Some(uploads.iter().filter(|&&done| done).count() as f64 / uploads.len() as f64)
        };

        let departments = by_department
            .into_iter()
            .map(|((department, gender), scores)| DepartmentStats {
                department,
                gender,
                participants: scores.len(),
                mean_score: scores.iter().sum::<f64>() / scores.len() as f64,
            })
            .collect();

        Self {
            participant_count: participants.len(),
            gender_counts,
            categories,
            score: ScoreSummary::from_scores(&scores),
            completion_rate,
            score_bands,
            departments,
            diagnostics: diagnostics.counts_by_kind(),
        }
    }

    pub fn gender_count(&self, gender: Gender) -> usize {
        self.gender_counts.get(&gender).copied().unwrap_or(0)
    }

    pub fn category(&self, category: Category) -> Option<&CategoryStats> {
        self.categories.iter().find(|c| c.category == category)
    }
}
