//! Pipeline functions for programmatic use by the CLI and library callers.
//!
//! One call reads every period, extracts and aggregates, and returns an
//! immutable [`LeaderboardSnapshot`]. Reloading means calling again and
//! dropping the old snapshot.

use crate::aggregate::aggregate;
use crate::config::{CompetitionConfig, PeriodConfig};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{LeaderboardError, Result};
use crate::extract::{extract_period, PeriodExtract};
use crate::model::AggregatedParticipant;
use crate::ranking::Leaderboard;
use crate::roster::Roster;
use crate::stats::LeaderboardStats;
use crate::table::PeriodTable;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt::Write;

/// The aggregated ledger of one run plus everything that went wrong on the way.
#[derive(Debug, Clone)]
pub struct LeaderboardSnapshot {
    /// Participants in order of first appearance, periods taken by id.
    pub participants: Vec<AggregatedParticipant>,
    pub diagnostics: Diagnostics,
    /// Ids of periods that contributed data.
    pub periods_loaded: Vec<String>,
    /// Ids of periods dropped entirely.
    pub periods_failed: Vec<String>,
}

enum PeriodOutcome {
    Extracted(PeriodExtract),
    Skipped { period: String, reason: Diagnostic },
}

/// Read every configured period source and the roster, then aggregate.
///
/// A period that cannot be read or whose layout cannot be resolved is
/// skipped and reported, and so is a roster that cannot be read. Fails only
/// when no participant survives.
pub fn run(config: &CompetitionConfig) -> Result<LeaderboardSnapshot> {
    let mut diagnostics = Diagnostics::new();
    let roster = match &config.roster {
        Some(path) => match Roster::read(path) {
            Ok(roster) => Some(roster),
            Err(e) => {
                diagnostics.push(Diagnostic::RosterUnreadable {
                    path: path.display().to_string(),
                    error: e.to_string(),
                });
                None
            }
        },
        None => None,
    };

    let periods = sorted_periods(config);
    let outcomes: Vec<PeriodOutcome> = periods
        .par_iter()
        .map(|period| {
            let table = PeriodTable::read(&period.source, &period.id, period.sheet.as_deref());
            process_period(config, period, table)
        })
        .collect();

    build_snapshot(outcomes, roster.as_ref(), diagnostics)
}

/// Same as [`run`], with tables already in memory. Tables are matched to
/// periods by their `period` field.
pub fn run_with_tables(
    config: &CompetitionConfig,
    tables: Vec<PeriodTable>,
    roster: Option<&Roster>,
) -> Result<LeaderboardSnapshot> {
    let mut by_period: HashMap<String, PeriodTable> =
        tables.into_iter().map(|t| (t.period.clone(), t)).collect();

    let sources: Vec<(&PeriodConfig, Result<PeriodTable>)> = sorted_periods(config)
        .into_iter()
        .map(|period| {
            let table = by_period.remove(&period.id).ok_or_else(|| {
                LeaderboardError::Config(format!("no table supplied for period '{}'", period.id))
            });
            (period, table)
        })
        .collect();

    let outcomes: Vec<PeriodOutcome> = sources
        .into_par_iter()
        .map(|(period, table)| process_period(config, period, table))
        .collect();

    build_snapshot(outcomes, roster, Diagnostics::new())
}

// Aggregation order must not depend on the order periods are listed in.
fn sorted_periods(config: &CompetitionConfig) -> Vec<&PeriodConfig> {
    let mut periods: Vec<&PeriodConfig> = config.periods.iter().collect();
    periods.sort_by(|a, b| a.id.cmp(&b.id));
    periods
}

fn process_period(
    config: &CompetitionConfig,
    period: &PeriodConfig,
    table: Result<PeriodTable>,
) -> PeriodOutcome {
    let table = match table {
        Ok(table) => table,
        Err(e) => {
            return PeriodOutcome::Skipped {
                period: period.id.clone(),
                reason: Diagnostic::SourceUnreadable {
                    period: period.id.clone(),
                    error: e.to_string(),
                },
            }
        }
    };
    match extract_period(&table, period, config.year, &config.divisors) {
        Ok(extract) => PeriodOutcome::Extracted(extract),
        Err(e) => PeriodOutcome::Skipped {
            period: period.id.clone(),
            reason: Diagnostic::PeriodSkipped(e),
        },
    }
}

fn build_snapshot(
    outcomes: Vec<PeriodOutcome>,
    roster: Option<&Roster>,
    mut diagnostics: Diagnostics,
) -> Result<LeaderboardSnapshot> {
    let periods_total = outcomes.len();
    let mut extracts = Vec::new();
    let mut periods_loaded = Vec::new();
    let mut periods_failed = Vec::new();

    for outcome in outcomes {
        match outcome {
            PeriodOutcome::Extracted(mut extract) => {
                diagnostics.extend(std::mem::take(&mut extract.diagnostics));
                periods_loaded.push(extract.period.clone());
                extracts.push(extract);
            }
            PeriodOutcome::Skipped { period, reason } => {
                diagnostics.push(reason);
                periods_failed.push(period);
            }
        }
    }

    let (participants, aggregate_diagnostics) = aggregate(extracts, roster);
    diagnostics.extend(aggregate_diagnostics);

    if participants.is_empty() {
        return Err(LeaderboardError::NoParticipantData {
            periods_failed: periods_failed.len(),
            periods_total,
        });
    }

    log::info!(
        "Snapshot ready: {} participants from {} of {} periods, {} diagnostics",
        participants.len(),
        periods_loaded.len(),
        periods_total,
        diagnostics.len()
    );
    Ok(LeaderboardSnapshot {
        participants,
        diagnostics,
        periods_loaded,
        periods_failed,
    })
}

impl LeaderboardSnapshot {
    /// Rank both partitions with the configured tier tables and threshold.
    pub fn leaderboard<'a>(&'a self, config: &'a CompetitionConfig) -> Leaderboard<'a> {
        Leaderboard::build(
            &self.participants,
            &config.prize_tables,
            config.eligibility_threshold,
        )
    }

    pub fn stats(&self) -> LeaderboardStats {
        LeaderboardStats::compute(&self.participants, &self.diagnostics)
    }

    /// Exact (trimmed) name match, including participants without a gender.
    pub fn participant(&self, name: &str) -> Option<&AggregatedParticipant> {
        let name = name.trim();
        self.participants.iter().find(|p| p.identity.name == name)
    }

    /// One-paragraph run summary followed by every diagnostic.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Loaded {} participants from {} period(s); {} period(s) skipped",
            self.participants.len(),
            self.periods_loaded.len(),
            self.periods_failed.len()
        );
        for (kind, count) in self.diagnostics.counts_by_kind() {
            let _ = writeln!(out, "  {:<20} {:>5}", kind.as_str(), count);
        }
        if !self.diagnostics.is_empty() {
            let _ = writeln!(out);
            for diagnostic in self.diagnostics.iter() {
                let _ = writeln!(out, "[{}] {}", diagnostic.kind().as_str(), diagnostic);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_without_roster() -> CompetitionConfig {
        let mut config = CompetitionConfig::default();
        config.roster = None;
        config
    }

    fn table(period: &str, csv: &str) -> PeriodTable {
        PeriodTable::parse_csv(csv, period).unwrap()
    }

    #[test]
    fn test_missing_table_isolated() {
        let config = config_without_roster();
        let tables = vec![table(
            "0831-0921",
            "name,gender,exercise,diet,bonus,total\nChen,F,10,0,0,10\n",
        )];
        let snapshot = run_with_tables(&config, tables, None).unwrap();
        assert_eq!(snapshot.periods_loaded, vec!["0831-0921"]);
        assert_eq!(snapshot.periods_failed, vec!["0808-0830"]);
        assert_eq!(snapshot.diagnostics.skipped_periods(), vec!["0808-0830"]);
        assert_eq!(snapshot.participants.len(), 1);
        assert!(snapshot.summary().contains("1 period(s) skipped"));
    }

    #[test]
    fn test_no_participants_is_hard_failure() {
        let config = config_without_roster();
        let err = run_with_tables(&config, Vec::new(), None).unwrap_err();
        assert!(matches!(
            err,
            LeaderboardError::NoParticipantData {
                periods_failed: 2,
                periods_total: 2
            }
        ));
    }
}
