//! Activity Leaderboard
//!
//! Turns periodic activity-score spreadsheet exports into per-participant
//! totals and gender-separated prize leaderboards.
//!
//! This library provides:
//! - `extract` / `club`: per-period score extraction and club activity decomposition
//! - `aggregate`: identity-resolved cross-period totals
//! - `ranking`: dense rankings, prize tiers and the eligibility gate
//! - `stats`: corpus-wide statistics
//! - `pipeline`: the end-to-end run returning an immutable snapshot
//! - `report`: CSV, text, JSON and XLSX output
//!
//! Binaries:
//! - `leaderboard`: command-line front end

pub mod aggregate;
pub mod club;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod ranking;
pub mod report;
pub mod roster;
pub mod stats;
pub mod table;

pub use config::CompetitionConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{LeaderboardError, Result};
pub use model::{AggregatedParticipant, Category, Gender};
pub use pipeline::{run, run_with_tables, LeaderboardSnapshot};
pub use ranking::{Leaderboard, PrizeStatus, RankedEntry};
