//! Ranking engine: per-gender leaderboards with tier tables and an eligibility gate.

use crate::config::{PrizeTables, PrizeTier};
use crate::model::{AggregatedParticipant, Gender, SCORE_EPSILON};
use serde::Serialize;

/// Why a participant inside the prize range receives nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum IneligibleReason {
    ScoreBelowThreshold { threshold: f64 },
}

impl IneligibleReason {
    pub fn code(&self) -> &'static str {
        match self {
            IneligibleReason::ScoreBelowThreshold { .. } => "score_below_threshold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrizeStatus {
    Awarded { amount: u64, tier: PrizeTier },
    /// Rank falls inside `tier` but the gate refused the prize.
    Ineligible {
        reason: IneligibleReason,
        tier: PrizeTier,
    },
    /// Rank is beyond the last configured tier.
    NotInPrizeRange,
}

impl PrizeStatus {
    pub fn amount(&self) -> Option<u64> {
        match self {
            PrizeStatus::Awarded { amount, .. } => Some(*amount),
            _ => None,
        }
    }

    /// Tier the rank falls in, whether or not the prize was paid.
    pub fn tier(&self) -> Option<&PrizeTier> {
        match self {
            PrizeStatus::Awarded { tier, .. } | PrizeStatus::Ineligible { tier, .. } => Some(tier),
            PrizeStatus::NotInPrizeRange => None,
        }
    }

    pub fn is_awarded(&self) -> bool {
        matches!(self, PrizeStatus::Awarded { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            PrizeStatus::Awarded { .. } => "awarded",
            PrizeStatus::Ineligible { reason, .. } => reason.code(),
            PrizeStatus::NotInPrizeRange => "not_in_prize_range",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry<'a> {
    pub rank: u32,
    pub participant: &'a AggregatedParticipant,
    pub prize: PrizeStatus,
}

impl RankedEntry<'_> {
    pub fn name(&self) -> &str {
        &self.participant.identity.name
    }

    pub fn department(&self) -> &str {
        self.participant.identity.department.as_deref().unwrap_or("")
    }

    pub fn total_score(&self) -> f64 {
        self.participant.total_score
    }

    /// Tier icon, empty outside the prize range.
    pub fn icon(&self) -> &str {
        self.prize.tier().map(|t| t.icon.as_str()).unwrap_or("")
    }
}

/// Map a rank through the tier table and the optional score gate.
pub fn prize_for(rank: u32, score: f64, tiers: &[PrizeTier], threshold: Option<f64>) -> PrizeStatus {
    let Some(tier) = tiers.iter().find(|t| t.contains(rank)) else {
        return PrizeStatus::NotInPrizeRange;
    };
    match threshold {
        Some(threshold) if score + SCORE_EPSILON < threshold => PrizeStatus::Ineligible {
            reason: IneligibleReason::ScoreBelowThreshold { threshold },
            tier: tier.clone(),
        },
        _ => PrizeStatus::Awarded {
            amount: tier.amount,
            tier: tier.clone(),
        },
    }
}

/// Rank one partition.
///
/// The sort is stable, so equal scores keep their input order. Ranks are
/// dense positions `1..=N`.
pub fn rank_partition<'a, I>(
    participants: I,
    tiers: &[PrizeTier],
    threshold: Option<f64>,
) -> Vec<RankedEntry<'a>>
where
    I: IntoIterator<Item = &'a AggregatedParticipant>,
{
    let mut sorted: Vec<&AggregatedParticipant> = participants.into_iter().collect();
    sorted.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, participant)| {
            let rank = i as u32 + 1;
            RankedEntry {
                rank,
                participant,
                prize: prize_for(rank, participant.total_score, tiers, threshold),
            }
        })
        .collect()
}

/// The ranked list of one gender partition.
#[derive(Debug, Clone)]
pub struct RankedTable<'a> {
    pub gender: Gender,
    pub entries: Vec<RankedEntry<'a>>,
    tiers: &'a [PrizeTier],
}

impl<'a> RankedTable<'a> {
    pub fn new(
        gender: Gender,
        participants: &'a [AggregatedParticipant],
        tiers: &'a [PrizeTier],
        threshold: Option<f64>,
    ) -> Self {
        let members = participants.iter().filter(|p| p.identity.gender == gender);
        Self {
            gender,
            entries: rank_partition(members, tiers, threshold),
            tiers,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `None` for rank 0 or a rank beyond the partition size.
    pub fn entry_at_rank(&self, rank: u32) -> Option<&RankedEntry<'a>> {
        let index = (rank as usize).checked_sub(1)?;
        self.entries.get(index)
    }

    /// Points behind the next-better rank; 0 for rank 1.
    pub fn score_gap_to_previous(&self, rank: u32) -> Option<f64> {
        let entry = self.entry_at_rank(rank)?;
        match rank {
            1 => Some(0.0),
            _ => {
                let previous = self.entry_at_rank(rank - 1)?;
                Some(previous.total_score() - entry.total_score())
            }
        }
    }

    pub fn top_n(&self, n: usize) -> &[RankedEntry<'a>] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn prize_winners(&self) -> impl Iterator<Item = &RankedEntry<'a>> {
        self.entries.iter().filter(|e| e.prize.is_awarded())
    }

    pub fn total_prize_amount(&self) -> u64 {
        self.prize_winners().filter_map(|e| e.prize.amount()).sum()
    }

    /// Last rank covered by the tier table.
    pub fn last_prize_rank(&self) -> Option<u32> {
        self.tiers.iter().map(|t| t.to).max()
    }

    /// Score at the last prize rank, `None` when the partition is smaller than the prize range.
    pub fn prize_cutoff_score(&self) -> Option<f64> {
        let rank = self.last_prize_rank()?;
        self.entry_at_rank(rank).map(|e| e.total_score())
    }

    /// Case-insensitive substring match on name.
    pub fn search(&self, needle: &str) -> Vec<&RankedEntry<'a>> {
        let needle = needle.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.name().to_lowercase().contains(&needle))
            .collect()
    }

    pub fn filter_department(&self, department: &str) -> Vec<&RankedEntry<'a>> {
        self.entries
            .iter()
            .filter(|e| e.department() == department)
            .collect()
    }
}

/// Result of looking a person up across partitions.
#[derive(Debug, Clone)]
pub struct PersonRanking<'t, 'a> {
    pub entry: &'t RankedEntry<'a>,
    pub gender: Gender,
    pub partition_size: usize,
}

/// Both gender leaderboards over one participant snapshot.
#[derive(Debug, Clone)]
pub struct Leaderboard<'a> {
    pub female: RankedTable<'a>,
    pub male: RankedTable<'a>,
    unranked: Vec<&'a AggregatedParticipant>,
}

impl<'a> Leaderboard<'a> {
    pub fn build(
        participants: &'a [AggregatedParticipant],
        tables: &'a PrizeTables,
        threshold: Option<f64>,
    ) -> Self {
        let table = |gender| RankedTable::new(gender, participants, tables.for_gender(gender), threshold);
        let board = Self {
            female: table(Gender::Female),
            male: table(Gender::Male),
            unranked: participants
                .iter()
                .filter(|p| p.identity.gender == Gender::Unknown)
                .collect(),
        };
        log::info!(
            "Ranked {} female, {} male, {} without gender",
            board.female.len(),
            board.male.len(),
            board.unranked.len()
        );
        board
    }

    /// `None` for the unranked partition.
    pub fn partition(&self, gender: Gender) -> Option<&RankedTable<'a>> {
        match gender {
            Gender::Female => Some(&self.female),
            Gender::Male => Some(&self.male),
            Gender::Unknown => None,
        }
    }

    pub fn tables(&self) -> [&RankedTable<'a>; 2] {
        [&self.female, &self.male]
    }

    /// Participants left out of ranking for lack of a gender.
    pub fn unranked(&self) -> &[&'a AggregatedParticipant] {
        &self.unranked
    }

    /// Exact (trimmed) name lookup; the first match in display order wins.
    pub fn find_person(&self, name: &str) -> Option<PersonRanking<'_, 'a>> {
        let name = name.trim();
        self.tables().into_iter().find_map(|table| {
            table
                .entries
                .iter()
                .find(|e| e.name() == name)
                .map(|entry| PersonRanking {
                    entry,
                    gender: table.gender,
                    partition_size: table.len(),
                })
        })
    }

    pub fn search(&self, needle: &str) -> Vec<(Gender, &RankedEntry<'a>)> {
        self.tables()
            .into_iter()
            .flat_map(|t| t.search(needle).into_iter().map(move |e| (t.gender, e)))
            .collect()
    }
}
