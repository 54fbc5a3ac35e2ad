//! Cross-period aggregation.
//!
//! Joins per-period ledger entries into one [`AggregatedParticipant`] per
//! identity. Join precedence is: id on the row, then the roster id for a
//! uniquely rostered name, then a unique name already seen in an earlier
//! period, then the bare trimmed name. A participant first seen by name only
//! takes over the id when one shows up later. Ambiguous joins are flagged and
//! kept apart rather than merged.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::extract::PeriodExtract;
use crate::model::{
    AggregatedParticipant, Gender, IdentityKey, ParticipantIdentity, PeriodLedgerEntry,
    SCORE_EPSILON,
};
use crate::roster::{NameLookup, Roster};
use std::collections::HashMap;

/// Builds the participant set. Participants keep the order in which they
/// were first seen, which is the tie-break order used by ranking.
pub struct Aggregator<'a> {
    roster: Option<&'a Roster>,
    participants: Vec<AggregatedParticipant>,
    by_key: HashMap<IdentityKey, usize>,
    by_name: HashMap<String, Vec<usize>>,
    diagnostics: Diagnostics,
}

impl<'a> Aggregator<'a> {
    pub fn new(roster: Option<&'a Roster>) -> Self {
        Self {
            roster,
            participants: Vec::new(),
            by_key: HashMap::new(),
            by_name: HashMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Add one period's extract. Periods must be added in a stable order.
    pub fn add_period(&mut self, extract: PeriodExtract) {
        for entry in extract.entries {
            self.add_entry(entry);
        }
    }

    pub fn add_entry(&mut self, entry: PeriodLedgerEntry) {
        let identity = self.resolve(&entry);
        let key = identity.key();

        let idx = match self.by_key.get(&key) {
            Some(&idx) => {
                let existing = &mut self.participants[idx].identity;
                if matches!(key, IdentityKey::Id(_)) && existing.name != entry.participant.name {
                    self.diagnostics.push(Diagnostic::NameMismatch {
                        period: entry.period.clone(),
                        id: existing.id.clone().unwrap_or_default(),
                        known_name: existing.name.clone(),
                        seen_name: entry.participant.name.clone(),
                    });
                }
                existing.fill_gaps(&identity);
                idx
            }
            None => match self.adopt_name_keyed(&identity, &key, &entry.period) {
                Some(idx) => idx,
                None => {
                    let idx = self.participants.len();
                    self.by_name
                        .entry(identity.name.clone())
                        .or_default()
                        .push(idx);
                    self.by_key.insert(key, idx);
                    self.participants.push(AggregatedParticipant::new(identity));
                    idx
                }
            },
        };

        let participant = &mut self.participants[idx];
        match participant.per_period.get_mut(&entry.period) {
            Some(existing) => {
                self.diagnostics.push(Diagnostic::DuplicateRow {
                    period: entry.period.clone(),
                    participant: participant.identity.name.clone(),
                });
                existing.absorb(entry);
            }
            None => {
                participant.per_period.insert(entry.period.clone(), entry);
            }
        }
    }

    /// Canonical identity for a row: the roster entry seen first, gaps filled from the row.
    fn resolve(&mut self, entry: &PeriodLedgerEntry) -> ParticipantIdentity {
        let row = &entry.participant;

        if let Some(id) = &row.id {
            let mut identity = self
                .roster
                .and_then(|r| r.by_id(id))
                .cloned()
                .unwrap_or_else(|| row.clone());
            identity.fill_gaps(row);
            return identity;
        }

        if let Some(roster) = self.roster {
            match roster.by_name(&row.name) {
                NameLookup::Unique(rostered) => {
                    let mut identity = rostered.clone();
                    identity.fill_gaps(row);
                    return identity;
                }
                NameLookup::Ambiguous(candidate_ids) => {
                    self.diagnostics.push(Diagnostic::AmbiguousIdentity {
                        period: entry.period.clone(),
                        name: row.name.clone(),
                        candidate_ids,
                    });
                    return row.clone();
                }
                NameLookup::Missing => {}
            }
        }

        // Fall back to a participant already seen under this name in an earlier period.
        match self.by_name.get(&row.name).map(|v| v.as_slice()) {
            Some([only]) => {
                let mut identity = self.participants[*only].identity.clone();
                identity.fill_gaps(row);
                identity
            }
            Some(many) if many.len() > 1 => {
                self.diagnostics.push(Diagnostic::AmbiguousIdentity {
                    period: entry.period.clone(),
                    name: row.name.clone(),
                    candidate_ids: many
                        .iter()
                        .map(|&i| self.participants[i].identity.key().to_string())
                        .collect(),
                });
                row.clone()
            }
            _ => row.clone(),
        }
    }

    /// A first-seen id may belong to a participant known so far only by name.
    /// The sole participant under that name is re-keyed by the id; when the
    /// name is shared the join is ambiguous and nothing is merged.
    fn adopt_name_keyed(
        &mut self,
        identity: &ParticipantIdentity,
        key: &IdentityKey,
        period: &str,
    ) -> Option<usize> {
        if !matches!(key, IdentityKey::Id(_)) {
            return None;
        }
        let same_name = self.by_name.get(&identity.name)?.clone();
        let name_keyed: Vec<usize> = same_name
            .iter()
            .copied()
            .filter(|&i| self.participants[i].identity.id.is_none())
            .collect();

        match (same_name.as_slice(), name_keyed.as_slice()) {
            (_, []) => None,
            ([_], [idx]) => {
                let idx = *idx;
                self.by_key
                    .remove(&IdentityKey::Name(identity.name.clone()));
                self.by_key.insert(key.clone(), idx);
                self.participants[idx].identity.fill_gaps(identity);
                log::debug!("Participant '{}' re-keyed as {}", identity.name, key);
                Some(idx)
            }
            _ => {
                self.diagnostics.push(Diagnostic::AmbiguousIdentity {
                    period: period.to_string(),
                    name: identity.name.clone(),
                    candidate_ids: same_name
                        .iter()
                        .map(|&i| self.participants[i].identity.key().to_string())
                        .collect(),
                });
                None
            }
        }
    }

    /// Recompute every total and surface discrepancies against sheet totals.
    pub fn finish(mut self) -> (Vec<AggregatedParticipant>, Diagnostics) {
        for participant in &mut self.participants {
            participant.recompute();

            for entry in participant.per_period.values() {
                if let Some(source) = entry.source_total {
                    let computed = entry.subtotal();
                    if (computed - source).abs() > SCORE_EPSILON {
                        self.diagnostics.push(Diagnostic::TotalDiscrepancy {
                            period: entry.period.clone(),
                            participant: participant.identity.name.clone(),
                            computed,
                            source,
                        });
                    }
                }
            }

            if participant.identity.gender == Gender::Unknown {
                self.diagnostics.push(Diagnostic::UnknownGender {
                    participant: participant.identity.name.clone(),
                });
            }
        }
        log::info!("Aggregated {} participants", self.participants.len());
        (self.participants, self.diagnostics)
    }
}

/// Aggregate period extracts, taken in the given order.
pub fn aggregate(
    extracts: Vec<PeriodExtract>,
    roster: Option<&Roster>,
) -> (Vec<AggregatedParticipant>, Diagnostics) {
    let mut aggregator = Aggregator::new(roster);
    for extract in extracts {
        aggregator.add_period(extract);
    }
    aggregator.finish()
}
