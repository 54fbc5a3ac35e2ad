//! Core data model: identities, per-period ledger entries and aggregated participants.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Ranking partition of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Gender {
    Female,
    Male,
    /// Gender missing or unrecognized. Counted in statistics, never ranked.
    Unknown,
}

impl Gender {
    /// Normalize a raw gender cell. The `生理` ("biological") prefix used by the
    /// registration sheet is stripped before matching.
    pub fn parse(raw: &str) -> Self {
        let cleaned = raw.trim().replace("生理", "");
        match cleaned.trim().to_lowercase().as_str() {
            "女" | "f" | "female" | "woman" => Gender::Female,
            "男" | "m" | "male" | "man" => Gender::Male,
            _ => Gender::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Unknown => "unknown",
        }
    }

    /// The two ranked partitions, in display order.
    pub const RANKED: [Gender; 2] = [Gender::Female, Gender::Male];
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join key for a participant. A stable id always outranks a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IdentityKey {
    Id(String),
    Name(String),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Id(id) => write!(f, "id:{}", id),
            IdentityKey::Name(name) => write!(f, "name:{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantIdentity {
    pub id: Option<String>,
    pub name: String,
    pub gender: Gender,
    pub department: Option<String>,
}

impl ParticipantIdentity {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: name.trim().to_string(),
            gender: Gender::Unknown,
            department: None,
        }
    }

    pub fn key(&self) -> IdentityKey {
        match &self.id {
            Some(id) => IdentityKey::Id(id.clone()),
            None => IdentityKey::Name(self.name.clone()),
        }
    }

    /// Fill fields that are missing here from `other`. Fields already set are never overwritten.
    pub fn fill_gaps(&mut self, other: &ParticipantIdentity) {
        if self.id.is_none() {
            self.id = other.id.clone();
        }
        if self.gender == Gender::Unknown {
            self.gender = other.gender;
        }
        if self.department.is_none() {
            self.department = other.department.clone();
        }
    }
}

/// The four scoring buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    Exercise,
    Diet,
    Bonus,
    Club,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Exercise,
        Category::Diet,
        Category::Bonus,
        Category::Club,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Exercise => "exercise",
            Category::Diet => "diet",
            Category::Bonus => "bonus",
            Category::Club => "club",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score for one fixed category in one period.
///
/// `count` is reconstructed as `floor(score / divisor)`; the sheets carry no
/// authoritative count, so this is an estimate and not measured data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub category: Category,
    pub score: f64,
    pub count: u32,
}

impl CategoryRecord {
    pub fn derived(category: Category, score: f64, divisor: f64) -> Self {
        let count = if score > 0.0 && divisor > 0.0 {
            (score / divisor).floor() as u32
        } else {
            0
        };
        Self {
            category,
            score,
            count,
        }
    }

    pub fn empty(category: Category) -> Self {
        Self {
            category,
            score: 0.0,
            count: 0,
        }
    }

    fn absorb(&mut self, other: &CategoryRecord) {
        self.score += other.score;
        self.count += other.count;
    }
}

/// Where the date of a club activity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DateSource {
    /// Parsed from the `M/D` token of the column label.
    Label,
    /// Explicit per-label override from the period configuration.
    LabelOverride,
    /// The period's configured fallback date.
    PeriodDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClubActivityRecord {
    pub participant: ParticipantIdentity,
    pub period: String,
    pub date: NaiveDate,
    pub date_source: DateSource,
    pub club_name: String,
    pub score: f64,
}

impl ClubActivityRecord {
    /// Date rendered as `YYYY/MM/DD`.
    pub fn date_label(&self) -> String {
        self.date.format("%Y/%m/%d").to_string()
    }
}

/// One participant's result for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodLedgerEntry {
    pub participant: ParticipantIdentity,
    pub period: String,
    pub exercise: CategoryRecord,
    pub diet: CategoryRecord,
    pub bonus: CategoryRecord,
    pub club_score: f64,
    pub club_count: u32,
    /// Value of the sheet's own "total" column, kept only as a cross-check.
    pub source_total: Option<f64>,
    /// Body-fat upload flag; `None` when the sheet has no such column.
    pub body_fat_uploaded: Option<bool>,
    pub club_activities: Vec<ClubActivityRecord>,
}

impl PeriodLedgerEntry {
    pub fn new(participant: ParticipantIdentity, period: &str) -> Self {
        Self {
            participant,
            period: period.to_string(),
            exercise: CategoryRecord::empty(Category::Exercise),
            diet: CategoryRecord::empty(Category::Diet),
            bonus: CategoryRecord::empty(Category::Bonus),
            club_score: 0.0,
            club_count: 0,
            source_total: None,
            body_fat_uploaded: None,
            club_activities: Vec::new(),
        }
    }

    /// Attach decomposed club activities, recomputing the club sum and count from them.
    pub fn set_club_activities(&mut self, activities: Vec<ClubActivityRecord>) {
        self.club_score = activities.iter().map(|a| a.score).sum();
        self.club_count = activities.len() as u32;
        self.club_activities = activities;
    }

    /// Sum of the four categories for this period.
    pub fn subtotal(&self) -> f64 {
        self.exercise.score + self.diet.score + self.bonus.score + self.club_score
    }

    pub fn category(&self, category: Category) -> CategoryTotal {
        match category {
            Category::Exercise => self.exercise.into(),
            Category::Diet => self.diet.into(),
            Category::Bonus => self.bonus.into(),
            Category::Club => CategoryTotal {
                score: self.club_score,
                count: self.club_count,
            },
        }
    }

    /// Fold a second row for the same participant and period into this one.
    pub fn absorb(&mut self, other: PeriodLedgerEntry) {
        self.exercise.absorb(&other.exercise);
        self.diet.absorb(&other.diet);
        self.bonus.absorb(&other.bonus);
        self.club_score += other.club_score;
        self.club_count += other.club_count;
        self.source_total = match (self.source_total, other.source_total) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        self.body_fat_uploaded = match (self.body_fat_uploaded, other.body_fat_uploaded) {
            (Some(a), Some(b)) => Some(a || b),
            (a, b) => a.or(b),
        };
        self.club_activities.extend(other.club_activities);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub score: f64,
    pub count: u32,
}

impl From<CategoryRecord> for CategoryTotal {
    fn from(record: CategoryRecord) -> Self {
        Self {
            score: record.score,
            count: record.count,
        }
    }
}

impl CategoryTotal {
    fn add(&mut self, other: CategoryTotal) {
        self.score += other.score;
        self.count += other.count;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryTotals {
    pub exercise: CategoryTotal,
    pub diet: CategoryTotal,
    pub bonus: CategoryTotal,
    pub club: CategoryTotal,
}

impl CategoryTotals {
    pub fn get(&self, category: Category) -> CategoryTotal {
        match category {
            Category::Exercise => self.exercise,
            Category::Diet => self.diet,
            Category::Bonus => self.bonus,
            Category::Club => self.club,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut CategoryTotal {
        match category {
            Category::Exercise => &mut self.exercise,
            Category::Diet => &mut self.diet,
            Category::Bonus => &mut self.bonus,
            Category::Club => &mut self.club,
        }
    }

    pub fn sum(&self) -> f64 {
        self.exercise.score + self.diet.score + self.bonus.score + self.club.score
    }
}

/// A participant's merged result over all periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedParticipant {
    pub identity: ParticipantIdentity,
    /// Always the sum of `category_totals`, never read from a sheet.
    pub total_score: f64,
    pub category_totals: CategoryTotals,
    pub per_period: BTreeMap<String, PeriodLedgerEntry>,
    pub club_activities: Vec<ClubActivityRecord>,
    /// Sum of the sheets' own totals, for periods that had one.
    pub source_total: Option<f64>,
}

impl AggregatedParticipant {
    pub fn new(identity: ParticipantIdentity) -> Self {
        Self {
            identity,
            total_score: 0.0,
            category_totals: CategoryTotals::default(),
            per_period: BTreeMap::new(),
            club_activities: Vec::new(),
            source_total: None,
        }
    }

    /// Recompute every derived field from `per_period`.
    pub fn recompute(&mut self) {
        let mut totals = CategoryTotals::default();
        let mut source_total: Option<f64> = None;
        let mut activities = Vec::new();
        for entry in self.per_period.values() {
            for category in Category::ALL {
                totals.get_mut(category).add(entry.category(category));
            }
            if let Some(t) = entry.source_total {
                source_total = Some(source_total.unwrap_or(0.0) + t);
            }
            activities.extend(entry.club_activities.iter().cloned());
        }
        activities.sort_by_key(|a| a.date);
        self.category_totals = totals;
        self.total_score = totals.sum();
        self.source_total = source_total;
        self.club_activities = activities;
    }

    pub fn category(&self, category: Category) -> CategoryTotal {
        self.category_totals.get(category)
    }

    pub fn has_activity(&self, category: Category) -> bool {
        let total = self.category(category);
        total.score > 0.0 || total.count > 0
    }

    /// Subtotal for one period; zero when the participant was absent from it.
    pub fn period_subtotal(&self, period: &str) -> f64 {
        self.per_period
            .get(period)
            .map(|e| e.subtotal())
            .unwrap_or(0.0)
    }

    /// Whether a body-fat upload was recorded in any period; `None` when no
    /// period this participant appears in tracks uploads.
    pub fn body_fat_uploaded(&self) -> Option<bool> {
        self.per_period
            .values()
            .filter_map(|e| e.body_fat_uploaded)
            .reduce(|a, b| a || b)
    }

    /// Computed total minus the sheets' totals, over the periods that had a total column.
    pub fn discrepancy(&self) -> Option<f64> {
        let source = self.source_total?;
        let computed: f64 = self
            .per_period
            .values()
            .filter(|e| e.source_total.is_some())
            .map(|e| e.subtotal())
            .sum();
        let diff = computed - source;
        if diff.abs() > SCORE_EPSILON {
            Some(diff)
        } else {
            None
        }
    }
}

/// Tolerance used when comparing computed scores against sheet totals.
pub const SCORE_EPSILON: f64 = 1e-6;
