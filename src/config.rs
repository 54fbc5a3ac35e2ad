//! Competition configuration.
//!
//! Everything the algorithm treats as policy lives here: the competition year,
//! the periods to load, count divisors, prize tables, the eligibility threshold
//! and the fallback dates for undated club activities.
//!
//! Example YAML:
//! ```yaml
//! year: 2025
//! roster: accounts.csv
//! periods:
//!   - id: "0808-0830"
//!     source: 0808-0830.xlsx
//!     sheet: 分數累積
//!     default_club_date: 2025-08-15
//!     label_dates: { "HR Talk": 2025-08-08 }
//! prize_tables:
//!   female:
//!     - { from: 1, to: 2, amount: 6000, label: Gold, icon: "🥇" }
//!   male:
//!     - { from: 1, to: 1, amount: 6000, label: Gold, icon: "🥇" }
//! eligibility_threshold: 200
//! ```

use crate::error::{LeaderboardError, Result};
use crate::model::{Category, Gender};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CompetitionConfig {
    /// Year injected into `M/D` activity dates.
    pub year: i32,

    /// Optional roster CSV with id, name, gender and department.
    #[serde(default)]
    pub roster: Option<PathBuf>,

    pub periods: Vec<PeriodConfig>,

    #[serde(default)]
    pub divisors: CategoryDivisors,

    pub prize_tables: PrizeTables,

    /// Minimum total score for a prize. Ranks are unaffected.
    #[serde(default)]
    pub eligibility_threshold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PeriodConfig {
    pub id: String,
    /// `.xlsx`/`.xls`/`.ods` workbook or CSV export, chosen by extension.
    pub source: PathBuf,

    /// Workbook sheet holding the scores; the first sheet when unset.
    #[serde(default)]
    pub sheet: Option<String>,

    #[serde(default)]
    pub schema: SchemaVersion,

    /// Zero-based score column offsets used by positional layouts.
    #[serde(default)]
    pub offsets: ScoreOffsets,

    /// Date given to club columns whose label carries no `M/D` token.
    pub default_club_date: NaiveDate,

    /// Explicit dates for specific undated labels; consulted before the default.
    #[serde(default)]
    pub label_dates: BTreeMap<String, NaiveDate>,
}

/// Sheet layout generations seen across periods.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Score columns found by header substring only.
    Named,
    /// Score columns at fixed offsets only.
    Positional,
    /// Header match first, offset as fallback.
    #[default]
    Hybrid,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScoreOffsets {
    pub exercise: usize,
    pub diet: usize,
    pub bonus: usize,
}

impl Default for ScoreOffsets {
    // Spreadsheet columns L, M, N.
    fn default() -> Self {
        Self {
            exercise: 11,
            diet: 12,
            bonus: 13,
        }
    }
}

impl ScoreOffsets {
    pub fn get(&self, category: Category) -> Option<usize> {
        match category {
            Category::Exercise => Some(self.exercise),
            Category::Diet => Some(self.diet),
            Category::Bonus => Some(self.bonus),
            Category::Club => None,
        }
    }
}

/// Points per activity for the fixed categories.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CategoryDivisors {
    pub exercise: f64,
    pub diet: f64,
    pub bonus: f64,
}

impl Default for CategoryDivisors {
    fn default() -> Self {
        Self {
            exercise: 10.0,
            diet: 10.0,
            bonus: 30.0,
        }
    }
}

impl CategoryDivisors {
    /// Club activities are counted per record, so they have no divisor.
    pub fn get(&self, category: Category) -> Option<f64> {
        match category {
            Category::Exercise => Some(self.exercise),
            Category::Diet => Some(self.diet),
            Category::Bonus => Some(self.bonus),
            Category::Club => None,
        }
    }
}

/// One contiguous rank range sharing a prize.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PrizeTier {
    pub from: u32,
    pub to: u32,
    pub amount: u64,
    pub label: String,
    #[serde(default)]
    pub icon: String,
}

impl PrizeTier {
    fn new(from: u32, to: u32, amount: u64, label: &str, icon: &str) -> Self {
        Self {
            from,
            to,
            amount,
            label: label.to_string(),
            icon: icon.to_string(),
        }
    }

    pub fn contains(&self, rank: u32) -> bool {
        rank >= self.from && rank <= self.to
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PrizeTables {
    pub female: Vec<PrizeTier>,
    pub male: Vec<PrizeTier>,
}

impl PrizeTables {
    pub fn for_gender(&self, gender: Gender) -> &[PrizeTier] {
        match gender {
            Gender::Female => &self.female,
            Gender::Male => &self.male,
            Gender::Unknown => &[],
        }
    }
}

impl Default for PrizeTables {
    fn default() -> Self {
        Self {
            female: vec![
                PrizeTier::new(1, 2, 6000, "Gold", "🥇"),
                PrizeTier::new(3, 8, 3000, "Silver", "🥈"),
                PrizeTier::new(9, 18, 2000, "Bronze", "🥉"),
                PrizeTier::new(19, 28, 1000, "Merit", "🏅"),
            ],
            male: vec![
                PrizeTier::new(1, 1, 6000, "Gold", "🥇"),
                PrizeTier::new(2, 4, 3000, "Silver", "🥈"),
                PrizeTier::new(5, 9, 2000, "Bronze", "🥉"),
                PrizeTier::new(10, 14, 1000, "Merit", "🏅"),
            ],
        }
    }
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        let date = |m, d| NaiveDate::from_ymd_opt(2025, m, d).unwrap_or(NaiveDate::MIN);
        let mut first_labels = BTreeMap::new();
        first_labels.insert("人資講座".to_string(), date(8, 8));
        Self {
            year: 2025,
            roster: Some(PathBuf::from("accounts.csv")),
            periods: vec![
                PeriodConfig {
                    id: "0808-0830".to_string(),
                    source: PathBuf::from("0808-0830.csv"),
                    sheet: None,
                    schema: SchemaVersion::Hybrid,
                    offsets: ScoreOffsets::default(),
                    default_club_date: date(8, 15),
                    label_dates: first_labels,
                },
                PeriodConfig {
                    id: "0831-0921".to_string(),
                    source: PathBuf::from("0831-0921.csv"),
                    sheet: None,
                    schema: SchemaVersion::Hybrid,
                    offsets: ScoreOffsets::default(),
                    default_club_date: date(9, 10),
                    label_dates: BTreeMap::new(),
                },
            ],
            divisors: CategoryDivisors::default(),
            prize_tables: PrizeTables::default(),
            eligibility_threshold: None,
        }
    }
}

impl CompetitionConfig {
    /// Load, resolve relative paths against the file's directory, and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| LeaderboardError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        log::info!(
            "Loaded config {} ({} periods, year {})",
            path.display(),
            config.periods.len(),
            config.year
        );
        Ok(config)
    }

    /// Parse without validating or resolving paths.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_saphyr::from_str(yaml)
            .map_err(|e| LeaderboardError::Config(format!("invalid YAML: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self)
            .map_err(|e| LeaderboardError::Config(format!("cannot serialize config: {}", e)))
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(roster) = self.roster.as_mut() {
            resolve(roster);
        }
        for period in &mut self.periods {
            resolve(&mut period.source);
        }
    }

    /// Check every rule and report all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        for category in [Category::Exercise, Category::Diet, Category::Bonus] {
            if let Some(d) = self.divisors.get(category) {
                if d.is_nan() || d <= 0.0 {
                    errors.push(format!("divisors.{}: must be positive, got {}", category, d));
                }
            }
        }

        if let Some(t) = self.eligibility_threshold {
            if t < 0.0 {
                errors.push(format!("eligibility_threshold: must be non-negative, got {}", t));
            }
        }

        let mut seen = HashSet::new();
        for (i, period) in self.periods.iter().enumerate() {
            if period.id.trim().is_empty() {
                errors.push(format!("periods[{}].id: must not be empty", i));
            } else if !seen.insert(period.id.as_str()) {
                errors.push(format!("periods[{}].id: duplicate period '{}'", i, period.id));
            }
            if period.default_club_date.year() != self.year {
                errors.push(format!(
                    "periods[{}].default_club_date: {} is outside competition year {}",
                    i, period.default_club_date, self.year
                ));
            }
            for (label, date) in &period.label_dates {
                if date.year() != self.year {
                    errors.push(format!(
                        "periods[{}].label_dates['{}']: {} is outside competition year {}",
                        i, label, date, self.year
                    ));
                }
            }
        }

        for (name, tiers) in [
            ("female", &self.prize_tables.female),
            ("male", &self.prize_tables.male),
        ] {
            validate_tiers(name, tiers, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LeaderboardError::Config(errors.join("; ")))
        }
    }
}

fn validate_tiers(name: &str, tiers: &[PrizeTier], errors: &mut Vec<String>) {
    let mut previous_end = 0u32;
    for (i, tier) in tiers.iter().enumerate() {
        if tier.from == 0 {
            errors.push(format!("prize_tables.{}[{}]: ranks start at 1", name, i));
        }
        if tier.from > tier.to {
            errors.push(format!(
                "prize_tables.{}[{}]: from {} is after to {}",
                name, i, tier.from, tier.to
            ));
        }
        if tier.from <= previous_end {
            errors.push(format!(
                "prize_tables.{}[{}]: range {}-{} overlaps or precedes the previous tier",
                name, i, tier.from, tier.to
            ));
        }
        previous_end = previous_end.max(tier.to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CompetitionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.divisors.get(Category::Bonus), Some(30.0));
        assert_eq!(config.prize_tables.female.last().map(|t| t.to), Some(28));
        assert_eq!(config.prize_tables.male.last().map(|t| t.to), Some(14));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = CompetitionConfig::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = CompetitionConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
year: 2025
periods:
  - id: "p1"
    source: p1.csv
    default_club_date: 2025-08-15
prize_tables:
  female:
    - { from: 1, to: 2, amount: 6000, label: Gold }
  male: []
eligibility_threshold: 200
"#;
        let config = CompetitionConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.periods[0].schema, SchemaVersion::Hybrid);
        assert_eq!(config.periods[0].offsets.bonus, 13);
        assert_eq!(config.periods[0].sheet, None);
        assert_eq!(config.divisors.exercise, 10.0);
        assert_eq!(config.eligibility_threshold, Some(200.0));
        assert!(config.roster.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
year: 2025
periods: []
prize_tables: { female: [], male: [] }
bogus: 1
"#;
        assert!(CompetitionConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_validate_reports_all_errors() {
        let mut config = CompetitionConfig::default();
        config.divisors.bonus = 0.0;
        config.periods[1].id = config.periods[0].id.clone();
        config.prize_tables.male.push(PrizeTier::new(12, 20, 500, "Late", ""));
        config.periods[0].default_club_date = NaiveDate::from_ymd_opt(2024, 8, 15).unwrap();

        let message = match config.validate() {
            Err(LeaderboardError::Config(m)) => m,
            other => panic!("expected config error, got {:?}", other),
        };
        assert!(message.contains("divisors.bonus"));
        assert!(message.contains("duplicate period"));
        assert!(message.contains("overlaps"));
        assert!(message.contains("outside competition year"));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("competition.yaml");
        fs::write(&path, CompetitionConfig::default().to_yaml().unwrap()).unwrap();

        let config = CompetitionConfig::load(&path).unwrap();
        assert_eq!(config.periods[0].source, dir.path().join("0808-0830.csv"));
        assert_eq!(config.roster, Some(dir.path().join("accounts.csv")));
    }
}
