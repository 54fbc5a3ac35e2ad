//! Period record extraction.
//!
//! Sheet layouts changed between periods, so locating the score columns is
//! delegated to a [`PeriodSourceAdapter`], one implementation per layout
//! generation. Everything after the layout is shared: identity cells, score
//! parsing, count reconstruction, and the hand-off to the club decomposer.

use crate::club::{locate_total_column, ClubDecomposer};
use crate::config::{CategoryDivisors, PeriodConfig, SchemaVersion, ScoreOffsets};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::SchemaError;
use crate::model::{Category, CategoryRecord, Gender, ParticipantIdentity, PeriodLedgerEntry};
use crate::table::{CellValue, PeriodTable};

const NAME_HEADERS: &[&str] = &["姓名", "name", "參與者姓名"];
const ID_HEADERS: &[&str] = &["id", "帳號"];
const GENDER_HEADERS: &[&str] = &["性別", "gender"];
const DEPARTMENT_HEADERS: &[&str] = &["所屬部門", "department", "部門"];
const COUNT_MARKERS: &[&str] = &["次數", "count"];
const UPLOAD_HEADERS: &[&str] = &["體脂是否上傳", "body fat uploaded"];
const UPLOAD_DONE: &[&str] = &["已完成", "✅", "是", "yes"];

const FIXED_CATEGORIES: [Category; 3] = [Category::Exercise, Category::Diet, Category::Bonus];

fn category_keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::Exercise => &["日常運動", "運動", "exercise"],
        Category::Diet => &["飲食", "diet"],
        Category::Bonus => &["bonus"],
        Category::Club => &[],
    }
}

fn is_count_header(header: &str) -> bool {
    let lower = header.to_lowercase();
    COUNT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Score column for `category` by header substring, ignoring count columns.
pub fn find_score_column_by_name(table: &PeriodTable, category: Category) -> Option<usize> {
    let keywords = category_keywords(category);
    table.headers.iter().position(|h| {
        let lower = h.to_lowercase();
        !is_count_header(h) && !lower.contains("total") && keywords.iter().any(|k| lower.contains(k))
    })
}

/// Optional authoritative count column for `category`.
pub fn find_count_column(table: &PeriodTable, category: Category) -> Option<usize> {
    let keywords = category_keywords(category);
    table.headers.iter().position(|h| {
        let lower = h.to_lowercase();
        is_count_header(h) && keywords.iter().any(|k| lower.contains(k))
    })
}

/// Column positions resolved for one period sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub name: usize,
    pub id: Option<usize>,
    pub gender: Option<usize>,
    pub department: Option<usize>,
    pub exercise: usize,
    pub diet: usize,
    pub bonus: usize,
    pub exercise_count: Option<usize>,
    pub diet_count: Option<usize>,
    pub bonus_count: Option<usize>,
    /// Optional body-fat upload flag column.
    pub body_fat_uploaded: Option<usize>,
}

impl ColumnLayout {
    pub fn score_column(&self, category: Category) -> Option<usize> {
        match category {
            Category::Exercise => Some(self.exercise),
            Category::Diet => Some(self.diet),
            Category::Bonus => Some(self.bonus),
            Category::Club => None,
        }
    }

    pub fn count_column(&self, category: Category) -> Option<usize> {
        match category {
            Category::Exercise => self.exercise_count,
            Category::Diet => self.diet_count,
            Category::Bonus => self.bonus_count,
            Category::Club => None,
        }
    }

    /// First column of the club block: right after the last fixed score column.
    pub fn club_block_start(&self) -> usize {
        self.exercise.max(self.diet).max(self.bonus) + 1
    }

    /// Columns inside the club block that must not be read as activities.
    pub fn reserved(&self) -> Vec<usize> {
        [
            Some(self.name),
            self.id,
            self.gender,
            self.department,
            self.exercise_count,
            self.diet_count,
            self.bonus_count,
            self.body_fat_uploaded,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Locates score columns for one sheet layout generation.
pub trait PeriodSourceAdapter: Send + Sync {
    fn schema(&self) -> SchemaVersion;

    fn locate_score_column(
        &self,
        table: &PeriodTable,
        category: Category,
        diagnostics: &mut Diagnostics,
    ) -> Result<usize, SchemaError>;

    /// Resolve the full layout. The name column is mandatory for every schema.
    fn layout(
        &self,
        table: &PeriodTable,
        diagnostics: &mut Diagnostics,
    ) -> Result<ColumnLayout, SchemaError> {
        let name = table.find_exact(NAME_HEADERS).ok_or_else(|| SchemaError {
            period: table.period.clone(),
            column: "name".to_string(),
        })?;
        let layout = ColumnLayout {
            name,
            id: table.find_exact(ID_HEADERS),
            gender: table.find_exact(GENDER_HEADERS),
            department: table.find_exact(DEPARTMENT_HEADERS),
            exercise: self.locate_score_column(table, Category::Exercise, diagnostics)?,
            diet: self.locate_score_column(table, Category::Diet, diagnostics)?,
            bonus: self.locate_score_column(table, Category::Bonus, diagnostics)?,
            exercise_count: find_count_column(table, Category::Exercise),
            diet_count: find_count_column(table, Category::Diet),
            bonus_count: find_count_column(table, Category::Bonus),
            body_fat_uploaded: table.find_exact(UPLOAD_HEADERS),
        };
        log::debug!("Period '{}' layout ({:?}): {:?}", table.period, self.schema(), layout);
        Ok(layout)
    }
}

fn missing(table: &PeriodTable, category: Category) -> SchemaError {
    SchemaError {
        period: table.period.clone(),
        column: category.as_str().to_string(),
    }
}

/// Headers only.
pub struct NamedAdapter;

impl PeriodSourceAdapter for NamedAdapter {
    fn schema(&self) -> SchemaVersion {
        SchemaVersion::Named
    }

    fn locate_score_column(
        &self,
        table: &PeriodTable,
        category: Category,
        _diagnostics: &mut Diagnostics,
    ) -> Result<usize, SchemaError> {
        find_score_column_by_name(table, category).ok_or_else(|| missing(table, category))
    }
}

/// Fixed offsets only.
pub struct PositionalAdapter {
    pub offsets: ScoreOffsets,
}

impl PeriodSourceAdapter for PositionalAdapter {
    fn schema(&self) -> SchemaVersion {
        SchemaVersion::Positional
    }

    fn locate_score_column(
        &self,
        table: &PeriodTable,
        category: Category,
        _diagnostics: &mut Diagnostics,
    ) -> Result<usize, SchemaError> {
        self.offsets
            .get(category)
            .filter(|&i| i < table.headers.len())
            .ok_or_else(|| missing(table, category))
    }
}

/// Header match first, offset as fallback. A header match that disagrees
/// with the offset wins and is reported.
pub struct HybridAdapter {
    pub offsets: ScoreOffsets,
}

impl PeriodSourceAdapter for HybridAdapter {
    fn schema(&self) -> SchemaVersion {
        SchemaVersion::Hybrid
    }

    fn locate_score_column(
        &self,
        table: &PeriodTable,
        category: Category,
        diagnostics: &mut Diagnostics,
    ) -> Result<usize, SchemaError> {
        let expected = self.offsets.get(category);
        match (find_score_column_by_name(table, category), expected) {
            (Some(found), Some(offset)) => {
                if found != offset && offset < table.headers.len() {
                    diagnostics.push(Diagnostic::ColumnLayoutMismatch {
                        period: table.period.clone(),
                        category,
                        matched_column: table.header(found).to_string(),
                        matched_index: found,
                        expected_index: offset,
                    });
                }
                Ok(found)
            }
            (Some(found), None) => Ok(found),
            (None, _) => PositionalAdapter {
                offsets: self.offsets,
            }
            .locate_score_column(table, category, diagnostics),
        }
    }
}

pub fn adapter_for(period: &PeriodConfig) -> Box<dyn PeriodSourceAdapter> {
    match period.schema {
        SchemaVersion::Named => Box::new(NamedAdapter),
        SchemaVersion::Positional => Box::new(PositionalAdapter {
            offsets: period.offsets,
        }),
        SchemaVersion::Hybrid => Box::new(HybridAdapter {
            offsets: period.offsets,
        }),
    }
}

/// Everything extracted from one period.
#[derive(Debug, Clone)]
pub struct PeriodExtract {
    pub period: String,
    pub entries: Vec<PeriodLedgerEntry>,
    /// False when the club block could not be bounded.
    pub clubs_decomposed: bool,
    pub diagnostics: Diagnostics,
}

/// Extract ledger entries from one period sheet.
///
/// Fails only when the layout cannot be resolved. A missing "total" column
/// disables club decomposition for this period but keeps the fixed categories.
pub fn extract_period(
    table: &PeriodTable,
    period: &PeriodConfig,
    year: i32,
    divisors: &CategoryDivisors,
) -> Result<PeriodExtract, SchemaError> {
    let mut diagnostics = Diagnostics::new();
    let adapter = adapter_for(period);
    let layout = adapter.layout(table, &mut diagnostics)?;

    let decomposer = ClubDecomposer::new(period, year);
    let block_start = layout.club_block_start();
    let (activity_columns, clubs_decomposed) =
        match decomposer.plan(table, block_start, &layout.reserved(), &mut diagnostics) {
            Ok(columns) => (columns, true),
            Err(e) => {
                diagnostics.push(Diagnostic::ClubDecompositionSkipped(e));
                (Vec::new(), false)
            }
        };
    let total_column = locate_total_column(table, block_start).ok();

    let mut entries = Vec::new();
    for row in 0..table.rows.len() {
        let name = table.cell(row, layout.name).trim();
        if name.is_empty() {
            continue;
        }
        let participant = row_identity(table, row, &layout);
        let mut entry = PeriodLedgerEntry::new(participant, &period.id);

        for category in FIXED_CATEGORIES {
            let (Some(col), Some(divisor)) =
                (layout.score_column(category), divisors.get(category))
            else {
                continue;
            };
            let score = read_score(table, row, col, &mut diagnostics);
            let record = CategoryRecord::derived(category, score, divisor);
            if let Some(count_col) = layout.count_column(category) {
                check_count(table, row, count_col, &record, name, &mut diagnostics);
            }
            match category {
                Category::Exercise => entry.exercise = record,
                Category::Diet => entry.diet = record,
                Category::Bonus => entry.bonus = record,
                Category::Club => {}
            }
        }

        if clubs_decomposed {
            let activities = decomposer.decompose_row(
                table,
                row,
                &entry.participant,
                &activity_columns,
                &mut diagnostics,
            );
            entry.set_club_activities(activities);
        }

        if let Some(col) = layout.body_fat_uploaded {
            entry.body_fat_uploaded = Some(is_upload_done(table.cell(row, col)));
        }

        if let Some(col) = total_column {
            if let CellValue::Number(v) = CellValue::parse(table.cell(row, col)) {
                entry.source_total = Some(v);
            }
        }

        entries.push(entry);
    }

    log::info!(
        "Extracted period '{}': {} participants, {} activity columns",
        period.id,
        entries.len(),
        activity_columns.len()
    );
    Ok(PeriodExtract {
        period: period.id.clone(),
        entries,
        clubs_decomposed,
        diagnostics,
    })
}

fn row_identity(table: &PeriodTable, row: usize, layout: &ColumnLayout) -> ParticipantIdentity {
    let optional = |col: Option<usize>| {
        col.map(|c| table.cell(row, c).trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    };
    ParticipantIdentity {
        id: optional(layout.id),
        name: table.cell(row, layout.name).trim().to_string(),
        gender: optional(layout.gender)
            .map(|g| Gender::parse(&g))
            .unwrap_or(Gender::Unknown),
        department: optional(layout.department),
    }
}

// Blank or any other mark counts as not uploaded.
fn is_upload_done(raw: &str) -> bool {
    let value = raw.trim();
    UPLOAD_DONE.iter().any(|done| value.eq_ignore_ascii_case(done))
}

fn read_score(table: &PeriodTable, row: usize, col: usize, diagnostics: &mut Diagnostics) -> f64 {
    let raw = table.cell(row, col);
    let value = CellValue::parse(raw);
    if value == CellValue::Invalid {
        diagnostics.push(Diagnostic::InvalidCell {
            period: table.period.clone(),
            row: row + 1,
            column: table.header(col).to_string(),
            value: raw.to_string(),
        });
    }
    value.score()
}

// Counts stay derived from score; a sheet count only gets compared.
fn check_count(
    table: &PeriodTable,
    row: usize,
    col: usize,
    record: &CategoryRecord,
    participant: &str,
    diagnostics: &mut Diagnostics,
) {
    if let CellValue::Number(reported) = CellValue::parse(table.cell(row, col)) {
        let reported = reported.round() as u32;
        if reported != record.count {
            diagnostics.push(Diagnostic::CountConflict {
                period: table.period.clone(),
                participant: participant.to_string(),
                category: record.category,
                derived: record.count,
                reported,
            });
        }
    }
}
