//! Club activity decomposition.
//!
//! Each period sheet carries a block of wide columns between the bonus column
//! and the "total" column, one per activity, labelled `"<M/D> <club name>"` or
//! just `"<club name>"`. Every strictly positive cell in that block becomes one
//! [`ClubActivityRecord`].

use crate::config::PeriodConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ColumnBoundaryError;
use crate::model::{ClubActivityRecord, DateSource, ParticipantIdentity};
use crate::table::{CellValue, PeriodTable};
use chrono::NaiveDate;
use regex::Regex;

lazy_static::lazy_static! {
    static ref MONTH_DAY: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})$").unwrap();
}

/// Result of splitting a column label.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLabel {
    pub date: Option<NaiveDate>,
    pub club_name: String,
    /// A leading `M/D`-shaped token that is not a real calendar date.
    pub invalid_token: Option<String>,
}

/// Split a label on its first whitespace into an `M/D` date and a club name.
///
/// When the leading token is not a valid `M/D` date, the whole label is the club name.
pub fn parse_activity_label(label: &str, year: i32) -> ParsedLabel {
    let label = label.trim();
    let undated = |invalid_token| ParsedLabel {
        date: None,
        club_name: label.to_string(),
        invalid_token,
    };

    let Some((token, rest)) = label.split_once(char::is_whitespace) else {
        return undated(None);
    };
    let rest = rest.trim();
    let Some(caps) = MONTH_DAY.captures(token) else {
        return undated(None);
    };
    if rest.is_empty() {
        return undated(None);
    }

    let month: u32 = caps[1].parse().unwrap_or(0);
    let day: u32 = caps[2].parse().unwrap_or(0);
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => ParsedLabel {
            date: Some(date),
            club_name: rest.to_string(),
            invalid_token: None,
        },
        None => undated(Some(token.to_string())),
    }
}

/// Normalize an `M/D` token to `YYYY/MM/DD` in the given year.
pub fn normalize_month_day(token: &str, year: i32) -> Option<String> {
    let caps = MONTH_DAY.captures(token.trim())?;
    let date = NaiveDate::from_ymd_opt(year, caps[1].parse().ok()?, caps[2].parse().ok()?)?;
    Some(date.format("%Y/%m/%d").to_string())
}

/// Find the "total" column at or after `start` (case-insensitive substring match).
pub fn locate_total_column(
    table: &PeriodTable,
    start: usize,
) -> Result<usize, ColumnBoundaryError> {
    table
        .headers
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, h)| h.to_lowercase().contains("total"))
        .map(|(i, _)| i)
        .ok_or_else(|| ColumnBoundaryError {
            period: table.period.clone(),
        })
}

/// A resolved activity column.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityColumn {
    pub index: usize,
    pub label: String,
    pub club_name: String,
    pub date: NaiveDate,
    pub date_source: DateSource,
}

/// Decomposes the activity block of one period.
pub struct ClubDecomposer<'a> {
    period: &'a PeriodConfig,
    year: i32,
}

impl<'a> ClubDecomposer<'a> {
    pub fn new(period: &'a PeriodConfig, year: i32) -> Self {
        Self { period, year }
    }

    /// Resolve the columns in `[start, total)`, skipping `reserved` columns.
    ///
    /// Undated labels get their date from configuration and raise one
    /// `ParseWarning` per column.
    pub fn plan(
        &self,
        table: &PeriodTable,
        start: usize,
        reserved: &[usize],
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<ActivityColumn>, ColumnBoundaryError> {
        let end = locate_total_column(table, start)?;
        let mut columns = Vec::new();

        for index in start..end {
            if reserved.contains(&index) {
                continue;
            }
            let label = table.header(index);
            if label.is_empty() {
                continue;
            }
            let parsed = parse_activity_label(label, self.year);
            if let Some(token) = &parsed.invalid_token {
                diagnostics.push(Diagnostic::InvalidActivityDate {
                    period: self.period.id.clone(),
                    label: label.to_string(),
                    token: token.clone(),
                });
            }

            let (date, date_source) = match parsed.date {
                Some(date) => (date, DateSource::Label),
                None => {
                    let (fallback, source) = match self.period.label_dates.get(&parsed.club_name) {
                        Some(d) => (*d, DateSource::LabelOverride),
                        None => (self.period.default_club_date, DateSource::PeriodDefault),
                    };
                    diagnostics.push(Diagnostic::UndatedActivity {
                        period: self.period.id.clone(),
                        label: label.to_string(),
                        fallback,
                        source,
                    });
                    (fallback, source)
                }
            };

            columns.push(ActivityColumn {
                index,
                label: label.to_string(),
                club_name: parsed.club_name,
                date,
                date_source,
            });
        }

        log::debug!(
            "Period '{}': {} activity columns between index {} and total at {}",
            self.period.id,
            columns.len(),
            start,
            end
        );
        Ok(columns)
    }

    /// Emit one record per strictly positive activity cell of `row`.
    pub fn decompose_row(
        &self,
        table: &PeriodTable,
        row: usize,
        participant: &ParticipantIdentity,
        columns: &[ActivityColumn],
        diagnostics: &mut Diagnostics,
    ) -> Vec<ClubActivityRecord> {
        let mut records = Vec::new();
        for column in columns {
            let raw = table.cell(row, column.index);
            match CellValue::parse(raw) {
                CellValue::Number(score) if score > 0.0 => records.push(ClubActivityRecord {
                    participant: participant.clone(),
                    period: self.period.id.clone(),
                    date: column.date,
                    date_source: column.date_source,
                    club_name: column.club_name.clone(),
                    score,
                }),
                CellValue::Invalid => diagnostics.push(Diagnostic::InvalidCell {
                    period: self.period.id.clone(),
                    row: row + 1,
                    column: column.label.clone(),
                    value: raw.to_string(),
                }),
                _ => {}
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompetitionConfig;
    use crate::diagnostics::DiagnosticKind;

    fn ymd(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_parse_dated_label() {
        let parsed = parse_activity_label("9/2 Badminton", 2025);
        assert_eq!(parsed.date, Some(ymd(9, 2)));
        assert_eq!(parsed.club_name, "Badminton");
        assert!(parsed.invalid_token.is_none());

        let parsed = parse_activity_label("8/13 桌球社 挑戰賽", 2025);
        assert_eq!(parsed.date, Some(ymd(8, 13)));
        assert_eq!(parsed.club_name, "桌球社 挑戰賽");
    }

    #[test]
    fn test_parse_undated_label() {
        let parsed = parse_activity_label("人資講座", 2025);
        assert_eq!(parsed.date, None);
        assert_eq!(parsed.club_name, "人資講座");

        let parsed = parse_activity_label("Outdoor Hike", 2025);
        assert_eq!(parsed.date, None);
        assert_eq!(parsed.club_name, "Outdoor Hike");

        // A bare date is not a club name plus date.
        let parsed = parse_activity_label("9/2", 2025);
        assert_eq!(parsed.date, None);
        assert_eq!(parsed.club_name, "9/2");
    }

    #[test]
    fn test_parse_invalid_date_token() {
        let parsed = parse_activity_label("2/30 Yoga", 2025);
        assert_eq!(parsed.date, None);
        assert_eq!(parsed.club_name, "2/30 Yoga");
        assert_eq!(parsed.invalid_token.as_deref(), Some("2/30"));
    }

    #[test]
    fn test_normalize_month_day() {
        assert_eq!(normalize_month_day("9/2", 2025).as_deref(), Some("2025/09/02"));
        assert_eq!(normalize_month_day("12/31", 2024).as_deref(), Some("2024/12/31"));
        assert_eq!(normalize_month_day("13/1", 2025), None);
        assert_eq!(normalize_month_day("Sept 2", 2025), None);
    }

    fn sample_table(with_total: bool) -> PeriodTable {
        let mut headers = vec!["name", "bonus", "8/13 Badminton", "HR Talk", "Yoga Class"];
        if with_total {
            headers.push("Total");
        }
        PeriodTable::new(
            "p1",
            headers.into_iter().map(String::from).collect(),
            vec![
                vec!["Chen", "0", "15", "", "abc", "15"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                vec!["Lin", "30", "0", "10", "5", "45"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ],
        )
    }

    #[test]
    fn test_plan_and_decompose() {
        let mut config = CompetitionConfig::default();
        config.periods[0].id = "p1".to_string();
        config.periods[0].label_dates.clear();
        config.periods[0]
            .label_dates
            .insert("HR Talk".to_string(), ymd(8, 8));
        let period = &config.periods[0];
        let decomposer = ClubDecomposer::new(period, 2025);
        let table = sample_table(true);
        let mut diags = Diagnostics::new();

        let columns = decomposer.plan(&table, 2, &[], &mut diags).unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].date_source, DateSource::Label);
        assert_eq!(columns[1].date, ymd(8, 8));
        assert_eq!(columns[1].date_source, DateSource::LabelOverride);
        assert_eq!(columns[2].date, ymd(8, 15));
        assert_eq!(columns[2].date_source, DateSource::PeriodDefault);
        assert_eq!(diags.count(DiagnosticKind::ParseWarning), 2);

        let chen = ParticipantIdentity::named("Chen");
        let records = decomposer.decompose_row(&table, 0, &chen, &columns, &mut diags);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].club_name, "Badminton");
        assert_eq!(records[0].date_label(), "2025/08/13");
        assert_eq!(records[0].score, 15.0);
        assert_eq!(diags.count(DiagnosticKind::DataWarning), 1);

        let lin = ParticipantIdentity::named("Lin");
        let records = decomposer.decompose_row(&table, 1, &lin, &columns, &mut diags);
        let names: Vec<&str> = records.iter().map(|r| r.club_name.as_str()).collect();
        assert_eq!(names, vec!["HR Talk", "Yoga Class"]);
    }

    #[test]
    fn test_missing_total_is_boundary_error() {
        let config = CompetitionConfig::default();
        let decomposer = ClubDecomposer::new(&config.periods[0], 2025);
        let table = sample_table(false);
        let mut diags = Diagnostics::new();
        let err = decomposer.plan(&table, 2, &[], &mut diags).unwrap_err();
        assert_eq!(err.period, "p1");
    }
}
