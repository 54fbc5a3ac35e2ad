//! Output formatting: ranked tables as CSV or text, person detail as text or
//! JSON, statistics text, and the packaged XLSX workbook.

use crate::diagnostics::Diagnostics;
use crate::model::{AggregatedParticipant, Category, DateSource};
use crate::pipeline::LeaderboardSnapshot;
use crate::ranking::{Leaderboard, PrizeStatus, RankedEntry, RankedTable};
use crate::stats::{LeaderboardStats, BAND_LABELS};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

pub const RANKED_CSV_HEADERS: [&str; 8] = [
    "rank",
    "icon",
    "name",
    "department",
    "total",
    "prize",
    "tier",
    "status",
];

/// One ranked-table row as written to CSV and JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RankedRow {
    pub rank: u32,
    pub icon: String,
    pub name: String,
    pub department: String,
    pub total: f64,
    pub prize: Option<u64>,
    pub tier: Option<String>,
    pub status: &'static str,
}

impl RankedRow {
    pub fn new(entry: &RankedEntry<'_>) -> Self {
        Self {
            rank: entry.rank,
            icon: entry.icon().to_string(),
            name: entry.name().to_string(),
            department: entry.department().to_string(),
            total: entry.total_score(),
            prize: entry.prize.amount(),
            tier: entry.prize.tier().map(|t| t.label.clone()),
            status: entry.prize.code(),
        }
    }

    fn cells(&self) -> [String; 8] {
        [
            self.rank.to_string(),
            self.icon.clone(),
            self.name.clone(),
            self.department.clone(),
            self.total.to_string(),
            self.prize.map(|a| a.to_string()).unwrap_or_default(),
            self.tier.clone().unwrap_or_default(),
            self.status.to_string(),
        ]
    }
}

/// Rows of one partition, at most `limit` of them.
pub fn ranked_rows(table: &RankedTable<'_>, limit: Option<usize>) -> Vec<RankedRow> {
    table
        .top_n(limit.unwrap_or(table.len()))
        .iter()
        .map(RankedRow::new)
        .collect()
}

/// Write one ranked partition as CSV, at most `limit` rows.
pub fn write_ranked_csv<W: std::io::Write>(
    table: &RankedTable<'_>,
    limit: Option<usize>,
    writer: W,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(RANKED_CSV_HEADERS)?;
    for row in ranked_rows(table, limit) {
        writer.write_record(row.cells())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn ranked_csv_string(table: &RankedTable<'_>, limit: Option<usize>) -> Result<String> {
    let mut buf = Vec::new();
    write_ranked_csv(table, limit, &mut buf)?;
    String::from_utf8(buf).context("ranked CSV is not UTF-8")
}

pub fn ranked_json(table: &RankedTable<'_>, limit: Option<usize>) -> Result<String> {
    serde_json::to_string_pretty(&ranked_rows(table, limit))
        .context("Failed to serialize ranked table")
}

fn prize_text(prize: &PrizeStatus) -> String {
    match prize {
        PrizeStatus::Awarded { amount, tier } => format!("{} {} ${}", tier.icon, tier.label, amount),
        PrizeStatus::Ineligible { tier, .. } => format!("{} (ineligible: {})", tier.label, prize.code()),
        PrizeStatus::NotInPrizeRange => "-".to_string(),
    }
}

/// Fixed-width listing of a partition, at most `limit` rows.
pub fn ranked_table_text(table: &RankedTable<'_>, limit: Option<usize>) -> Result<String> {
    let mut out = String::new();
    let title = format!(" {} ({} ranked) ", table.gender.as_str().to_uppercase(), table.len());
    writeln!(out, "{:=^90}", title)?;
    if table.is_empty() {
        writeln!(out, "(no participants)")?;
        return Ok(out);
    }
    writeln!(
        out,
        "{:>5}  {:<20} {:<20} {:>10}  {}",
        "Rank", "Name", "Department", "Total", "Prize"
    )?;
    writeln!(out, "{:-<90}", "")?;
    let shown = limit.unwrap_or(table.len());
    for entry in table.top_n(shown) {
        writeln!(
            out,
            "{:>5}  {:<20} {:<20} {:>10.1}  {}",
            entry.rank,
            truncate(entry.name(), 20),
            truncate(entry.department(), 20),
            entry.total_score(),
            prize_text(&entry.prize)
        )?;
    }
    if let Some(cutoff) = table.prize_cutoff_score() {
        writeln!(out, "Prize cutoff score: {:.1}", cutoff)?;
    }
    writeln!(out, "Prizes paid: ${}", table.total_prize_amount())?;
    Ok(out)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max_chars - 1).collect();
        t.push('…');
        t
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryLine {
    pub category: Category,
    pub score: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodLine {
    pub period: String,
    pub exercise: f64,
    pub diet: f64,
    pub bonus: f64,
    pub club: f64,
    pub subtotal: f64,
    pub source_total: Option<f64>,
    pub body_fat_uploaded: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityLine {
    pub date: String,
    pub club: String,
    pub score: f64,
    pub period: String,
    pub date_source: DateSource,
}

/// Everything shown for one person.
#[derive(Debug, Clone, Serialize)]
pub struct PersonDetail {
    pub name: String,
    pub id: Option<String>,
    pub gender: String,
    pub department: Option<String>,
    pub total_score: f64,
    pub rank: Option<u32>,
    pub partition_size: Option<usize>,
    pub score_gap_to_previous: Option<f64>,
    pub prize: Option<PrizeStatus>,
    pub categories: Vec<CategoryLine>,
    pub periods: Vec<PeriodLine>,
    pub club_activities: Vec<ActivityLine>,
    pub source_total: Option<f64>,
    pub discrepancy: Option<f64>,
}

impl PersonDetail {
    pub fn new(participant: &AggregatedParticipant, leaderboard: &Leaderboard<'_>) -> Self {
        let ranked = leaderboard
            .partition(participant.identity.gender)
            .and_then(|table| {
                table
                    .entries
                    .iter()
                    .find(|e| std::ptr::eq(e.participant, participant))
                    .map(|e| (table, e))
            });

        Self {
            name: participant.identity.name.clone(),
            id: participant.identity.id.clone(),
            gender: participant.identity.gender.to_string(),
            department: participant.identity.department.clone(),
            total_score: participant.total_score,
            rank: ranked.map(|(_, e)| e.rank),
            partition_size: ranked.map(|(t, _)| t.len()),
            score_gap_to_previous: ranked.and_then(|(t, e)| t.score_gap_to_previous(e.rank)),
            prize: ranked.map(|(_, e)| e.prize.clone()),
            categories: Category::ALL
                .iter()
                .map(|&category| {
                    let total = participant.category(category);
                    CategoryLine {
                        category,
                        score: total.score,
                        count: total.count,
                    }
                })
                .collect(),
            periods: participant
                .per_period
                .values()
                .map(|e| PeriodLine {
                    period: e.period.clone(),
                    exercise: e.exercise.score,
                    diet: e.diet.score,
                    bonus: e.bonus.score,
                    club: e.club_score,
                    subtotal: e.subtotal(),
                    source_total: e.source_total,
                    body_fat_uploaded: e.body_fat_uploaded,
                })
                .collect(),
            club_activities: participant
                .club_activities
                .iter()
                .map(|a| ActivityLine {
                    date: a.date_label(),
                    club: a.club_name.clone(),
                    score: a.score,
                    period: a.period.clone(),
                    date_source: a.date_source,
                })
                .collect(),
            source_total: participant.source_total,
            discrepancy: participant.discrepancy(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize person detail")
    }

    pub fn to_text(&self) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "{:=^60}", format!(" {} ", self.name))?;
        if let Some(id) = &self.id {
            writeln!(out, "Id:          {}", id)?;
        }
        writeln!(out, "Gender:      {}", self.gender)?;
        writeln!(out, "Department:  {}", self.department.as_deref().unwrap_or("-"))?;
        writeln!(out, "Total score: {}", self.total_score)?;
        match (self.rank, self.partition_size) {
            (Some(rank), Some(size)) => {
                writeln!(out, "Rank:        {} of {}", rank, size)?;
                if let Some(gap) = self.score_gap_to_previous.filter(|g| *g > 0.0) {
                    writeln!(out, "Behind next: {} points", gap)?;
                }
            }
            _ => writeln!(out, "Rank:        (not ranked)")?,
        }
        if let Some(prize) = &self.prize {
            writeln!(out, "Prize:       {}", prize_text(prize))?;
        }
        if let Some(diff) = self.discrepancy {
            writeln!(out, "Sheet totals differ from computed total by {:+}", diff)?;
        }

        writeln!(out, "\n{:<10} {:>10} {:>6}", "Category", "Score", "Count")?;
        writeln!(out, "{:-<28}", "")?;
        for line in &self.categories {
            writeln!(out, "{:<10} {:>10} {:>6}", line.category.as_str(), line.score, line.count)?;
        }

        writeln!(
            out,
            "\n{:<12} {:>8} {:>8} {:>8} {:>8} {:>9}",
            "Period", "Exercise", "Diet", "Bonus", "Club", "Subtotal"
        )?;
        writeln!(out, "{:-<58}", "")?;
        for p in &self.periods {
            writeln!(
                out,
                "{:<12} {:>8} {:>8} {:>8} {:>8} {:>9}",
                p.period, p.exercise, p.diet, p.bonus, p.club, p.subtotal
            )?;
        }

        writeln!(out, "\nClub activities ({}):", self.club_activities.len())?;
        for a in &self.club_activities {
            let marker = match a.date_source {
                DateSource::Label => "",
                _ => " *",
            };
            writeln!(out, "  {}  {:<24} {:>6}{}", a.date, a.club, a.score, marker)?;
        }
        if self
            .club_activities
            .iter()
            .any(|a| a.date_source != DateSource::Label)
        {
            writeln!(out, "  * date taken from configuration")?;
        }
        Ok(out)
    }
}

pub fn stats_text(stats: &LeaderboardStats) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{:=^70}", " Activity Statistics ")?;
    writeln!(out, "Participants: {}", stats.participant_count)?;
    for (gender, count) in &stats.gender_counts {
        writeln!(out, "  {:<10} {:>6}", gender.as_str(), count)?;
    }
    let fmt_opt = |v: Option<f64>| v.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string());
    writeln!(
        out,
        "Score mean {} / max {} / min {}",
        fmt_opt(stats.score.mean),
        fmt_opt(stats.score.max),
        fmt_opt(stats.score.min)
    )?;
    let completion = stats
        .completion_rate
        .map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "-".to_string());
    writeln!(out, "Body-fat upload completion: {}", completion)?;

    writeln!(
        out,
        "\n{:<10} {:>12} {:>10} {:>14}",
        "Category", "Total score", "Count", "Participants"
    )?;
    writeln!(out, "{:-<50}", "")?;
    for c in &stats.categories {
        writeln!(
            out,
            "{:<10} {:>12} {:>10} {:>14}",
            c.category.as_str(),
            c.total_score,
            c.total_count,
            c.participants
        )?;
    }

    writeln!(out, "\nScore bands:")?;
    write!(out, "{:<10}", "")?;
    for label in BAND_LABELS {
        write!(out, " {:>8}", label)?;
    }
    writeln!(out)?;
    for (gender, bands) in &stats.score_bands {
        write!(out, "{:<10}", gender.as_str())?;
        for count in bands {
            write!(out, " {:>8}", count)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "\n{:<24} {:<8} {:>6} {:>10}", "Department", "Gender", "Count", "Mean")?;
    writeln!(out, "{:-<51}", "")?;
    for d in &stats.departments {
        writeln!(
            out,
            "{:<24} {:<8} {:>6} {:>10.1}",
            truncate(&d.department, 24),
            d.gender.as_str(),
            d.participants,
            d.mean_score
        )?;
    }

    if !stats.diagnostics.is_empty() {
        writeln!(out, "\nDiagnostics:")?;
        for (kind, count) in &stats.diagnostics {
            writeln!(out, "  {:<20} {:>5}", kind.as_str(), count)?;
        }
    }
    Ok(out)
}

/// Package leaderboards, the club ledger, statistics and diagnostics into one workbook.
///
/// Returns a summary string on success.
pub fn write_workbook(
    output: &Path,
    snapshot: &LeaderboardSnapshot,
    leaderboard: &Leaderboard<'_>,
    stats: &LeaderboardStats,
) -> Result<String> {
    use rust_xlsxwriter::{Format, Workbook};

    let mut workbook = Workbook::new();
    let header_fmt = Format::new().set_bold();
    let title_fmt = Format::new().set_bold().set_font_size(14);

    for table in leaderboard.tables() {
        let sheet = workbook.add_worksheet();
        let name = match table.gender.as_str() {
            "female" => "Female",
            _ => "Male",
        };
        sheet.set_name(name)?;
        for (col, h) in RANKED_CSV_HEADERS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *h, &header_fmt)?;
        }
        for (i, entry) in table.entries.iter().enumerate() {
            let row = (i + 1) as u32;
            let cells = RankedRow::new(entry).cells();
            sheet.write_number(row, 0, entry.rank as f64)?;
            sheet.write_string(row, 1, &cells[1])?;
            sheet.write_string(row, 2, &cells[2])?;
            sheet.write_string(row, 3, &cells[3])?;
            sheet.write_number(row, 4, entry.total_score())?;
            if let Some(amount) = entry.prize.amount() {
                sheet.write_number(row, 5, amount as f64)?;
            }
            sheet.write_string(row, 6, &cells[6])?;
            sheet.write_string(row, 7, &cells[7])?;
        }
        sheet.set_column_width(2, 18)?;
        sheet.set_column_width(3, 22)?;
        sheet.set_column_width(7, 22)?;
        if !table.is_empty() {
            sheet.autofilter(0, 0, table.len() as u32, 7)?;
        }
    }

    let mut activity_rows = 0u32;
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Club Activities")?;
        let headers = ["date", "name", "department", "club", "score", "period", "date source"];
        for (col, h) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *h, &header_fmt)?;
        }
        for participant in &snapshot.participants {
            for a in &participant.club_activities {
                activity_rows += 1;
                let row = activity_rows;
                sheet.write_string(row, 0, a.date_label())?;
                sheet.write_string(row, 1, &participant.identity.name)?;
                sheet.write_string(
                    row,
                    2,
                    participant.identity.department.as_deref().unwrap_or(""),
                )?;
                sheet.write_string(row, 3, &a.club_name)?;
                sheet.write_number(row, 4, a.score)?;
                sheet.write_string(row, 5, &a.period)?;
                let source = match a.date_source {
                    DateSource::Label => "label",
                    DateSource::LabelOverride => "label override",
                    DateSource::PeriodDefault => "period default",
                };
                sheet.write_string(row, 6, source)?;
            }
        }
        sheet.set_column_width(0, 12)?;
        sheet.set_column_width(3, 24)?;
        if activity_rows > 0 {
            sheet.autofilter(0, 0, activity_rows, 6)?;
        }
    }

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Statistics")?;
        sheet.write_string_with_format(0, 0, "Activity Statistics", &title_fmt)?;
        sheet.set_column_width(0, 24)?;
        let mut row = 2u32;
        sheet.write_string_with_format(row, 0, "Participants", &header_fmt)?;
        sheet.write_number(row, 1, stats.participant_count as f64)?;
        for (gender, count) in &stats.gender_counts {
            row += 1;
            sheet.write_string(row, 0, gender.as_str())?;
            sheet.write_number(row, 1, *count as f64)?;
        }
        for (label, value) in [
            ("Mean score", stats.score.mean),
            ("Max score", stats.score.max),
            ("Min score", stats.score.min),
            ("Body-fat upload completion", stats.completion_rate),
        ] {
            row += 1;
            sheet.write_string(row, 0, label)?;
            if let Some(v) = value {
                sheet.write_number(row, 1, v)?;
            }
        }

        row += 2;
        for (col, h) in ["Category", "Total score", "Count", "Participants"].iter().enumerate() {
            sheet.write_string_with_format(row, col as u16, *h, &header_fmt)?;
        }
        for c in &stats.categories {
            row += 1;
            sheet.write_string(row, 0, c.category.as_str())?;
            sheet.write_number(row, 1, c.total_score)?;
            sheet.write_number(row, 2, c.total_count as f64)?;
            sheet.write_number(row, 3, c.participants as f64)?;
        }

        row += 2;
        sheet.write_string_with_format(row, 0, "Score band", &header_fmt)?;
        for (col, label) in BAND_LABELS.iter().enumerate() {
            sheet.write_string_with_format(row, (col + 1) as u16, *label, &header_fmt)?;
        }
        for (gender, bands) in &stats.score_bands {
            row += 1;
            sheet.write_string(row, 0, gender.as_str())?;
            for (col, count) in bands.iter().enumerate() {
                sheet.write_number(row, (col + 1) as u16, *count as f64)?;
            }
        }

        row += 2;
        for (col, h) in ["Department", "Gender", "Count", "Mean score"].iter().enumerate() {
            sheet.write_string_with_format(row, col as u16, *h, &header_fmt)?;
        }
        for d in &stats.departments {
            row += 1;
            sheet.write_string(row, 0, &d.department)?;
            sheet.write_string(row, 1, d.gender.as_str())?;
            sheet.write_number(row, 2, d.participants as f64)?;
            sheet.write_number(row, 3, d.mean_score)?;
        }
    }

    write_diagnostics_sheet(&mut workbook, &snapshot.diagnostics, &header_fmt)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    workbook
        .save(output)
        .map_err(|e| anyhow::anyhow!("Failed to save workbook: {}", e))?;

    Ok(format!(
        "Workbook created: {}\n  Female: {}\n  Male: {}\n  Club activities: {}\n  Diagnostics: {}",
        output.display(),
        leaderboard.female.len(),
        leaderboard.male.len(),
        activity_rows,
        snapshot.diagnostics.len()
    ))
}

fn write_diagnostics_sheet(
    workbook: &mut rust_xlsxwriter::Workbook,
    diagnostics: &Diagnostics,
    header_fmt: &rust_xlsxwriter::Format,
) -> Result<()> {
    let sheet = workbook.add_worksheet();
    sheet.set_name("Diagnostics")?;
    for (col, h) in ["kind", "period", "message"].iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *h, header_fmt)?;
    }
    for (i, d) in diagnostics.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, d.kind().as_str())?;
        sheet.write_string(row, 1, d.period().unwrap_or(""))?;
        sheet.write_string(row, 2, d.to_string())?;
    }
    sheet.set_column_width(0, 20)?;
    sheet.set_column_width(1, 14)?;
    sheet.set_column_width(2, 100)?;
    if !diagnostics.is_empty() {
        sheet.autofilter(0, 0, diagnostics.len() as u32, 2)?;
    }
    Ok(())
}
