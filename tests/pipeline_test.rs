//! End-to-end pipeline tests over period exports written to a temp directory.
//!
//! Each test writes a small competition (config, roster, period CSVs) and runs
//! the same entry point the CLI uses.

use activity_leaderboard::config::CompetitionConfig;
use activity_leaderboard::diagnostics::{Diagnostic, DiagnosticKind};
use activity_leaderboard::model::{Category, Gender};
use activity_leaderboard::pipeline::{run, run_with_tables};
use activity_leaderboard::report::{self, ranked_csv_string};
use activity_leaderboard::table::PeriodTable;
use activity_leaderboard::LeaderboardError;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const CONFIG: &str = r#"
year: 2025
roster: roster.csv
periods:
  - id: p2
    source: p2.csv
    default_club_date: 2025-09-10
  - id: p1
    source: p1.csv
    default_club_date: 2025-08-15
    label_dates:
      人資講座: 2025-08-08
prize_tables:
  female:
    - { from: 1, to: 2, amount: 6000, label: Gold, icon: "🥇" }
    - { from: 3, to: 8, amount: 3000, label: Silver, icon: "🥈" }
    - { from: 9, to: 18, amount: 2000, label: Bronze, icon: "🥉" }
    - { from: 19, to: 28, amount: 1000, label: Merit, icon: "🏅" }
  male:
    - { from: 1, to: 1, amount: 6000, label: Gold, icon: "🥇" }
    - { from: 2, to: 4, amount: 3000, label: Silver, icon: "🥈" }
eligibility_threshold: 200
"#;

fn write_file(dir: &Path, name: &str, lines: &[&str]) {
    let mut f = File::create(dir.join(name)).unwrap();
    for line in lines {
        writeln!(f, "{}", line).unwrap();
    }
}

fn write_roster(dir: &Path) {
    write_file(
        dir,
        "roster.csv",
        &[
            "帳號(最新8/8)2,姓名,性別,所屬部門",
            "A01,Chen,生理女,R&D",
            "A02,Wang,生理女,HR",
            "A03,Lin,生理男,Sales",
        ],
    );
}

fn write_p1(dir: &Path) {
    write_file(
        dir,
        "p1.csv",
        &[
            "帳號,姓名,性別,所屬部門,日常運動,飲食,bonus,人資講座,total",
            "A01,Chen,生理女,R&D,50,20,0,,70",
            "A02,Wang,生理女,HR,100,40,60,10,210",
        ],
    );
}

fn write_p2(dir: &Path) {
    write_file(
        dir,
        "p2.csv",
        &[
            "姓名,性別,所屬部門,日常運動,飲食,bonus,9/2 Badminton,Yoga,total",
            "Chen,生理女,R&D,30,10,30,15,,85",
            "Lin,,Sales,80,20,0,,5,105",
        ],
    );
}

fn competition() -> (TempDir, CompetitionConfig) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("competition.yaml"), CONFIG).unwrap();
    write_roster(dir.path());
    write_p1(dir.path());
    write_p2(dir.path());
    let config = CompetitionConfig::load(&dir.path().join("competition.yaml")).unwrap();
    (dir, config)
}

#[test]
fn test_two_period_totals_and_club_record() {
    let (_dir, config) = competition();
    let snapshot = run(&config).unwrap();

    let chen = snapshot.participant("Chen").unwrap();
    assert_eq!(chen.identity.id.as_deref(), Some("A01"));
    assert_eq!(chen.total_score, 155.0);
    assert_eq!(chen.category(Category::Exercise).count, 8);
    assert_eq!(chen.category(Category::Diet).count, 3);
    assert_eq!(chen.category(Category::Bonus).count, 1);
    assert_eq!(chen.category(Category::Club).score, 15.0);
    assert_eq!(chen.club_activities.len(), 1);

    let activity = &chen.club_activities[0];
    assert_eq!(activity.date_label(), "2025/09/02");
    assert_eq!(activity.club_name, "Badminton");
    assert_eq!(activity.score, 15.0);
    assert_eq!(chen.discrepancy(), None);
}

#[test]
fn test_participants_ordered_by_period_id_not_config_order() {
    let (_dir, config) = competition();
    let snapshot = run(&config).unwrap();
    let names: Vec<&str> = snapshot
        .participants
        .iter()
        .map(|p| p.identity.name.as_str())
        .collect();
    assert_eq!(names, vec!["Chen", "Wang", "Lin"]);
    assert_eq!(snapshot.periods_loaded, vec!["p1", "p2"]);
}

#[test]
fn test_roster_supplies_missing_gender_and_undated_dates() {
    let (_dir, config) = competition();
    let snapshot = run(&config).unwrap();

    let lin = snapshot.participant("Lin").unwrap();
    assert_eq!(lin.identity.gender, Gender::Male);
    assert_eq!(lin.identity.id.as_deref(), Some("A03"));
    assert_eq!(lin.club_activities[0].date_label(), "2025/09/10");

    let wang = snapshot.participant("Wang").unwrap();
    assert_eq!(wang.club_activities[0].club_name, "人資講座");
    assert_eq!(wang.club_activities[0].date_label(), "2025/08/08");
    assert_eq!(snapshot.diagnostics.count(DiagnosticKind::ParseWarning), 2);
}

#[test]
fn test_sum_invariant_and_count_reconstruction() {
    let (_dir, config) = competition();
    let snapshot = run(&config).unwrap();

    for p in &snapshot.participants {
        let t = &p.category_totals;
        assert_eq!(
            p.total_score,
            t.exercise.score + t.diet.score + t.bonus.score + t.club.score
        );
        for entry in p.per_period.values() {
            for category in [Category::Exercise, Category::Diet, Category::Bonus] {
                let divisor = config.divisors.get(category).unwrap();
                let total = entry.category(category);
                assert_eq!(total.count, (total.score / divisor).floor() as u32);
            }
        }
    }
}

#[test]
fn test_missing_total_column_keeps_fixed_categories() {
    let (dir, config) = competition();
    write_file(
        dir.path(),
        "p2.csv",
        &[
            "姓名,性別,所屬部門,日常運動,飲食,bonus,9/2 Badminton",
            "Chen,生理女,R&D,30,10,30,15",
        ],
    );
    let snapshot = run(&config).unwrap();

    let chen = snapshot.participant("Chen").unwrap();
    assert_eq!(chen.total_score, 140.0);
    assert_eq!(chen.category(Category::Bonus).score, 30.0);
    assert!(chen.club_activities.is_empty());
    assert_eq!(
        snapshot.diagnostics.count(DiagnosticKind::ColumnBoundaryError),
        1
    );
    assert!(snapshot.periods_failed.is_empty());
}

#[test]
fn test_schema_error_skips_only_that_period() {
    let (dir, config) = competition();
    write_file(dir.path(), "p1.csv", &["帳號,日常運動,飲食,bonus,total", "A01,50,20,0,70"]);
    let snapshot = run(&config).unwrap();

    assert_eq!(snapshot.periods_failed, vec!["p1"]);
    assert_eq!(snapshot.diagnostics.skipped_periods(), vec!["p1"]);
    assert!(snapshot.participant("Wang").is_none());
    assert_eq!(snapshot.participant("Chen").unwrap().total_score, 85.0);
}

#[test]
fn test_unreadable_source_is_isolated() {
    let (dir, config) = competition();
    fs::remove_file(dir.path().join("p2.csv")).unwrap();
    let snapshot = run(&config).unwrap();

    assert_eq!(snapshot.periods_failed, vec!["p2"]);
    assert!(snapshot
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::SourceUnreadable { period, .. } if period == "p2")));
    assert_eq!(snapshot.participants.len(), 2);
}

#[test]
fn test_no_valid_period_is_hard_failure() {
    let (dir, config) = competition();
    fs::remove_file(dir.path().join("p1.csv")).unwrap();
    write_file(dir.path(), "p2.csv", &["foo,bar", "1,2"]);

    match run(&config) {
        Err(LeaderboardError::NoParticipantData {
            periods_failed,
            periods_total,
        }) => {
            assert_eq!(periods_failed, 2);
            assert_eq!(periods_total, 2);
        }
        other => panic!("expected NoParticipantData, got {:?}", other.map(|s| s.participants.len())),
    }
}

#[test]
fn test_sheet_total_mismatch_is_reported_not_used() {
    let (dir, config) = competition();
    write_file(
        dir.path(),
        "p1.csv",
        &[
            "帳號,姓名,性別,所屬部門,日常運動,飲食,bonus,total",
            "A01,Chen,生理女,R&D,50,20,0,75",
        ],
    );
    let snapshot = run(&config).unwrap();

    let chen = snapshot.participant("Chen").unwrap();
    assert_eq!(chen.total_score, 155.0);
    assert_eq!(chen.source_total, Some(160.0));
    assert_eq!(chen.discrepancy(), Some(-5.0));
    assert!(snapshot.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::TotalDiscrepancy { period, computed, source, .. }
            if period == "p1" && *computed == 70.0 && *source == 75.0
    )));
}

#[test]
fn test_rerun_is_byte_identical() {
    let (_dir, config) = competition();
    let render = || {
        let snapshot = run(&config).unwrap();
        let board = snapshot.leaderboard(&config);
        let mut out = String::new();
        for table in board.tables() {
            out.push_str(&ranked_csv_string(table, None).unwrap());
        }
        out
    };
    let first = render();
    assert_eq!(first, render());
    assert!(first.contains("1,🥇,Wang,HR,210,6000,Gold,awarded"));
    assert!(first.contains("2,🥇,Chen,R&D,155,,Gold,score_below_threshold"));
}

#[test]
fn test_export_workbook() {
    let (dir, config) = competition();
    let snapshot = run(&config).unwrap();
    let board = snapshot.leaderboard(&config);
    let output = dir.path().join("out").join("leaderboard.xlsx");

    let summary = report::write_workbook(&output, &snapshot, &board, &snapshot.stats()).unwrap();
    assert!(output.exists());
    assert!(summary.contains("Female: 2"));
    assert!(summary.contains("Club activities: 3"));
}

#[test]
fn test_missing_roster_is_reported_not_fatal() {
    let (dir, config) = competition();
    fs::remove_file(dir.path().join("roster.csv")).unwrap();
    let snapshot = run(&config).unwrap();

    assert_eq!(snapshot.periods_loaded, vec!["p1", "p2"]);
    assert!(snapshot
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::RosterUnreadable { .. })));
    assert_eq!(snapshot.participant("Chen").unwrap().total_score, 155.0);
    // Gender for Lin only ever came from the roster.
    assert_eq!(snapshot.participant("Lin").unwrap().identity.gender, Gender::Unknown);
}

fn write_xlsx(path: &Path, sheet: &str, lines: &[&str]) {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    workbook.add_worksheet().set_name("封面").unwrap();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet).unwrap();
    for (row, line) in lines.iter().enumerate() {
        for (col, cell) in line.split(',').enumerate() {
            let (row, col) = (row as u32, col as u16);
            if cell.is_empty() {
                continue;
            }
            match cell.parse::<f64>() {
                Ok(v) if row > 0 => {
                    worksheet.write_number(row, col, v).unwrap();
                }
                _ => {
                    worksheet.write_string(row, col, cell).unwrap();
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

#[test]
fn test_workbook_period_source_by_sheet() {
    let (dir, mut config) = competition();
    write_xlsx(
        &dir.path().join("p1.xlsx"),
        "分數累積",
        &[
            "帳號,姓名,性別,所屬部門,日常運動,飲食,bonus,人資講座,total",
            "A01,Chen,生理女,R&D,50,20,0,,70",
            "A02,Wang,生理女,HR,100,40,60,10,210",
        ],
    );
    fs::remove_file(dir.path().join("p1.csv")).unwrap();
    for period in config.periods.iter_mut().filter(|p| p.id == "p1") {
        period.source = dir.path().join("p1.xlsx");
        period.sheet = Some("分數累積".to_string());
    }
    let snapshot = run(&config).unwrap();

    assert!(snapshot.periods_failed.is_empty());
    assert_eq!(snapshot.participant("Chen").unwrap().total_score, 155.0);
    let wang = snapshot.participant("Wang").unwrap();
    assert_eq!(wang.total_score, 210.0);
    assert_eq!(wang.club_activities[0].club_name, "人資講座");
    assert_eq!(wang.discrepancy(), None);
}

fn two_period_config() -> CompetitionConfig {
    let mut config = CompetitionConfig::default();
    config.roster = None;
    config.periods[0].id = "p1".to_string();
    config.periods[1].id = "p2".to_string();
    config
}

#[test]
fn test_id_in_later_period_joins_name_only_rows() {
    let config = two_period_config();
    let name_only = "name,gender,exercise,diet,bonus,total\nChen,F,50,20,0,70\n";
    let with_id = "id,name,gender,exercise,diet,bonus,total\n7,Chen,F,30,10,30,70\n";

    for (first, second) in [(name_only, with_id), (with_id, name_only)] {
        let tables = vec![
            PeriodTable::parse_csv(first, "p1").unwrap(),
            PeriodTable::parse_csv(second, "p2").unwrap(),
        ];
        let snapshot = run_with_tables(&config, tables, None).unwrap();

        assert_eq!(snapshot.participants.len(), 1);
        let chen = &snapshot.participants[0];
        assert_eq!(chen.identity.id.as_deref(), Some("7"));
        assert_eq!(chen.total_score, 140.0);
        assert_eq!(snapshot.diagnostics.count(DiagnosticKind::IdentityWarning), 0);
    }
}
