//! Ranking behavior over snapshots built from in-memory period tables.

use activity_leaderboard::config::CompetitionConfig;
use activity_leaderboard::model::Gender;
use activity_leaderboard::pipeline::{run_with_tables, LeaderboardSnapshot};
use activity_leaderboard::ranking::PrizeStatus;
use activity_leaderboard::table::PeriodTable;

fn config(threshold: Option<f64>) -> CompetitionConfig {
    let mut config = CompetitionConfig::default();
    config.roster = None;
    config.periods.truncate(1);
    config.periods[0].id = "p1".to_string();
    config.eligibility_threshold = threshold;
    config
}

/// One period with `name,gender,exercise,diet,bonus,total` rows.
fn snapshot(config: &CompetitionConfig, rows: &[(&str, &str, f64)]) -> LeaderboardSnapshot {
    let mut csv = String::from("name,gender,exercise,diet,bonus,total\n");
    for (name, gender, exercise) in rows {
        csv.push_str(&format!("{},{},{},0,0,{}\n", name, gender, exercise, exercise));
    }
    let table = PeriodTable::parse_csv(&csv, "p1").unwrap();
    run_with_tables(config, vec![table], None).unwrap()
}

#[test]
fn test_rank_five_below_threshold_is_ineligible() {
    let config = config(Some(200.0));
    let snapshot = snapshot(
        &config,
        &[
            ("F1", "F", 400.0),
            ("F2", "F", 350.0),
            ("F3", "F", 300.0),
            ("F4", "F", 250.0),
            ("F5", "F", 150.0),
            ("F6", "F", 120.0),
        ],
    );
    let board = snapshot.leaderboard(&config);

    let fifth = board.female.entry_at_rank(5).unwrap();
    assert_eq!(fifth.name(), "F5");
    assert_eq!(fifth.rank, 5);
    assert!(matches!(fifth.prize, PrizeStatus::Ineligible { .. }));
    assert_eq!(fifth.prize.amount(), None);
    assert_eq!(fifth.prize.code(), "score_below_threshold");

    for entry in board.female.prize_winners() {
        assert!(entry.total_score() >= 200.0);
    }
    assert!(board.female.entry_at_rank(7).is_none());
}

#[test]
fn test_gate_disabled_pays_by_rank_only() {
    let config = config(None);
    let snapshot = snapshot(&config, &[("F1", "F", 10.0), ("M1", "M", 5.0)]);
    let board = snapshot.leaderboard(&config);
    assert_eq!(board.female.entries[0].prize.amount(), Some(6000));
    assert_eq!(board.male.entries[0].prize.amount(), Some(6000));
}

#[test]
fn test_ties_keep_input_order_across_runs() {
    let config = config(None);
    for _ in 0..5 {
        let snapshot = snapshot(&config, &[("P1", "F", 100.0), ("P2", "F", 100.0)]);
        let board = snapshot.leaderboard(&config);
        let order: Vec<(u32, &str)> = board
            .female
            .entries
            .iter()
            .map(|e| (e.rank, e.name()))
            .collect();
        assert_eq!(order, vec![(1, "P1"), (2, "P2")]);
    }
}

#[test]
fn test_ranks_dense_and_scores_monotonic() {
    let config = config(Some(200.0));
    let rows: Vec<(String, &str, f64)> = (0..40)
        .map(|i| {
            let gender = if i % 3 == 0 { "M" } else { "F" };
            (format!("P{:02}", i), gender, ((i * 37) % 23) as f64 * 17.0)
        })
        .collect();
    let borrowed: Vec<(&str, &str, f64)> =
        rows.iter().map(|(n, g, s)| (n.as_str(), *g, *s)).collect();
    let snapshot = snapshot(&config, &borrowed);
    let board = snapshot.leaderboard(&config);

    for table in board.tables() {
        let ranks: Vec<u32> = table.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, (1..=table.len() as u32).collect::<Vec<_>>());
        for pair in table.entries.windows(2) {
            assert!(pair[0].total_score() >= pair[1].total_score());
        }
        for entry in &table.entries {
            if entry.total_score() < 200.0 {
                assert!(!entry.prize.is_awarded());
            }
        }
    }
    assert_eq!(board.female.len() + board.male.len(), 40);
}

#[test]
fn test_unknown_gender_counted_but_not_ranked() {
    let config = config(None);
    let snapshot = snapshot(&config, &[("F1", "F", 10.0), ("X", "", 99.0)]);
    let board = snapshot.leaderboard(&config);

    assert_eq!(board.unranked().len(), 1);
    assert!(board.find_person("X").is_none());
    assert_eq!(snapshot.stats().participant_count, 2);
    assert_eq!(snapshot.stats().gender_count(Gender::Unknown), 1);
}

#[test]
fn test_person_lookup_and_cutoff() {
    let config = config(None);
    let rows: Vec<(String, &str, f64)> = (1..=5)
        .map(|i| (format!("M{}", i), "M", 100.0 - i as f64 * 10.0))
        .collect();
    let borrowed: Vec<(&str, &str, f64)> =
        rows.iter().map(|(n, g, s)| (n.as_str(), *g, *s)).collect();
    let snapshot = snapshot(&config, &borrowed);
    let board = snapshot.leaderboard(&config);

    let found = board.find_person("M3").unwrap();
    assert_eq!(found.gender, Gender::Male);
    assert_eq!(found.entry.rank, 3);
    assert_eq!(found.partition_size, 5);
    assert_eq!(board.male.score_gap_to_previous(3), Some(10.0));

    // Default male tiers end at rank 14.
    assert_eq!(board.male.prize_cutoff_score(), None);
    assert_eq!(board.male.top_n(2).len(), 2);
}
