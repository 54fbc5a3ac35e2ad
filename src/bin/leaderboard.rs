//! Leaderboard - rank participants of the activity competition
//!
//! Reads the configured period exports and roster, aggregates scores across
//! periods, and prints or exports the gender leaderboards.

use activity_leaderboard::config::CompetitionConfig;
use activity_leaderboard::model::Gender;
use activity_leaderboard::pipeline::{self, LeaderboardSnapshot};
use activity_leaderboard::report::{self, PersonDetail};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "leaderboard")]
#[command(about = "Aggregate activity scores and rank participants for prizes")]
struct Cli {
    /// Competition config (YAML)
    #[arg(short, long, env = "LEADERBOARD_CONFIG", default_value = "leaderboard.yaml", global = true)]
    config: PathBuf,

    /// Override the competition year
    #[arg(long, global = true)]
    year: Option<i32>,

    /// Override the prize eligibility threshold
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Number of parallel threads for period extraction (default: number of CPU cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Partition {
    Female,
    Male,
    All,
}

#[derive(Clone, Copy, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the ranked tables
    Rank {
        /// Which partition to show
        #[arg(short, long, value_enum, default_value = "all")]
        partition: Partition,

        /// Show only the top N entries
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write CSV or JSON output here instead of stdout (one file per partition, suffixed)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show one participant's detail
    Person {
        /// Exact participant name
        #[arg(short, long)]
        name: String,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Search ranked participants by partial name
    Search {
        /// Case-insensitive substring
        query: String,
    },

    /// Print corpus-wide statistics
    Stats,

    /// Run the pipeline and print diagnostics only
    Check,

    /// Write the full XLSX workbook
    Export {
        /// Output xlsx path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the default config as YAML
    DefaultConfig,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Commands::DefaultConfig = cli.command {
        print!("{}", CompetitionConfig::default().to_yaml()?);
        return Ok(());
    }

    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    let mut config = CompetitionConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(year) = cli.year {
        config.year = year;
    }
    if let Some(threshold) = cli.threshold {
        config.eligibility_threshold = Some(threshold);
    }
    config.validate()?;

    let snapshot = pipeline::run(&config).context("Leaderboard pipeline failed")?;

    match cli.command {
        Commands::Rank {
            partition,
            top,
            format,
            output,
        } => rank(&snapshot, &config, partition, top, format, output)?,
        Commands::Person { name, format } => {
            let board = snapshot.leaderboard(&config);
            let participant = snapshot
                .participant(&name)
                .ok_or_else(|| anyhow::anyhow!("No participant named '{}'", name.trim()))?;
            let detail = PersonDetail::new(participant, &board);
            match format {
                OutputFormat::Json => println!("{}", detail.to_json()?),
                _ => print!("{}", detail.to_text()?),
            }
        }
        Commands::Search { query } => {
            let board = snapshot.leaderboard(&config);
            let hits = board.search(&query);
            if hits.is_empty() {
                println!("No participant matches '{}'", query);
            }
            for (gender, entry) in hits {
                println!(
                    "{:<8} #{:<4} {:<20} {:>10}",
                    gender.as_str(),
                    entry.rank,
                    entry.name(),
                    entry.total_score()
                );
            }
        }
        Commands::Stats => print!("{}", report::stats_text(&snapshot.stats())?),
        Commands::Check => print!("{}", snapshot.summary()),
        Commands::Export { output } => {
            let board = snapshot.leaderboard(&config);
            let summary = report::write_workbook(&output, &snapshot, &board, &snapshot.stats())?;
            println!("{}", summary);
        }
        // Printed before the config was loaded.
        Commands::DefaultConfig => {}
    }

    Ok(())
}

fn rank(
    snapshot: &LeaderboardSnapshot,
    config: &CompetitionConfig,
    partition: Partition,
    top: Option<usize>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let board = snapshot.leaderboard(config);
    let genders: &[Gender] = match partition {
        Partition::Female => &[Gender::Female],
        Partition::Male => &[Gender::Male],
        Partition::All => &Gender::RANKED,
    };

    for &gender in genders {
        let Some(table) = board.partition(gender) else {
            continue;
        };
        match (format, &output) {
            (OutputFormat::Csv, Some(path)) => {
                let path = suffixed(path, gender.as_str());
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                report::write_ranked_csv(table, top, BufWriter::new(file))?;
                let rows = top.map_or(table.len(), |n| n.min(table.len()));
                println!("Wrote {} ({} rows)", path.display(), rows);
            }
            (OutputFormat::Csv, None) => print!("{}", report::ranked_csv_string(table, top)?),
            (OutputFormat::Json, Some(path)) => {
                let path = suffixed(path, gender.as_str());
                std::fs::write(&path, report::ranked_json(table, top)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
            (OutputFormat::Json, None) => println!("{}", report::ranked_json(table, top)?),
            (OutputFormat::Text, _) => print!("{}", report::ranked_table_text(table, top)?),
        }
    }

    if !board.unranked().is_empty() {
        eprintln!(
            "{} participant(s) without a recognized gender were not ranked",
            board.unranked().len()
        );
    }
    Ok(())
}

// ranking.csv -> ranking_female.csv
fn suffixed(path: &std::path::Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ranking");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("out");
    path.with_file_name(format!("{}_{}.{}", stem, suffix, ext))
}
