//! Game review CLI
//!
//! Evaluates a PGN with Lichess cloud evaluations where available and local
//! Stockfish workers for the rest, then prints per-player accuracy.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use review_engine::chess_core::Players;
use review_engine::cloud::CloudClient;
use review_engine::config::ReviewConfig;
use review_engine::orchestrator::Orchestrator;
use review_engine::progress::Phase;
use review_engine::report::{AccuracyReportBuilder, Report};
use review_engine::saved::{load_saved, SavedAnalysis};
use review_engine::stockfish::StockfishEvaluator;

#[derive(Parser, Debug)]
#[command(name = "game-review", about = "Review a chess game and report accuracy per player")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a PGN file and print the report
    Review {
        /// PGN file to review
        pgn: PathBuf,
        /// Target search depth (1-24)
        #[arg(long)]
        depth: Option<u32>,
        /// Maximum concurrent Stockfish processes
        #[arg(long)]
        workers: Option<usize>,
        /// Write the finished analysis to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Print a previously saved analysis without re-evaluating
    Load {
        /// Saved analysis JSON
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    match Args::parse().command {
        Command::Review {
            pgn,
            depth,
            workers,
            save,
        } => review(pgn, depth, workers, save).await,
        Command::Load { file } => {
            let text = tokio::fs::read_to_string(&file).await?;
            let saved = load_saved(&text)?;
            print_report(&saved.players, &saved.results);
            Ok(())
        }
    }
}

async fn review(
    pgn_path: PathBuf,
    depth: Option<u32>,
    workers: Option<usize>,
    save: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = ReviewConfig::from_env()?;
    if let Some(workers) = workers {
        config.max_workers = workers;
    }
    config.validate()?;
    let depth = depth.unwrap_or(config.default_depth);

    info!(
        stockfish_path = %config.stockfish_path,
        depth,
        workers = config.max_workers,
        "Review config loaded"
    );

    let pgn = tokio::fs::read_to_string(&pgn_path).await?;

    let orchestrator = Orchestrator::new(
        CloudClient::new(&config.cloud_eval_url, config.cloud_timeout)?,
        StockfishEvaluator::new(&config.stockfish_path, config.stockfish_hash_mb),
        AccuracyReportBuilder,
        config.pool_settings(),
    );

    let bar = ProgressBar::new(1000);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.green/blue}] {msg}")?
            .progress_chars("██░"),
    );

    let mut progress = orchestrator.subscribe();
    let watcher = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let current = *progress.borrow_and_update();
                bar.set_position((current.percent * 10.0) as u64);
                let label = match current.phase {
                    Phase::Cloud => "Fetching cloud evaluations",
                    Phase::Local => "Evaluating positions",
                    Phase::Reporting => "Generating report",
                    Phase::Complete => "Evaluation complete",
                    Phase::Failed => "Failed",
                    Phase::Idle => "",
                };
                bar.set_message(format!("{label} ({:.1}%)", current.percent));
            }
        })
    };

    let result = orchestrator.review_pgn(&pgn, depth).await;
    watcher.abort();
    bar.finish_and_clear();

    let review = result?;
    print_report(&review.players, &review.report);

    if let Some(path) = save {
        let saved = SavedAnalysis::from(review);
        tokio::fs::write(&path, saved.to_json_pretty()?).await?;
        println!("Saved analysis to {}", path.display());
    }

    Ok(())
}

fn print_report(players: &Players, report: &Report) {
    let rows = [
        (&players.white, report.accuracies.white, &report.classifications.white),
        (&players.black, report.accuracies.black, &report.classifications.black),
    ];

    for (profile, accuracy, counts) in rows {
        println!(
            "{} ({}): {:.1}%  best {} / excellent {} / good {} / inaccuracy {} / mistake {} / blunder {} / forced {}",
            profile.username,
            profile.rating,
            accuracy,
            counts.best,
            counts.excellent,
            counts.good,
            counts.inaccuracy,
            counts.mistake,
            counts.blunder,
            counts.forced,
        );
    }
}
