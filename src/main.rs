use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;

use mc_2048::cli::{init_tracing, SearchArgs};
use mc_2048::engine::Board;
use mc_2048::montecarlo::{MonteCarlo, SearchConfig};

#[derive(Debug, Parser)]
#[command(name = "mc-2048", version, about = "Self-play 2048 with the Monte-Carlo tree advisor")]
struct Args {
    #[command(flatten)]
    search: SearchArgs,

    /// Stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Seed for the game's own tile spawns (default: from entropy)
    #[arg(long)]
    game_seed: Option<u64>,

    /// Print the board after every move
    #[arg(long)]
    show_boards: bool,

    /// Suppress the status line
    #[arg(long)]
    quiet: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "MC2048_LOG", default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let cfg = args.search.to_config(SearchConfig::default());
    info!(?cfg, "starting self-play");
    let mut policy = MonteCarlo::with_config(cfg).context("failed to set up search")?;
    let mut rng = match args.game_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut board = Board::EMPTY;
    for _ in 0..2 {
        board = board.with_random_tile(&mut rng).context("empty board has no room for a tile")?;
    }
    println!("{board}\n");

    let pb = (!args.quiet && !args.show_boards).then(spinner).transpose()?;
    let start = Instant::now();
    let mut moves: u64 = 0;

    let outcome = loop {
        let Some(dir) = policy.best_move(board) else {
            break "Couldn't find good direction. Game over";
        };
        board = board.shift(dir);
        moves += 1;
        match board.with_random_tile(&mut rng) {
            Some(next) => board = next,
            None => break "Couldn't place piece. Game over",
        }

        if args.show_boards {
            println!("Moving {dir}\n{board}\n");
        }
        if let Some(pb) = &pb {
            let rate = moves as f64 / start.elapsed().as_secs_f64().max(1e-6);
            pb.set_message(format!("{moves} | moves/sec: {rate:.1} | score: {}", board.score()));
        }
        if args.steps.is_some_and(|limit| moves >= limit) {
            break "Step limit reached";
        }
    };

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let elapsed = start.elapsed().as_secs_f64().max(1e-6);
    info!(moves, score = board.score(), highest_tile = board.highest_tile(), elapsed_s = elapsed, "game finished");

    println!("{outcome}");
    println!("After {moves} moves:\n{board}");
    if !args.quiet {
        println!(
            "Moves: {} | moves/sec: {:.1} | highest tile: {} | states considered (last move): {}",
            moves,
            moves as f64 / elapsed,
            board.highest_tile(),
            policy.last_stats().nodes
        );
    }
    Ok(())
}

fn spinner() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {elapsed_precise} | Moves: {msg}")?
            .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}
