//! Move advisor for a game played elsewhere.
//!
//! Enter the tiles the game spawns and the moves you make; a recommendation
//! is printed before every move. End the session with EOF (Ctrl-D).

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context};
use clap::Parser;

use mc_2048::cli::{init_tracing, SearchArgs};
use mc_2048::engine::{Board, Move};
use mc_2048::montecarlo::{MonteCarlo, SearchConfig};

#[derive(Debug, Parser)]
#[command(name = "interactive", version, about = "Interactive 2048 move advisor")]
struct Args {
    #[command(flatten)]
    search: SearchArgs,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "MC2048_LOG", default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    // Few deep trees, each fanning out over the first two levels.
    let defaults = SearchConfig { depth: 9, reps: 1, concurrency_depth: 2, ..SearchConfig::default() };
    let mut policy = MonteCarlo::with_config(args.search.to_config(defaults)).context("failed to set up search")?;

    let stdin = io::stdin();
    let mut input = stdin.lock().lines();
    let mut board = Board::EMPTY;
    println!("{board}\n");
    println!("Requesting initial game state");
    for _ in 0..2 {
        match request_tile(&mut input, board)? {
            Some(next) => board = next,
            None => return finish(board),
        }
    }
    println!("{board}\n");

    loop {
        match policy.best_move(board) {
            Some(dir) => println!("I recommend moving {dir}"),
            None => println!("I couldn't find a good direction"),
        }
        let Some(dir) = request_direction(&mut input)? else { break };
        let (moved, changed) = board.apply_move(dir);
        if !changed {
            println!("Moving {dir} doesn't change the board");
            continue;
        }
        board = moved;
        println!("{board}\n");
        match request_tile(&mut input, board)? {
            Some(next) => board = next,
            None => break,
        }
    }
    finish(board)
}

fn finish(board: Board) -> anyhow::Result<()> {
    println!("\n{board}");
    Ok(())
}

fn prompt(text: &str) -> io::Result<()> {
    print!("{text}");
    io::stdout().flush()
}

/// Ask until a valid tile is entered. `None` on EOF.
fn request_tile<I>(input: &mut I, board: Board) -> anyhow::Result<Option<Board>>
where
    I: Iterator<Item = io::Result<String>>,
{
    loop {
        prompt("Enter the row, column, and value of the tile, separated by spaces: ")?;
        let Some(line) = input.next().transpose()? else { return Ok(None) };
        let placed = parse_tile(&line).and_then(|(row, col, value)| Ok(board.with_tile(row, col, value)?));
        match placed {
            Ok(next) => return Ok(Some(next)),
            Err(e) => println!("{e}"),
        }
    }
}

/// Ask until a valid direction is entered. `None` on EOF.
fn request_direction<I>(input: &mut I) -> anyhow::Result<Option<Move>>
where
    I: Iterator<Item = io::Result<String>>,
{
    loop {
        prompt("Enter which direction you want to go (l, r, u, d): ")?;
        let Some(line) = input.next().transpose()? else { return Ok(None) };
        match line.parse::<Move>() {
            Ok(dir) => return Ok(Some(dir)),
            Err(e) => println!("{e}"),
        }
    }
}

fn parse_tile(line: &str) -> anyhow::Result<(usize, usize, u32)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [row, col, value] = fields[..] else {
        bail!("expected `row col value`, got {:?}", line.trim());
    };
    Ok((
        row.parse().with_context(|| format!("bad row {row:?}"))?,
        col.parse().with_context(|| format!("bad column {col:?}"))?,
        value.parse().with_context(|| format!("bad value {value:?}"))?,
    ))
}
