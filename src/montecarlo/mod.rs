//! Monte-Carlo tree sampling policy for 2048.
//!
//! Each repetition builds one random game tree from the current board
//! ([`SearchNode`]): every node tries all four moves, spawns one random tile
//! per move that changed the board, and recurses to a fixed depth. Scores are
//! propagated optimistically (best child wins), so the root ends up naming the
//! first move of the best sampled line. [`MonteCarlo`] runs many repetitions
//! on a dedicated worker pool and aggregates their answers.
//!
//! Notes
//! - Tile placement is random, not adversarial; this is sampling, not minimax.
//! - Every repetition owns its own seeded generator. With a fixed
//!   [`SearchConfig::seed`] the result does not depend on the worker count.
//!
//! Quick start
//! ```
//! use mc_2048::engine::Board;
//! use mc_2048::montecarlo::{MonteCarlo, SearchConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let b0 = Board::EMPTY
//!     .with_random_tile(&mut rng)
//!     .and_then(|b| b.with_random_tile(&mut rng))
//!     .unwrap();
//!
//! let cfg = SearchConfig { depth: 3, reps: 8, parallelism: 2, seed: Some(7), ..Default::default() };
//! let mut mc = MonteCarlo::with_config(cfg).unwrap();
//! assert!(mc.best_move(b0).is_some());
//! ```

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::engine::{Board, Move};

mod search;
mod tally;
mod tree;

pub use search::MonteCarlo;
pub use tally::DirectionTally;
pub use tree::SearchNode;

/// Deepest tree a configuration may request. A full tree has up to
/// `4^depth` nodes per repetition.
pub const MAX_DEPTH: u32 = 12;

/// Errors raised while setting up a search.
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("invalid search config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("parallelism must be at least 1")]
    ZeroParallelism,
    #[error("depth {depth} exceeds the maximum of {max}")]
    DepthTooLarge { depth: u32, max: u32 },
    #[error("unknown aggregation mode {0:?} (expected `vote` or `max-score`)")]
    UnknownAggregation(String),
}

/// How per-repetition answers are combined into one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    /// The direction reported by the most repetitions.
    #[default]
    Vote,
    /// The direction whose best sampled root score is highest.
    MaxScore,
}

impl Aggregation {
    /// Pick a direction. Ties resolve to the earliest direction in
    /// [`Move::ALL`]; no reports at all yields `None`.
    pub fn decide(self, tally: &DirectionTally, best_scores: &[Option<u64>; 4]) -> Option<Move> {
        match self {
            Aggregation::Vote => tally.winner(),
            Aggregation::MaxScore => {
                let mut best: Option<(u64, Move)> = None;
                for dir in Move::ALL {
                    if let Some(score) = best_scores[dir.index()] {
                        if best.map_or(true, |(top, _)| score > top) {
                            best = Some((score, dir));
                        }
                    }
                }
                best.map(|(_, dir)| dir)
            }
        }
    }
}

impl FromStr for Aggregation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vote" => Ok(Aggregation::Vote),
            "max-score" | "max_score" | "maxscore" => Ok(Aggregation::MaxScore),
            other => Err(ConfigError::UnknownAggregation(other.to_string())),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Aggregation::Vote => "vote",
            Aggregation::MaxScore => "max-score",
        })
    }
}

/// Configurable knobs for the search.
///
/// - `depth`: move levels expanded per tree.
/// - `reps`: independent trees built per decision.
/// - `parallelism`: worker threads sharing the repetitions.
/// - `concurrency_depth`: tree levels that expand their four subtrees in
///   parallel (0 keeps each tree sequential).
/// - `aggregation`: how repetition answers are combined.
/// - `seed`: fixed base seed; `None` seeds from the wall clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub depth: u32,
    pub reps: usize,
    pub parallelism: usize,
    pub concurrency_depth: u32,
    pub aggregation: Aggregation,
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let parallelism = default_parallelism();
        Self {
            depth: 6,
            reps: parallelism * 2,
            parallelism,
            concurrency_depth: 0,
            aggregation: Aggregation::Vote,
            seed: None,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        if self.depth > MAX_DEPTH {
            return Err(ConfigError::DepthTooLarge { depth: self.depth, max: MAX_DEPTH });
        }
        Ok(())
    }
}

/// Number of hardware threads, or 1 when it cannot be queried.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Basic search stats for a single decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Tree nodes built across all repetitions.
    pub nodes: u64,
    /// Largest `nodes` value seen since the last reset.
    pub peak_nodes: u64,
    /// Repetitions run.
    pub reps: u64,
    /// Repetitions whose tree had no move at the root.
    pub no_move_reps: u64,
}

/// Outcome of one decision: the aggregated reports and the chosen move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub tally: DirectionTally,
    /// Best root score reported for each direction, `None` if never reported.
    pub best_scores: [Option<u64>; 4],
    pub decision: Option<Move>,
}

/// Recommend a move for `board`, or `None` if no sampled future has one.
///
/// Builds a one-off [`MonteCarlo`] with `depth`, `reps` and `parallelism`
/// and the remaining settings at their defaults.
///
/// ```
/// use mc_2048::engine::Board;
/// use mc_2048::montecarlo::recommend_move;
///
/// // Nothing can move on an empty board.
/// assert_eq!(recommend_move(Board::EMPTY, 3, 4, 2).unwrap(), None);
/// ```
pub fn recommend_move(
    board: Board,
    depth: u32,
    reps: usize,
    parallelism: usize,
) -> Result<Option<Move>, SearchError> {
    let cfg = SearchConfig { depth, reps, parallelism, ..SearchConfig::default() };
    Ok(MonteCarlo::with_config(cfg)?.best_move(board))
}
