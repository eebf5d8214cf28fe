use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, trace};

use crate::engine::{self, Board, Move};

use super::{DirectionTally, Evaluation, SearchConfig, SearchError, SearchNode, SearchStats};

/// Odd multipliers that spread repetition and round indices over the seed space.
const REP_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;
const ROUND_STRIDE: u64 = 0xD1B5_4A32_D192_ED03;

/// Repeated random tree search on a dedicated worker pool.
///
/// Every decision splits `reps` independent tree builds across
/// `parallelism` workers, then combines the root answers according to the
/// configured [`Aggregation`](super::Aggregation).
pub struct MonteCarlo {
    cfg: SearchConfig,
    pool: ThreadPool,
    stats: SearchStats,
    rounds: u64,
}

impl MonteCarlo {
    /// Search with [`SearchConfig::default`].
    pub fn new() -> Result<Self, SearchError> { Self::with_config(SearchConfig::default()) }

    pub fn with_config(cfg: SearchConfig) -> Result<Self, SearchError> {
        cfg.validate()?;
        engine::new();
        let pool = ThreadPoolBuilder::new()
            .num_threads(cfg.parallelism)
            .thread_name(|i| format!("mc-2048-worker-{i}"))
            .build()?;
        Ok(Self { cfg, pool, stats: SearchStats::default(), rounds: 0 })
    }

    #[inline]
    pub fn config(&self) -> &SearchConfig { &self.cfg }

    /// Compute the recommended move, or `None` when no repetition found one.
    ///
    /// This is a convenience wrapper around [`Self::evaluate`].
    #[inline]
    pub fn best_move(&mut self, board: Board) -> Option<Move> { self.evaluate(board).decision }

    /// Run one decision round and return the aggregated reports.
    pub fn evaluate(&mut self, board: Board) -> Evaluation {
        let start = Instant::now();
        let base_seed = self.round_seed();
        let SearchConfig { depth, reps, parallelism, concurrency_depth, aggregation, .. } = self.cfg;

        let counts: [AtomicU64; 4] = Default::default();
        let best: [AtomicU64; 4] = Default::default();
        let nodes = AtomicU64::new(0);
        let parts = partition(reps, parallelism);

        self.pool.install(|| {
            parts.into_par_iter().enumerate().for_each(|(worker, range)| {
                trace!(worker, reps = range.len(), "worker started");
                for rep in range {
                    let mut rng = StdRng::seed_from_u64(unit_seed(base_seed, rep));
                    let tree = SearchNode::build(board, depth, concurrency_depth, &mut rng);
                    nodes.fetch_add(tree.node_count(), Ordering::Relaxed);
                    if let Some(dir) = tree.best_move() {
                        counts[dir.index()].fetch_add(1, Ordering::Relaxed);
                        best[dir.index()].fetch_max(tree.best_score(), Ordering::Relaxed);
                    }
                }
            })
        });

        let tally = DirectionTally::from_counts(counts.map(AtomicU64::into_inner));
        let best = best.map(AtomicU64::into_inner);
        let best_scores: [Option<u64>; 4] = std::array::from_fn(|i| (tally.counts()[i] > 0).then_some(best[i]));
        let decision = aggregation.decide(&tally, &best_scores);

        let nodes = nodes.into_inner();
        self.stats.nodes = nodes;
        self.stats.peak_nodes = self.stats.peak_nodes.max(nodes);
        self.stats.reps = reps as u64;
        self.stats.no_move_reps = reps as u64 - tally.total();
        self.rounds += 1;

        debug!(
            counts = ?tally.counts(),
            ?decision,
            nodes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "decision complete"
        );
        Evaluation { tally, best_scores, decision }
    }

    /// Statistics collected from the last call to [`Self::best_move`] or
    /// [`Self::evaluate`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    fn round_seed(&self) -> u64 {
        let base = self.cfg.seed.unwrap_or_else(wall_clock_seed);
        base.wrapping_add(self.rounds.wrapping_mul(ROUND_STRIDE))
    }
}

/// Split `reps` into at most `workers` contiguous ranges whose sizes differ
/// by at most one, larger ranges first. Empty ranges are dropped.
fn partition(reps: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.min(reps);
    if workers == 0 {
        return Vec::new();
    }
    let (per, extra) = (reps / workers, reps % workers);
    let mut start = 0;
    (0..workers)
        .map(|w| {
            let len = per + usize::from(w < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Seed for repetition `rep` of a round. Depends only on the repetition
/// index, never on which worker runs it.
#[inline]
fn unit_seed(base: u64, rep: usize) -> u64 {
    base.wrapping_add((rep as u64).wrapping_add(1).wrapping_mul(REP_STRIDE))
}

fn wall_clock_seed() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::montecarlo::Aggregation;
    use rand::Rng;

    fn cfg(reps: usize, parallelism: usize, seed: u64) -> SearchConfig {
        SearchConfig { depth: 3, reps, parallelism, seed: Some(seed), ..Default::default() }
    }

    fn midgame_board(seed: u64) -> Board {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut b = Board::EMPTY.with_random_tile(&mut rng).unwrap();
        for _ in 0..20 {
            b = b.make_move(Move::ALL[rng.gen_range(0..4)], &mut rng);
        }
        b
    }

    #[test]
    fn partition_is_even_and_exact() {
        assert_eq!(partition(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(partition(8, 4), vec![0..2, 2..4, 4..6, 6..8]);
        assert_eq!(partition(2, 8), vec![0..1, 1..2]);
        assert!(partition(0, 4).is_empty());
        for reps in 0..40 {
            for workers in 1..10 {
                let parts = partition(reps, workers);
                assert_eq!(parts.iter().map(|r| r.len()).sum::<usize>(), reps);
                assert!(parts.len() <= workers);
                assert!(parts.iter().all(|r| !r.is_empty()));
            }
        }
    }

    #[test]
    fn unit_seeds_differ() {
        let seeds: std::collections::HashSet<u64> = (0..1000).map(|rep| unit_seed(42, rep)).collect();
        assert_eq!(seeds.len(), 1000);
    }

    #[test]
    fn zero_reps_has_no_move() {
        let mut mc = MonteCarlo::with_config(cfg(0, 4, 1)).unwrap();
        let eval = mc.evaluate(midgame_board(1));
        assert_eq!(eval.decision, None);
        assert_eq!(eval.tally.total(), 0);
        assert_eq!(mc.last_stats().reps, 0);
    }

    #[test]
    fn terminal_board_has_no_move() {
        let stuck = Board::from_tiles([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]], 0).unwrap();
        let mut mc = MonteCarlo::with_config(cfg(6, 3, 2)).unwrap();
        assert_eq!(mc.best_move(stuck), None);
        let stats = mc.last_stats();
        assert_eq!(stats.reps, 6);
        assert_eq!(stats.no_move_reps, 6);
        assert_eq!(stats.nodes, 6);
    }

    #[test]
    fn single_legal_move_wins_every_vote() {
        let b = Board::from_tiles([[0, 2, 4, 2], [0, 4, 2, 4], [0, 2, 4, 2], [0, 4, 2, 4]], 0).unwrap();
        for aggregation in [Aggregation::Vote, Aggregation::MaxScore] {
            let mut mc = MonteCarlo::with_config(SearchConfig { aggregation, ..cfg(9, 2, 3) }).unwrap();
            let eval = mc.evaluate(b);
            assert_eq!(eval.decision, Some(Move::Left));
            assert_eq!(eval.tally.count(Move::Left), 9);
            assert_eq!(eval.best_scores[Move::Right.index()], None);
        }
    }

    #[test]
    fn worker_count_does_not_change_result() {
        for seed in 0..4 {
            let board = midgame_board(seed);
            let one = MonteCarlo::with_config(cfg(24, 1, seed)).unwrap().evaluate(board);
            let eight = MonteCarlo::with_config(cfg(24, 8, seed)).unwrap().evaluate(board);
            assert_eq!(one, eight);
            assert_eq!(one.tally.total(), 24);
        }
    }

    #[test]
    fn fixed_seed_is_reproducible_across_rounds() {
        let board = midgame_board(5);
        let mut a = MonteCarlo::with_config(cfg(12, 3, 99)).unwrap();
        let mut b = MonteCarlo::with_config(cfg(12, 3, 99)).unwrap();
        for _ in 0..3 {
            assert_eq!(a.evaluate(board), b.evaluate(board));
        }
    }

    #[test]
    fn subtree_concurrency_keeps_reports_complete() {
        let board = midgame_board(6);
        let config = SearchConfig { concurrency_depth: 2, depth: 4, ..cfg(8, 2, 6) };
        let mut mc = MonteCarlo::with_config(config.clone()).unwrap();
        let first = mc.evaluate(board);
        assert_eq!(first.tally.total(), 8);
        assert!(first.decision.is_some());
        let again = MonteCarlo::with_config(config).unwrap().evaluate(board);
        assert_eq!(first, again);
    }

    #[test]
    fn stats_track_peak_and_reset() {
        let mut mc = MonteCarlo::with_config(cfg(4, 2, 7)).unwrap();
        mc.best_move(midgame_board(7));
        let stats = mc.last_stats();
        assert!(stats.nodes > 4);
        assert_eq!(stats.peak_nodes, stats.nodes);
        mc.reset_stats();
        assert_eq!(mc.last_stats(), SearchStats::default());
    }
}
