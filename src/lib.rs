//! mc-2048: a 2048 game engine + Monte-Carlo tree sampling move advisor
//!
//! This crate provides:
//! - A compact `Board` type with ergonomic methods (`shift`, `apply_move`, `with_random_tile`, ...)
//!   that carries the score accumulated from merges
//! - A Monte-Carlo policy (`montecarlo` module) that builds many random game trees on a
//!   worker pool and votes on the next move
//! - Shared command-line options and log setup for the binaries (`cli` module)
//!
//! Quick start:
//! ```
//! use mc_2048::engine::{Board, Move};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::EMPTY.with_random_tile(&mut rng).unwrap();
//! let (b1, moved) = b0.apply_move(Move::Left);
//! assert!(b1.score() >= b0.score());
//! assert_eq!(moved, b1 != b0);
//! ```
//!
//! Full loop (simplest possible)
//! ```
//! use mc_2048::engine::Board;
//! use mc_2048::montecarlo::{MonteCarlo, SearchConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // 1) Configure the policy (small and seeded to keep doctests fast)
//! let cfg = SearchConfig { depth: 3, reps: 4, parallelism: 2, seed: Some(1), ..Default::default() };
//! let mut policy = MonteCarlo::with_config(cfg).unwrap();
//! let mut rng = StdRng::seed_from_u64(123);
//!
//! // 2) Start board with two random tiles
//! let mut b = Board::EMPTY;
//! for _ in 0..2 {
//!     b = b.with_random_tile(&mut rng).unwrap();
//! }
//!
//! // 3) Loop a couple of moves
//! let mut moves = 0u32;
//! while moves < 4 {
//!     match policy.best_move(b) {
//!         Some(dir) => b = b.make_move(dir, &mut rng),
//!         None => break,
//!     }
//!     moves += 1;
//! }
//! assert!(moves > 0);
//! ```
//!
pub mod cli;
pub mod engine;
pub mod montecarlo;
