use mc_2048::engine::{self as GameEngine, Board, Move};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn warm() { GameEngine::new(); }

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut boards = vec![Board::EMPTY];
    let mut b = Board::EMPTY;
    for _ in 0..2 {
        b = b.with_random_tile(&mut rng).unwrap();
    }
    boards.push(b);
    // Derive a variety of densities deterministically
    for i in 0..20 {
        b = b.make_move(Move::ALL[i % 4], &mut rng);
        boards.push(b);
    }
    boards
}

fn bench_shift(c: &mut Criterion) {
    warm();
    let boards = corpus();
    for dir in Move::ALL {
        c.bench_function(&format!("shift/{}", dir.to_string().to_lowercase()), |bch| {
            bch.iter(|| {
                let mut acc = 0u64;
                for &bd in &boards {
                    let (next, moved) = bd.apply_move(dir);
                    acc ^= next.raw() ^ next.score() ^ moved as u64;
                }
                black_box(acc)
            })
        });
    }
}

fn bench_random_tiles(c: &mut Criterion) {
    warm();
    c.bench_function("board/with_random_tile", |bch| {
        bch.iter_batched(
            || (Board::EMPTY, StdRng::seed_from_u64(7)),
            |(mut bd, mut rng)| {
                while let Some(next) = bd.with_random_tile(&mut rng) { bd = next; }
                black_box(bd)
            },
            BatchSize::SmallInput,
        )
    });
    c.bench_function("board/make_move_cycle", |bch| {
        bch.iter_batched(
            || (corpus()[2], StdRng::seed_from_u64(9)),
            |(mut bd, mut rng)| {
                for i in 0..64 { bd = bd.make_move(Move::ALL[i % 4], &mut rng); }
                black_box(bd)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_queries(c: &mut Criterion) {
    warm();
    let boards = corpus();
    c.bench_function("query/count_empty", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for &bd in &boards { acc ^= bd.count_empty(); }
            black_box(acc)
        })
    });
    c.bench_function("query/is_game_over", |bch| {
        bch.iter(|| {
            let mut acc = 0u32;
            for &bd in &boards { acc += bd.is_game_over() as u32; }
            black_box(acc)
        })
    });
}

criterion_group!(engine_ops, bench_shift, bench_random_tiles, bench_queries);
criterion_main!(engine_ops);
