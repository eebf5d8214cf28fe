use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

use crate::engine::{Board, Move};

/// One node of a sampled game tree.
///
/// A node owns its board snapshot and up to four children, one slot per
/// [`Move`] in [`Move::ALL`] order. A slot stays empty when that move does not
/// change the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchNode {
    board: Board,
    children: [Option<Box<SearchNode>>; 4],
    expanded: bool,
    terminal: bool,
    best_score: u64,
    best_move: Option<Move>,
}

impl SearchNode {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            children: Default::default(),
            expanded: false,
            terminal: false,
            best_score: board.score(),
            best_move: None,
        }
    }

    /// A node whose random tile could not be placed. It never expands.
    fn terminal(board: Board) -> Self {
        Self { expanded: true, terminal: true, ..Self::new(board) }
    }

    /// Build, fill and score one tree rooted at `board`.
    ///
    /// ```
    /// use mc_2048::engine::{Board, Move};
    /// use mc_2048::montecarlo::SearchNode;
    /// use rand::{rngs::StdRng, SeedableRng};
    ///
    /// let b = Board::from_tiles([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 0).unwrap();
    /// let tree = SearchNode::build(b, 1, 0, &mut StdRng::seed_from_u64(1));
    /// assert_eq!(tree.best_move(), Some(Move::Left));
    /// assert_eq!(tree.best_score(), 4);
    /// ```
    pub fn build<R: Rng + ?Sized>(board: Board, height: u32, concurrency_depth: u32, rng: &mut R) -> Self {
        let mut root = Self::new(board);
        root.fill(height, concurrency_depth, rng);
        root.score();
        root
    }

    /// Expand this node to `height` more levels.
    ///
    /// Already expanded nodes keep their children and only the levels below
    /// them grow, so calling `fill` again with a larger height deepens the
    /// tree. While `concurrency_depth > 0` the four subtrees of a node are
    /// filled in parallel, each with a generator seeded from `rng`; the budget
    /// drops by one per level and the rest of the tree is filled sequentially.
    pub fn fill<R: Rng + ?Sized>(&mut self, height: u32, concurrency_depth: u32, rng: &mut R) {
        if height == 0 || self.terminal {
            return;
        }
        if !self.expanded {
            self.expand(rng);
        }
        if concurrency_depth > 0 {
            // Seeds are drawn before the fan-out so the tree depends on the
            // seed alone, not on scheduling.
            let seeds: [u64; 4] = std::array::from_fn(|_| rng.gen());
            self.children.par_iter_mut().zip(seeds).for_each(|(slot, seed)| {
                if let Some(child) = slot {
                    let mut child_rng = StdRng::seed_from_u64(seed);
                    child.fill(height - 1, concurrency_depth - 1, &mut child_rng);
                }
            });
        } else {
            for child in self.children.iter_mut().flatten() {
                child.fill(height - 1, 0, rng);
            }
        }
    }

    fn expand<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for dir in Move::ALL {
            let (moved, changed) = self.board.apply_move(dir);
            if !changed {
                continue;
            }
            let child = match moved.with_random_tile(rng) {
                Some(placed) => SearchNode::new(placed),
                None => SearchNode::terminal(moved),
            };
            self.children[dir.index()] = Some(Box::new(child));
        }
        self.expanded = true;
    }

    /// Propagate scores from the leaves up.
    ///
    /// A leaf takes its board's score and has no best move. An inner node
    /// takes the highest child score and the direction of that child; ties go
    /// to the earliest direction in [`Move::ALL`].
    pub fn score(&mut self) {
        let mut best: Option<(u64, Move)> = None;
        for dir in Move::ALL {
            if let Some(child) = self.children[dir.index()].as_deref_mut() {
                child.score();
                if best.map_or(true, |(top, _)| child.best_score > top) {
                    best = Some((child.best_score, dir));
                }
            }
        }
        match best {
            Some((score, dir)) => {
                self.best_score = score;
                self.best_move = Some(dir);
            }
            None => {
                self.best_score = self.board.score();
                self.best_move = None;
            }
        }
    }

    #[inline]
    pub fn board(&self) -> Board { self.board }

    #[inline]
    pub fn best_score(&self) -> u64 { self.best_score }

    #[inline]
    pub fn best_move(&self) -> Option<Move> { self.best_move }

    /// True when the random tile for this node could not be placed.
    #[inline]
    pub fn is_terminal(&self) -> bool { self.terminal }

    pub fn is_leaf(&self) -> bool { self.children.iter().all(Option::is_none) }

    pub fn child(&self, dir: Move) -> Option<&SearchNode> { self.children[dir.index()].as_deref() }

    /// Non-empty children in [`Move::ALL`] order.
    pub fn children(&self) -> impl Iterator<Item = (Move, &SearchNode)> + '_ {
        Move::ALL.into_iter().filter_map(move |dir| self.child(dir).map(|c| (dir, c)))
    }

    /// Nodes in this subtree, including `self`.
    pub fn node_count(&self) -> u64 {
        1 + self.children().map(|(_, c)| c.node_count()).sum::<u64>()
    }

    /// Length of the longest path to a leaf.
    pub fn height(&self) -> u32 {
        self.children().map(|(_, c)| c.height() + 1).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_board(seed: u64, tiles: usize) -> Board {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut b = Board::EMPTY;
        for _ in 0..tiles {
            b = b.with_random_tile(&mut rng).unwrap();
        }
        b
    }

    fn stuck_board() -> Board {
        Board::from_tiles([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]], 88).unwrap()
    }

    fn check_monotone(node: &SearchNode) {
        match node.best_move() {
            None => {
                assert!(node.is_leaf());
                assert_eq!(node.best_score(), node.board().score());
            }
            Some(dir) => {
                let chosen = node.child(dir).expect("best move points at a child");
                assert_eq!(node.best_score(), chosen.best_score());
                for (_, other) in node.children() {
                    assert!(node.best_score() >= other.best_score());
                }
            }
        }
        for (_, child) in node.children() {
            check_monotone(child);
        }
    }

    fn collect_scores(node: &SearchNode, out: &mut Vec<(u64, Option<Move>)>) {
        out.push((node.best_score(), node.best_move()));
        for (_, child) in node.children() {
            collect_scores(child, out);
        }
    }

    #[test]
    fn depth_zero_is_a_leaf() {
        let b = seeded_board(1, 5).with_score(120);
        let tree = SearchNode::build(b, 0, 0, &mut StdRng::seed_from_u64(2));
        assert!(tree.is_leaf());
        assert_eq!(tree.best_move(), None);
        assert_eq!(tree.best_score(), 120);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn no_op_moves_leave_empty_slots() {
        let b = Board::from_tiles([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 0).unwrap();
        let tree = SearchNode::build(b, 1, 0, &mut StdRng::seed_from_u64(3));
        assert!(tree.child(Move::Up).is_none());
        for dir in [Move::Left, Move::Right, Move::Down] {
            let child = tree.child(dir).unwrap();
            assert!(child.is_leaf());
            assert_eq!(child.board().count_empty(), b.shift(dir).count_empty() - 1);
        }
        // Left and Right both merge for 4; Left comes first.
        assert_eq!(tree.best_move(), Some(Move::Left));
        assert_eq!(tree.best_score(), 4);
    }

    #[test]
    fn game_over_root_has_no_children() {
        let tree = SearchNode::build(stuck_board(), 5, 0, &mut StdRng::seed_from_u64(4));
        assert!(tree.is_leaf());
        assert_eq!(tree.best_move(), None);
        assert_eq!(tree.best_score(), 88);
    }

    #[test]
    fn terminal_nodes_never_expand() {
        let mut node = SearchNode::terminal(seeded_board(9, 4));
        node.fill(4, 0, &mut StdRng::seed_from_u64(9));
        assert!(node.is_leaf());
        assert!(node.is_terminal());
    }

    #[test]
    fn zero_score_child_can_win() {
        // Only Left moves and it merges nothing.
        let b = Board::from_tiles([[0, 2, 4, 2], [0, 4, 2, 4], [0, 2, 4, 2], [0, 4, 2, 4]], 0).unwrap();
        let tree = SearchNode::build(b, 1, 0, &mut StdRng::seed_from_u64(5));
        assert_eq!(tree.children().count(), 1);
        assert_eq!(tree.best_move(), Some(Move::Left));
        assert_eq!(tree.best_score(), 0);
    }

    #[test]
    fn scores_are_monotone() {
        for seed in 0..8 {
            let tree = SearchNode::build(seeded_board(seed, 6), 4, 0, &mut StdRng::seed_from_u64(seed + 100));
            assert!(tree.height() <= 4);
            check_monotone(&tree);
        }
    }

    #[test]
    fn scoring_is_idempotent() {
        let mut tree = SearchNode::build(seeded_board(12, 6), 4, 0, &mut StdRng::seed_from_u64(12));
        let mut first = Vec::new();
        collect_scores(&tree, &mut first);
        tree.score();
        let mut second = Vec::new();
        collect_scores(&tree, &mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn refill_deepens_without_regenerating() {
        let b = seeded_board(13, 3);
        let mut tree = SearchNode::new(b);
        tree.fill(1, 0, &mut StdRng::seed_from_u64(1));
        let first_level: Vec<(Move, Board)> = tree.children().map(|(d, c)| (d, c.board())).collect();
        assert_eq!(tree.height(), 1);

        tree.fill(2, 0, &mut StdRng::seed_from_u64(2));
        let after: Vec<(Move, Board)> = tree.children().map(|(d, c)| (d, c.board())).collect();
        assert_eq!(first_level, after);
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn concurrent_fill_is_reproducible() {
        let b = seeded_board(14, 4);
        let a = SearchNode::build(b, 5, 2, &mut StdRng::seed_from_u64(77));
        let c = SearchNode::build(b, 5, 2, &mut StdRng::seed_from_u64(77));
        assert_eq!(a, c);
        assert!(a.height() <= 5);
        check_monotone(&a);
    }

    #[test]
    fn same_seed_same_tree() {
        let b = seeded_board(15, 5);
        let a = SearchNode::build(b, 4, 0, &mut StdRng::seed_from_u64(8));
        let c = SearchNode::build(b, 4, 0, &mut StdRng::seed_from_u64(8));
        assert_eq!(a, c);
    }
}
