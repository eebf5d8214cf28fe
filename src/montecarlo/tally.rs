use crate::engine::Move;

/// Occurrence count per direction, indexed by [`Move::index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionTally {
    counts: [u64; 4],
}

impl DirectionTally {
    pub fn new() -> Self { Self::default() }

    #[inline]
    pub fn from_counts(counts: [u64; 4]) -> Self { Self { counts } }

    #[inline]
    pub fn record(&mut self, dir: Move) { self.counts[dir.index()] += 1; }

    #[inline]
    pub fn count(&self, dir: Move) -> u64 { self.counts[dir.index()] }

    #[inline]
    pub fn counts(&self) -> [u64; 4] { self.counts }

    /// Number of recorded reports.
    pub fn total(&self) -> u64 { self.counts.iter().sum() }

    /// The most frequent direction. Ties go to the earliest direction in
    /// [`Move::ALL`]; an empty tally has no winner.
    ///
    /// ```
    /// use mc_2048::engine::Move;
    /// use mc_2048::montecarlo::DirectionTally;
    /// let tally: DirectionTally = [Move::Down, Move::Up, Move::Up, Move::Down].into_iter().collect();
    /// assert_eq!(tally.winner(), Some(Move::Up));
    /// ```
    pub fn winner(&self) -> Option<Move> {
        let mut best: Option<(u64, Move)> = None;
        for dir in Move::ALL {
            let count = self.count(dir);
            if count > best.map_or(0, |(top, _)| top) {
                best = Some((count, dir));
            }
        }
        best.map(|(_, dir)| dir)
    }
}

impl Extend<Move> for DirectionTally {
    fn extend<I: IntoIterator<Item = Move>>(&mut self, iter: I) {
        for dir in iter {
            self.record(dir);
        }
    }
}

impl FromIterator<Move> for DirectionTally {
    fn from_iter<I: IntoIterator<Item = Move>>(iter: I) -> Self {
        let mut tally = Self::new();
        tally.extend(iter);
        tally
    }
}
