use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A direction to move/merge tiles.
///
/// The declaration order (`Left`, `Right`, `Up`, `Down`) is the canonical
/// enumeration order used for child slots and every tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Left,
    Right,
    Up,
    Down,
}

impl Move {
    /// All directions in canonical order.
    pub const ALL: [Move; 4] = [Move::Left, Move::Right, Move::Up, Move::Down];

    /// Slot index of this direction (0..4).
    #[inline]
    pub fn index(self) -> usize { self as usize }
}

impl TryFrom<usize> for Move {
    type Error = EngineError;

    fn try_from(idx: usize) -> Result<Self, Self::Error> {
        Move::ALL
            .get(idx)
            .copied()
            .ok_or_else(|| EngineError::InvalidDirection(idx.to_string()))
    }
}

impl FromStr for Move {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "left" => Ok(Move::Left),
            "r" | "right" => Ok(Move::Right),
            "u" | "up" => Ok(Move::Up),
            "d" | "down" => Ok(Move::Down),
            other => Err(EngineError::InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Left => "LEFT",
            Move::Right => "RIGHT",
            Move::Up => "UP",
            Move::Down => "DOWN",
        };
        f.write_str(name)
    }
}

/// Errors raised when external input crosses into the engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid direction: {0:?}")]
    InvalidDirection(String),
    #[error("invalid tile value {0} (expected a power of two between 2 and 32768)")]
    InvalidTile(u32),
    #[error("cell ({row}, {col}) is outside the 4x4 board")]
    OutOfBounds { row: usize, col: usize },
    #[error("cell ({row}, {col}) is already occupied")]
    Occupied { row: usize, col: usize },
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

/// Largest exponent a nibble can hold (2^15 = 32768). Such tiles never merge.
const MAX_EXPONENT: u8 = 0xf;

struct Stores {
    shift_left: Box<[u64]>,
    shift_right: Box<[u64]>,
    shift_up: Box<[u64]>,
    shift_down: Box<[u64]>,
    gain_left: Box<[Score]>,
    gain_right: Box<[Score]>,
}

type Cells = u64;
type Line = u64;
type Score = u64;

/// Packed 4x4 2048 board: 16 4-bit exponents in a `u64` plus the score
/// accumulated from merges.
///
/// Cell `(row, col)` lives in nibble `row * 4 + col`, counted from the most
/// significant end. The type is `Copy`, so every holder owns an independent
/// snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board {
    cells: Cells,
    score: Score,
}

impl Board {
    /// A constant empty board (all zeros, zero score).
    pub const EMPTY: Board = Board { cells: 0, score: 0 };

    /// Construct a `Board` from its raw packed cells with a zero score.
    #[inline]
    pub fn from_raw(cells: Cells) -> Self { Board { cells, score: 0 } }

    /// Borrow the raw packed cells for this `Board`.
    #[inline]
    pub fn raw(&self) -> Cells { self.cells }

    /// Same cells, different accumulated score.
    #[inline]
    pub fn with_score(self, score: Score) -> Self { Board { cells: self.cells, score } }

    /// Build a board from tile values laid out as `tiles[row][col]`.
    ///
    /// ```
    /// use mc_2048::engine::Board;
    /// let b = Board::from_tiles([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 0).unwrap();
    /// assert_eq!(b.tile(0, 1), 2);
    /// assert!(Board::from_tiles([[3, 0, 0, 0], [0; 4], [0; 4], [0; 4]], 0).is_err());
    /// ```
    pub fn from_tiles(tiles: [[u32; 4]; 4], score: Score) -> Result<Self, EngineError> {
        let mut cells = 0;
        for (row, line) in tiles.iter().enumerate() {
            for (col, &value) in line.iter().enumerate() {
                let exp = if value == 0 { 0 } else { exponent_of(value)? };
                cells |= (exp as Cells) << nibble_shift(row * 4 + col);
            }
        }
        Ok(Board { cells, score })
    }

    /// Place a tile of `value` into the empty cell at `(row, col)`.
    pub fn with_tile(self, row: usize, col: usize, value: u32) -> Result<Self, EngineError> {
        if row >= 4 || col >= 4 {
            return Err(EngineError::OutOfBounds { row, col });
        }
        let exp = exponent_of(value)?;
        let shift = nibble_shift(row * 4 + col);
        if (self.cells >> shift) & 0xf != 0 {
            return Err(EngineError::Occupied { row, col });
        }
        Ok(Board { cells: self.cells | ((exp as Cells) << shift), score: self.score })
    }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    ///
    /// Every merge adds the value of the merged tile to the score.
    ///
    /// ```
    /// use mc_2048::engine::{Board, Move};
    /// let b = Board::from_tiles([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 0).unwrap();
    /// let moved = b.shift(Move::Right);
    /// assert_eq!(moved.tiles()[0], [0, 0, 0, 4]);
    /// assert_eq!(moved.score(), 4);
    /// ```
    #[inline]
    pub fn shift(self, dir: Move) -> Self {
        let s = stores();
        match dir {
            Move::Left => shift_rows(self, &s.shift_left, &s.gain_left),
            Move::Right => shift_rows(self, &s.shift_right, &s.gain_right),
            Move::Up => shift_cols(self, &s.shift_up, &s.gain_left),
            Move::Down => shift_cols(self, &s.shift_down, &s.gain_right),
        }
    }

    /// Shift in `dir` and report whether any tile moved.
    ///
    /// When nothing moved the returned board is identical to `self`.
    #[inline]
    pub fn apply_move(self, dir: Move) -> (Self, bool) {
        let next = self.shift(dir);
        (next, next.cells != self.cells)
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a uniformly chosen empty
    /// slot, using the provided RNG. Returns `None` when the board is full.
    ///
    /// ```
    /// use mc_2048::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).unwrap();
    /// assert_eq!(b.count_empty(), 15);
    /// ```
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Option<Self> {
        let empty = self.count_empty();
        if empty == 0 {
            return None;
        }
        let mut index = rng.gen_range(0..empty);
        let mut tmp = self.cells;
        let mut tile = generate_random_tile(rng);
        loop {
            while (tmp & 0xf) != 0 {
                tmp >>= 4;
                tile <<= 4;
            }
            if index == 0 { break; }
            index -= 1;
            tmp >>= 4;
            tile <<= 4;
        }
        Some(Board { cells: self.cells | tile, score: self.score })
    }

    /// Perform a move then insert a random tile if the move changed the board.
    #[inline]
    pub fn make_move<R: Rng + ?Sized>(self, dir: Move, rng: &mut R) -> Self {
        match self.apply_move(dir) {
            (next, true) => next.with_random_tile(rng).unwrap_or(next),
            (_, false) => self,
        }
    }

    /// Score accumulated from merges along this board's lineage.
    #[inline]
    pub fn score(self) -> Score { self.score }

    /// Return true if no legal moves remain.
    ///
    /// ```
    /// use mc_2048::engine::Board;
    /// // Nothing can slide on an empty board.
    /// assert!(Board::EMPTY.is_game_over());
    /// ```
    #[inline]
    pub fn is_game_over(self) -> bool {
        Move::ALL.iter().all(|&dir| !self.apply_move(dir).1)
    }

    /// Return the highest tile value (e.g., 2048) present on the board, 0 if empty.
    pub fn highest_tile(self) -> u32 {
        (0..16).map(|idx| exponent_at(self.cells, idx)).max().map_or(0, value_of)
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u64 { 16 - count_non_empty(self.cells) }

    /// Tile value at `(row, col)`, 0 if empty.
    #[inline]
    pub fn tile(self, row: usize, col: usize) -> u32 {
        debug_assert!(row < 4 && col < 4);
        value_of(exponent_at(self.cells, row * 4 + col))
    }

    /// All tile values as `tiles[row][col]`.
    pub fn tiles(self) -> [[u32; 4]; 4] {
        let mut out = [[0; 4]; 4];
        for (row, line) in out.iter_mut().enumerate() {
            for (col, slot) in line.iter_mut().enumerate() {
                *slot = self.tile(row, col);
            }
        }
        out
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x}, score: {})", self.cells, self.score)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RULE: &str = "-------------------------------";
        for (row, line) in self.tiles().iter().enumerate() {
            if row > 0 {
                writeln!(f, "{RULE}")?;
            }
            let cells: Vec<String> = line.iter().map(|&v| format_val(v)).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        write!(f, "Score: {}", self.score)
    }
}

/// Initialize internal tables on first use. Safe to call multiple times.
pub fn new() {
    STORES.get_or_init(create_stores);
}

/// An all-empty board with zero score.
#[inline]
pub fn new_board() -> Board { Board::EMPTY }

// Credit to Nneonneo
pub(crate) fn transpose(x: Cells) -> Cells {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

pub(crate) fn extract_line(cells: Cells, line_idx: u64) -> Line {
    (cells >> ((3 - line_idx) * 16)) & 0xffff
}

static STORES: OnceLock<Stores> = OnceLock::new();

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut shift_left = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_right = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_up = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_down = vec![0u64; LINE_TABLE_SIZE];
    let mut gain_left = vec![0; LINE_TABLE_SIZE];
    let mut gain_right = vec![0; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let tiles = line_to_tiles(val as Line);
        let (left, left_gain) = slide_left(tiles);
        let (right, right_gain) = slide_right(tiles);
        shift_left[val] = tiles_to_row(left);
        shift_right[val] = tiles_to_row(right);
        shift_up[val] = tiles_to_col(left);
        shift_down[val] = tiles_to_col(right);
        gain_left[val] = left_gain;
        gain_right[val] = right_gain;
    }

    Stores {
        shift_left: shift_left.into_boxed_slice(),
        shift_right: shift_right.into_boxed_slice(),
        shift_up: shift_up.into_boxed_slice(),
        shift_down: shift_down.into_boxed_slice(),
        gain_left: gain_left.into_boxed_slice(),
        gain_right: gain_right.into_boxed_slice(),
    }
}

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

#[inline(always)]
fn get_line_entry<T: Copy>(table: &[T], idx: Line) -> T {
    debug_assert!((idx as usize) < LINE_TABLE_SIZE);
    table[idx as usize]
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> Cells { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

fn shift_rows(board: Board, table: &[u64], gains: &[Score]) -> Board {
    let (cells, gained) = (0..4).fold((0, 0), |(cells, gained), row_idx| {
        let row_val = extract_line(board.cells, row_idx);
        let new_row_val = get_line_entry(table, row_val);
        (cells | (new_row_val << (48 - (16 * row_idx))), gained + get_line_entry(gains, row_val))
    });
    Board { cells, score: board.score + gained }
}

fn shift_cols(board: Board, table: &[u64], gains: &[Score]) -> Board {
    let transpose_board = transpose(board.cells);
    let (cells, gained) = (0..4).fold((0, 0), |(cells, gained), col_idx| {
        let col_val = extract_line(transpose_board, col_idx);
        let new_col_val = get_line_entry(table, col_val);
        (cells | (new_col_val << (12 - (4 * col_idx))), gained + get_line_entry(gains, col_val))
    });
    Board { cells, score: board.score + gained }
}

fn line_to_tiles(line: Line) -> [u8; 4] {
    let mut tiles = [0u8; 4];
    for (idx, tile) in tiles.iter_mut().enumerate() {
        *tile = ((line >> ((3 - idx) * 4)) & 0xf) as u8;
    }
    tiles
}

fn tiles_to_row(tiles: [u8; 4]) -> Line {
    (tiles[0] as Line) << 12 | (tiles[1] as Line) << 8 | (tiles[2] as Line) << 4 | tiles[3] as Line
}

fn tiles_to_col(tiles: [u8; 4]) -> Line {
    (tiles[0] as Line) << 48 | (tiles[1] as Line) << 32 | (tiles[2] as Line) << 16 | tiles[3] as Line
}

/// Slide a line of exponents toward index 0, merging equal neighbours once.
/// Returns the new line and the total value of the tiles created by merges.
fn slide_left(tiles: [u8; 4]) -> ([u8; 4], Score) {
    let mut out = [0u8; 4];
    let mut len = 0;
    let mut gain = 0;
    let mut can_merge = false;
    for tile in tiles.into_iter().filter(|&t| t != 0) {
        if can_merge && out[len - 1] == tile && tile < MAX_EXPONENT {
            out[len - 1] += 1;
            gain += (1 as Score) << out[len - 1];
            can_merge = false;
        } else {
            out[len] = tile;
            len += 1;
            can_merge = true;
        }
    }
    (out, gain)
}

fn slide_right(mut tiles: [u8; 4]) -> ([u8; 4], Score) {
    tiles.reverse();
    let (mut out, gain) = slide_left(tiles);
    out.reverse();
    (out, gain)
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
fn count_non_empty(cells: Cells) -> u64 {
    let mut board_copy = cells;
    board_copy |= board_copy >> 1;
    board_copy |= board_copy >> 2;
    board_copy &= 0x1111111111111111;
    board_copy.count_ones() as u64
}

#[inline]
fn nibble_shift(idx: usize) -> u32 { 60 - 4 * idx as u32 }

#[inline]
fn exponent_at(cells: Cells, idx: usize) -> u8 { ((cells >> nibble_shift(idx)) & 0xf) as u8 }

#[inline]
fn value_of(exp: u8) -> u32 { if exp == 0 { 0 } else { 1 << exp } }

fn exponent_of(value: u32) -> Result<u8, EngineError> {
    if value.is_power_of_two() && (2..=1 << MAX_EXPONENT).contains(&value) {
        Ok(value.trailing_zeros() as u8)
    } else {
        Err(EngineError::InvalidTile(value))
    }
}

fn format_val(val: u32) -> String {
    match val {
        0 => " ".repeat(7),
        x => format!("{x:^7}"),
    }
}
