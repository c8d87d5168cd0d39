use arrayvec::ArrayVec;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

/// Board edge length. The merge rules below assume 4x4.
pub const SIZE: usize = 4;

/// Tile value that counts as a win.
pub const TARGET: u32 = 2048;

/// Probability that a spawned tile is a 4 instead of a 2.
pub const SPAWN_FOUR_CHANCE: f64 = 0.1;

/// Maximum number of cells on the board, for bounded scratch vectors.
pub const CELL_COUNT: usize = SIZE * SIZE;

/// A shift direction.
///
/// [`Direction::ALL`] fixes the enumeration order used everywhere a
/// tie-break depends on it (move generation, search, quick heuristics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[display("up")]
    Up,
    #[display("down")]
    Down,
    #[display("left")]
    Left,
    #[display("right")]
    Right,
}

impl Direction {
    pub const ALL: [Self; 4] = [Self::Up, Self::Left, Self::Right, Self::Down];
}

/// Result of applying one shift to a board.
///
/// `moved == false` means the shift changed nothing; callers must not add
/// `gain` to the score or spawn a tile in that case (`gain` is 0 then).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub board: Board,
    pub gain: u32,
    pub moved: bool,
}

/// 4x4 grid of tile values.
///
/// Cells hold 0 (empty) or a power of two. The board is a plain value:
/// `Copy`, compared and hashed by cell contents, which makes it directly
/// usable as a cache key (distinct grids never collide).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Board([[u32; SIZE]; SIZE]);

/// Slides one line toward index 0 and merges equal adjacent pairs.
///
/// Each pair merges at most once per slide; `[2, 2, 4]` becomes `[4, 4, 0]`,
/// not `[8, 0, 0]`. Returns the new line and the sum of merged values.
pub fn slide_and_merge(line: [u32; SIZE]) -> ([u32; SIZE], u32) {
    let mut packed = [0; SIZE];
    let mut len = 0;
    for value in line {
        if value != 0 {
            packed[len] = value;
            len += 1;
        }
    }

    let mut merged = [0; SIZE];
    let mut gain = 0;
    let mut read = 0;
    let mut write = 0;
    while read < len {
        if read + 1 < len && packed[read] == packed[read + 1] {
            let value = packed[read] * 2;
            merged[write] = value;
            gain += value;
            read += 2;
        } else {
            merged[write] = packed[read];
            read += 1;
        }
        write += 1;
    }

    (merged, gain)
}

impl Board {
    pub const EMPTY: Self = Self([[0; SIZE]; SIZE]);

    #[must_use]
    pub fn from_rows(rows: [[u32; SIZE]; SIZE]) -> Self {
        Self(rows)
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.0[row][col]
    }

    /// Creates a board with the two initial random spawns of a fresh game.
    #[must_use]
    pub fn new_game<R>(rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut board = Self::EMPTY;
        board.add_random_tile(rng);
        board.add_random_tile(rng);
        board
    }

    /// Applies one shift and reports the outcome.
    ///
    /// Every row (or column) is compressed toward the move direction and
    /// merged independently; right/down reuse the left-slide routine by
    /// reversing the line before and after.
    #[must_use]
    pub fn apply_move(&self, direction: Direction) -> MoveOutcome {
        let mut updated = Self::EMPTY;
        let mut gain = 0;
        let horizontal = matches!(direction, Direction::Left | Direction::Right);
        let reversed = matches!(direction, Direction::Right | Direction::Down);

        for index in 0..SIZE {
            let mut line = [0; SIZE];
            for (slot, cell) in line.iter_mut().enumerate() {
                *cell = if horizontal {
                    self.0[index][slot]
                } else {
                    self.0[slot][index]
                };
            }
            if reversed {
                line.reverse();
            }

            let (mut merged, line_gain) = slide_and_merge(line);
            gain += line_gain;
            if reversed {
                merged.reverse();
            }

            for (slot, value) in merged.into_iter().enumerate() {
                if horizontal {
                    updated.0[index][slot] = value;
                } else {
                    updated.0[slot][index] = value;
                }
            }
        }

        let moved = updated != *self;
        MoveOutcome {
            board: updated,
            gain: if moved { gain } else { 0 },
            moved,
        }
    }

    /// True iff any cell is empty or two orthogonal neighbors are equal.
    #[must_use]
    pub fn can_move(&self) -> bool {
        for row in 0..SIZE {
            for col in 0..SIZE {
                let value = self.0[row][col];
                if value == 0 {
                    return true;
                }
                if col + 1 < SIZE && value == self.0[row][col + 1] {
                    return true;
                }
                if row + 1 < SIZE && value == self.0[row + 1][col] {
                    return true;
                }
            }
        }
        false
    }

    /// True iff any tile reached [`TARGET`].
    #[must_use]
    pub fn reached_target(&self) -> bool {
        self.0.iter().flatten().any(|&value| value >= TARGET)
    }

    /// Coordinates of all empty cells in row-major order.
    #[must_use]
    pub fn empty_cells(&self) -> ArrayVec<(usize, usize), CELL_COUNT> {
        let mut cells = ArrayVec::new();
        for row in 0..SIZE {
            for col in 0..SIZE {
                if self.0[row][col] == 0 {
                    cells.push((row, col));
                }
            }
        }
        cells
    }

    #[must_use]
    pub fn count_empty(&self) -> usize {
        self.0.iter().flatten().filter(|&&value| value == 0).count()
    }

    #[must_use]
    pub fn max_tile(&self) -> u32 {
        self.0.iter().flatten().copied().max().unwrap_or(0)
    }

    /// Sum of all tile values.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.iter().flatten().sum()
    }

    /// Places `value` at an explicit cell. Used by the search to expand
    /// spawn outcomes without touching the RNG.
    #[must_use]
    pub fn with_tile(&self, row: usize, col: usize, value: u32) -> Self {
        let mut board = *self;
        board.0[row][col] = value;
        board
    }

    /// Spawns a tile on a uniformly chosen empty cell: 4 with probability
    /// [`SPAWN_FOUR_CHANCE`], otherwise 2. Returns false on a full board.
    pub fn add_random_tile<R>(&mut self, rng: &mut R) -> bool
    where
        R: Rng + ?Sized,
    {
        let cells = self.empty_cells();
        let Some(&(row, col)) = cells.choose(rng) else {
            return false;
        };
        let value = if rng.random_bool(SPAWN_FOUR_CHANCE) {
            4
        } else {
            2
        };
        self.0[row][col] = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    fn board(rows: [[u32; SIZE]; SIZE]) -> Board {
        Board::from_rows(rows)
    }

    #[test]
    fn slide_merges_leading_pair_once() {
        let (line, gain) = slide_and_merge([2, 2, 0, 0]);
        assert_eq!(line, [4, 0, 0, 0]);
        assert_eq!(gain, 4);
    }

    #[test]
    fn slide_does_not_chain_merges() {
        let (line, gain) = slide_and_merge([2, 2, 4, 0]);
        assert_eq!(line, [4, 4, 0, 0]);
        assert_eq!(gain, 4);

        let (line, gain) = slide_and_merge([4, 4, 4, 4]);
        assert_eq!(line, [8, 8, 0, 0]);
        assert_eq!(gain, 16);
    }

    #[test]
    fn slide_compresses_gaps() {
        let (line, gain) = slide_and_merge([0, 2, 0, 2]);
        assert_eq!(line, [4, 0, 0, 0]);
        assert_eq!(gain, 4);
    }

    #[test]
    fn move_left_merges_top_row() {
        let start = board([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let outcome = start.apply_move(Direction::Left);
        assert_eq!(
            outcome.board,
            board([[4, 0, 0, 0], [0; 4], [0; 4], [0; 4]])
        );
        assert_eq!(outcome.gain, 4);
        assert!(outcome.moved);
    }

    #[test]
    fn move_conserves_tile_sum_plus_gain() {
        let start = board([
            [2, 2, 4, 4],
            [0, 2, 2, 8],
            [16, 0, 16, 2],
            [4, 4, 4, 4],
        ]);
        for direction in Direction::ALL {
            let outcome = start.apply_move(direction);
            assert_eq!(
                outcome.board.total(),
                start.total(),
                "tile sum changed moving {direction}"
            );
            let merged: u32 = outcome.gain;
            // gain is exactly the sum of values produced by merges, which the
            // sum conservation above already pins down; check it is sane too
            assert_eq!(merged % 4, 0);
        }
    }

    #[test]
    fn repeated_direction_is_idempotent() {
        let start = board([
            [2, 2, 4, 8],
            [0, 0, 2, 2],
            [4, 0, 4, 0],
            [2, 4, 8, 16],
        ]);
        for direction in Direction::ALL {
            let first = start.apply_move(direction);
            let second = first.board.apply_move(direction);
            assert!(!second.moved, "second {direction} should be a no-op");
            assert_eq!(second.gain, 0);
            assert_eq!(second.board, first.board);
        }
    }

    #[test]
    fn unchanged_board_reports_not_moved() {
        let start = board([[2, 4, 8, 16], [0; 4], [0; 4], [0; 4]]);
        let outcome = start.apply_move(Direction::Up);
        assert!(!outcome.moved);
        assert_eq!(outcome.gain, 0);
        assert_eq!(outcome.board, start);
    }

    #[test]
    fn right_and_down_reverse_correctly() {
        let start = board([[2, 0, 0, 2], [0; 4], [0; 4], [0; 4]]);
        let outcome = start.apply_move(Direction::Right);
        assert_eq!(
            outcome.board,
            board([[0, 0, 0, 4], [0; 4], [0; 4], [0; 4]])
        );

        let start = board([[2, 0, 0, 0], [0; 4], [0; 4], [2, 0, 0, 0]]);
        let outcome = start.apply_move(Direction::Down);
        assert_eq!(
            outcome.board,
            board([[0; 4], [0; 4], [0; 4], [4, 0, 0, 0]])
        );
        assert_eq!(outcome.gain, 4);
    }

    #[test]
    fn can_move_detects_merges_on_full_board() {
        let stuck = board([
            [2, 4, 2, 4],
            [4, 2, 4, 2],
            [2, 4, 2, 4],
            [4, 2, 4, 2],
        ]);
        assert!(!stuck.can_move());

        let mergeable = board([
            [2, 4, 2, 4],
            [4, 2, 4, 2],
            [2, 4, 2, 4],
            [4, 2, 4, 4],
        ]);
        assert!(mergeable.can_move());
        assert!(Board::EMPTY.can_move());
    }

    #[test]
    fn reached_target_checks_threshold() {
        assert!(!Board::EMPTY.reached_target());
        assert!(board([[TARGET, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).reached_target());
        assert!(board([[TARGET * 2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).reached_target());
    }

    #[test]
    fn random_tile_fills_an_empty_cell() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut board = Board::EMPTY;
        assert!(board.add_random_tile(&mut rng));
        assert_eq!(board.count_empty(), CELL_COUNT - 1);
        let spawned = board.max_tile();
        assert!(spawned == 2 || spawned == 4);
    }

    #[test]
    fn random_tile_fails_on_full_board() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut full = board([[2; 4]; 4]);
        assert!(!full.add_random_tile(&mut rng));
        assert_eq!(full, board([[2; 4]; 4]));
    }

    #[test]
    fn new_game_has_two_tiles() {
        let mut rng = Pcg32::seed_from_u64(42);
        let board = Board::new_game(&mut rng);
        assert_eq!(board.count_empty(), CELL_COUNT - 2);
    }

    #[test]
    fn boards_hash_by_value() {
        use std::collections::HashSet;

        let a = board([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let b = board([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let c = board([[0, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(!set.contains(&c));
    }

    #[test]
    fn board_serializes_as_rows() {
        let start = board([[2, 4, 0, 0], [0; 4], [0; 4], [0, 0, 0, 8]]);
        let json = serde_json::to_string(&start).unwrap();
        let parsed: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, start);
    }
}
