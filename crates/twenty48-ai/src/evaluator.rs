use twenty48_engine::{Board, SIZE};

// Term weights. These are a fixed contract of the evaluation function, not
// tunables; the search depends on their relative magnitudes.
const EMPTY_WEIGHT: f64 = 360.0;
const MERGE_WEIGHT: f64 = 140.0;
const SMOOTHNESS_WEIGHT: f64 = 14.0;
const MONOTONICITY_WEIGHT: f64 = 28.0;
const SNAKE_WEIGHT: f64 = 32.0;
const CORNER_WEIGHT: f64 = 220.0;
const MAX_TILE_WEIGHT: f64 = 24.0;

const CORNER_MISS_PENALTY: f64 = -8.0;

type WeightMatrix = [[f64; SIZE]; SIZE];

/// The four board corners, in the scan order used to break ties when the
/// maximum tile sits in more than one corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    const ALL: [Self; 4] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomRight,
        Self::BottomLeft,
    ];

    fn cell(self) -> (usize, usize) {
        match self {
            Self::TopLeft => (0, 0),
            Self::TopRight => (0, SIZE - 1),
            Self::BottomRight => (SIZE - 1, SIZE - 1),
            Self::BottomLeft => (SIZE - 1, 0),
        }
    }
}

fn rotate_half_turn(matrix: WeightMatrix) -> WeightMatrix {
    let mut rotated = [[0.0; SIZE]; SIZE];
    for row in 0..SIZE {
        for col in 0..SIZE {
            rotated[row][col] = matrix[SIZE - 1 - row][SIZE - 1 - col];
        }
    }
    rotated
}

fn flip_horizontal(matrix: WeightMatrix) -> WeightMatrix {
    let mut flipped = matrix;
    for row in &mut flipped {
        row.reverse();
    }
    flipped
}

/// Static board scorer.
///
/// Owns the four corner-oriented snake weight matrices, built once from a
/// canonical top-left matrix whose weights grow along a boustrophedon path
/// ending at that corner.
#[derive(Debug, Clone)]
pub struct Evaluator {
    snake: [WeightMatrix; 4],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Terms {
    empty: f64,
    merges: f64,
    smoothness: f64,
    monotonicity: f64,
    snake: f64,
    corner: f64,
    max_tile_log: f64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    #[must_use]
    pub fn new() -> Self {
        let top_left = [
            [15.0, 14.0, 13.0, 12.0],
            [8.0, 9.0, 10.0, 11.0],
            [7.0, 6.0, 5.0, 4.0],
            [0.0, 1.0, 2.0, 3.0],
        ];
        let top_right = flip_horizontal(top_left);
        let bottom_right = rotate_half_turn(top_left);
        let bottom_left = flip_horizontal(bottom_right);
        // Indexed by the `Corner::ALL` scan order.
        Self {
            snake: [top_left, top_right, bottom_right, bottom_left],
        }
    }

    /// Scores a board. Higher is better for the player to move.
    #[must_use]
    pub fn evaluate(&self, board: &Board) -> f64 {
        let terms = self.terms(board);
        terms.empty * EMPTY_WEIGHT
            + terms.merges * MERGE_WEIGHT
            + terms.smoothness * SMOOTHNESS_WEIGHT
            + terms.monotonicity * MONOTONICITY_WEIGHT
            + terms.snake * SNAKE_WEIGHT
            + terms.corner * CORNER_WEIGHT
            + terms.max_tile_log * MAX_TILE_WEIGHT
    }

    fn terms(&self, board: &Board) -> Terms {
        let mut log_values = [[0.0_f64; SIZE]; SIZE];
        let mut empty = 0.0;
        let mut max_tile = 0;
        for row in 0..SIZE {
            for col in 0..SIZE {
                let value = board.get(row, col);
                if value == 0 {
                    empty += 1.0;
                } else {
                    log_values[row][col] = f64::from(value).log2();
                    max_tile = max_tile.max(value);
                }
            }
        }

        let mut merges = 0.0;
        let mut smoothness = 0.0;
        for row in 0..SIZE {
            for col in 0..SIZE {
                let value = board.get(row, col);
                if value == 0 {
                    continue;
                }
                // Right and down neighbors only, so each pair counts once.
                if col + 1 < SIZE && board.get(row, col + 1) != 0 {
                    smoothness -= (log_values[row][col] - log_values[row][col + 1]).abs();
                    if value == board.get(row, col + 1) {
                        merges += 1.0;
                    }
                }
                if row + 1 < SIZE && board.get(row + 1, col) != 0 {
                    smoothness -= (log_values[row][col] - log_values[row + 1][col]).abs();
                    if value == board.get(row + 1, col) {
                        merges += 1.0;
                    }
                }
            }
        }

        let monotonicity = monotonicity(&log_values);

        // First corner holding the maximum corner value wins ties.
        let mut target_corner = 0;
        let mut corner_value = {
            let (row, col) = Corner::TopLeft.cell();
            board.get(row, col)
        };
        for (index, corner) in Corner::ALL.into_iter().enumerate().skip(1) {
            let (row, col) = corner.cell();
            if board.get(row, col) > corner_value {
                corner_value = board.get(row, col);
                target_corner = index;
            }
        }
        let matrix = &self.snake[target_corner];
        let mut snake = 0.0;
        for row in 0..SIZE {
            for col in 0..SIZE {
                snake += log_values[row][col] * matrix[row][col];
            }
        }

        let max_tile_log = if max_tile > 0 {
            f64::from(max_tile).log2()
        } else {
            0.0
        };
        let max_in_corner = max_tile > 0
            && Corner::ALL.into_iter().any(|corner| {
                let (row, col) = corner.cell();
                board.get(row, col) == max_tile
            });
        let corner = if max_in_corner {
            max_tile_log * 4.0
        } else {
            CORNER_MISS_PENALTY
        };

        Terms {
            empty,
            merges,
            smoothness,
            monotonicity,
            snake,
            corner,
            max_tile_log,
        }
    }
}

/// Sum, per axis, of the larger of the two one-directional decrease totals.
/// Rewards rows/columns sorted along a consistent direction.
fn monotonicity(log_values: &[[f64; SIZE]; SIZE]) -> f64 {
    let mut left_right = 0.0;
    let mut right_left = 0.0;
    for row in log_values {
        for col in 0..SIZE - 1 {
            let delta = row[col] - row[col + 1];
            if delta > 0.0 {
                left_right += delta;
            } else {
                right_left -= delta;
            }
        }
    }

    let mut top_down = 0.0;
    let mut bottom_up = 0.0;
    for col in 0..SIZE {
        for row in 0..SIZE - 1 {
            let delta = log_values[row][col] - log_values[row + 1][col];
            if delta > 0.0 {
                top_down += delta;
            } else {
                bottom_up -= delta;
            }
        }
    }

    left_right.max(right_left) + top_down.max(bottom_up)
}
