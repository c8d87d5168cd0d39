use std::collections::HashMap;
use std::time::{Duration, Instant};

use arrayvec::ArrayVec;
use twenty48_engine::{Board, CELL_COUNT, Direction, SIZE};

use crate::Evaluator;

/// Floor applied to the per-decision budget so a degenerate budget still
/// lets the quick fallback run.
pub const MIN_SEARCH_BUDGET: Duration = Duration::from_millis(5);

/// Root values mix in a small fraction of the immediate merge gain.
const ROOT_GAIN_WEIGHT: f64 = 0.1;

/// Signals that the deadline passed mid-recursion. The whole in-flight
/// depth is discarded; this never reaches a caller of [`Searcher`].
#[derive(Debug, Clone, Copy, derive_more::Display, derive_more::Error)]
#[display("search deadline exceeded")]
pub struct SearchTimeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NodeKind {
    Player,
    Chance,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    direction: Direction,
    board: Board,
    gain: u32,
}

fn legal_moves(board: &Board) -> ArrayVec<Candidate, 4> {
    let mut moves = ArrayVec::new();
    for direction in Direction::ALL {
        let outcome = board.apply_move(direction);
        if outcome.moved {
            moves.push(Candidate {
                direction,
                board: outcome.board,
                gain: outcome.gain,
            });
        }
    }
    moves
}

/// How many spawn cells a chance node may expand, by remaining depth.
/// Deep layers get fewer branches to keep turn time stable.
fn chance_branch_cap(depth: u8, strong: bool) -> usize {
    if strong {
        match depth {
            4.. => 4,
            3 => 6,
            _ => 8,
        }
    } else {
        match depth {
            4.. => 3,
            3 => 4,
            _ => 6,
        }
    }
}

/// Iterative-deepening ceiling, keyed on the number of empty cells:
/// fewer empties means a narrower tree, so deeper search stays affordable.
fn depth_cap(empty_count: usize, strong: bool) -> u8 {
    if strong {
        match empty_count {
            8.. => 3,
            5.. => 4,
            _ => 5,
        }
    } else {
        match empty_count {
            8.. => 2,
            5.. => 3,
            _ => 4,
        }
    }
}

/// Empty cells to expand at a chance node, at most `cap` of them. When the
/// board has more, keeps those nearest to a corner (ties by row, then
/// column): spawns near corners are the ones that disturb a packed board.
fn limited_empty_cells(board: &Board, cap: usize) -> ArrayVec<(usize, usize), CELL_COUNT> {
    let mut cells = board.empty_cells();
    if cells.len() <= cap {
        return cells;
    }

    let corner_distance = |&(row, col): &(usize, usize)| {
        let distance = (row + col)
            .min(row + (SIZE - 1 - col))
            .min((SIZE - 1 - row) + col)
            .min((SIZE - 1 - row) + (SIZE - 1 - col));
        (distance, row, col)
    };
    cells.sort_unstable_by_key(corner_distance);
    cells.truncate(cap);
    cells
}

/// Per-decision search state: caches, deadline, and mode. Built fresh for
/// every top-level decision and dropped with it, so board states from a
/// previous move never leak in.
struct SearchContext<'a> {
    evaluator: &'a Evaluator,
    deadline: Instant,
    strong: bool,
    score_cache: HashMap<(Board, u8, NodeKind), f64>,
    eval_cache: HashMap<Board, f64>,
    move_cache: HashMap<Board, ArrayVec<Candidate, 4>>,
}

impl<'a> SearchContext<'a> {
    fn new(evaluator: &'a Evaluator, deadline: Instant, strong: bool) -> Self {
        Self {
            evaluator,
            deadline,
            strong,
            score_cache: HashMap::new(),
            eval_cache: HashMap::new(),
            move_cache: HashMap::new(),
        }
    }

    fn cached_eval(&mut self, board: &Board) -> f64 {
        *self
            .eval_cache
            .entry(*board)
            .or_insert_with(|| self.evaluator.evaluate(board))
    }

    fn cached_moves(&mut self, board: &Board) -> ArrayVec<Candidate, 4> {
        self.move_cache
            .entry(*board)
            .or_insert_with(|| legal_moves(board))
            .clone()
    }

    /// Expectimax over alternating player and chance turns.
    ///
    /// One ply is consumed when a chance node descends into the next player
    /// node; a player node keeps the current depth for its children. The
    /// deadline is polled before every expansion step and aborts the whole
    /// recursion via [`SearchTimeout`]; no partial value escapes.
    fn expectimax(&mut self, board: Board, depth: u8, kind: NodeKind) -> Result<f64, SearchTimeout> {
        if Instant::now() >= self.deadline {
            return Err(SearchTimeout);
        }

        let key = (board, depth, kind);
        if let Some(&value) = self.score_cache.get(&key) {
            return Ok(value);
        }

        if depth == 0 {
            let value = self.cached_eval(&board);
            self.score_cache.insert(key, value);
            return Ok(value);
        }

        let value = match kind {
            NodeKind::Chance => self.chance_value(board, depth)?,
            NodeKind::Player => self.player_value(board, depth)?,
        };
        self.score_cache.insert(key, value);
        Ok(value)
    }

    fn chance_value(&mut self, board: Board, depth: u8) -> Result<f64, SearchTimeout> {
        let cap = chance_branch_cap(depth, self.strong);
        let cells = limited_empty_cells(&board, cap);
        if cells.is_empty() {
            return self.expectimax(board, depth - 1, NodeKind::Player);
        }

        // Deep plies of normal mode assume only 2-spawns, trading exactness
        // for speed on the rare 4s.
        let spawn_options: &[(u32, f64)] = if self.strong || depth <= 3 {
            &[(2, 0.9), (4, 0.1)]
        } else {
            &[(2, 1.0)]
        };

        let cell_weight = 1.0 / cells.len() as f64;
        let mut total = 0.0;
        for (row, col) in cells {
            if Instant::now() >= self.deadline {
                return Err(SearchTimeout);
            }
            let mut expected = 0.0;
            for &(spawn, probability) in spawn_options {
                if Instant::now() >= self.deadline {
                    return Err(SearchTimeout);
                }
                let next = board.with_tile(row, col, spawn);
                expected += probability * self.expectimax(next, depth - 1, NodeKind::Player)?;
            }
            total += cell_weight * expected;
        }
        Ok(total)
    }

    fn player_value(&mut self, board: Board, depth: u8) -> Result<f64, SearchTimeout> {
        let moves = self.cached_moves(&board);
        if moves.is_empty() {
            return Ok(self.cached_eval(&board));
        }

        let mut best = f64::NEG_INFINITY;
        for candidate in moves {
            if Instant::now() >= self.deadline {
                return Err(SearchTimeout);
            }
            let value = self.expectimax(candidate.board, depth, NodeKind::Chance)?;
            best = best.max(value);
        }
        Ok(best)
    }
}

/// Time-boxed iterative-deepening expectimax move chooser.
#[derive(Debug, Clone, Default)]
pub struct Searcher {
    evaluator: Evaluator,
}

impl Searcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recommends a direction within `budget`, or `None` when no legal move
    /// exists.
    ///
    /// Runs expectimax passes of increasing depth; a depth only replaces
    /// the running best when every root candidate finished before the
    /// deadline, so an aborted depth leaves no partial influence. If not
    /// even depth 1 completes, falls back to the best (gain, heuristic)
    /// candidate.
    #[must_use]
    pub fn search_move(&self, board: &Board, budget: Duration, strong: bool) -> Option<Direction> {
        let candidates = legal_moves(board);
        if candidates.is_empty() {
            return None;
        }

        let deadline = Instant::now() + budget.max(MIN_SEARCH_BUDGET);
        let mut ctx = SearchContext::new(&self.evaluator, deadline, strong);
        ctx.move_cache.insert(*board, candidates.clone());

        // Order strong moves first so deeper iterations see good lines
        // early; correctness does not depend on this.
        let mut ordered: Vec<(Candidate, f64)> = candidates
            .iter()
            .map(|candidate| (*candidate, ctx.cached_eval(&candidate.board)))
            .collect();
        ordered.sort_by(|a, b| {
            (b.0.gain, b.0.board.count_empty())
                .cmp(&(a.0.gain, a.0.board.count_empty()))
                .then_with(|| b.1.total_cmp(&a.1))
        });

        let max_depth = depth_cap(board.count_empty(), strong);
        let mut best_move = ordered[0].0.direction;
        let mut best_value = f64::NEG_INFINITY;

        for depth in 1..=max_depth {
            ctx.score_cache.clear();
            let mut depth_best_move = best_move;
            let mut depth_best_value = f64::NEG_INFINITY;
            let mut completed = true;

            for (candidate, _) in &ordered {
                if Instant::now() >= ctx.deadline {
                    completed = false;
                    break;
                }
                let Ok(value) = ctx.expectimax(candidate.board, depth, NodeKind::Chance) else {
                    completed = false;
                    break;
                };
                let value = value + f64::from(candidate.gain) * ROOT_GAIN_WEIGHT;
                if value > depth_best_value {
                    depth_best_value = value;
                    depth_best_move = candidate.direction;
                }
            }

            if completed && depth_best_value > f64::NEG_INFINITY {
                best_move = depth_best_move;
                best_value = depth_best_value;
            } else {
                break;
            }
            if Instant::now() >= ctx.deadline {
                break;
            }
        }

        if best_value.is_infinite() {
            // Not even depth 1 finished: zero-search heuristic pick.
            let mut fallback = &ordered[0];
            for entry in &ordered[1..] {
                let better = entry.0.gain > fallback.0.gain
                    || (entry.0.gain == fallback.0.gain && entry.1 > fallback.1);
                if better {
                    fallback = entry;
                }
            }
            best_move = fallback.0.direction;
        }

        Some(best_move)
    }

    /// Single-ply choice by immediate gain, then resulting empty cells,
    /// then heuristic score. Used when the remaining budget cannot justify
    /// a deepening search.
    #[must_use]
    pub fn quick_move(&self, board: &Board) -> Option<Direction> {
        let candidates = legal_moves(board);
        let mut best: Option<(&Candidate, (u32, usize, f64))> = None;
        for candidate in &candidates {
            let key = (
                candidate.gain,
                candidate.board.count_empty(),
                self.evaluator.evaluate(&candidate.board),
            );
            let replace = match &best {
                None => true,
                Some((_, best_key)) => {
                    key.0 > best_key.0
                        || (key.0 == best_key.0 && key.1 > best_key.1)
                        || (key.0 == best_key.0 && key.1 == best_key.1 && key.2 > best_key.2)
                }
            };
            if replace {
                best = Some((candidate, key));
            }
        }
        best.map(|(candidate, _)| candidate.direction)
    }
}
