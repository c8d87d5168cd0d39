//! Heuristic evaluation and time-boxed expectimax search for 2048 boards.
//!
//! [`Evaluator`] scores a static board; [`Searcher`] runs an iterative
//! deepening expectimax under a wall-clock budget and recommends a
//! direction. Both are stateless between decisions: every call to
//! [`Searcher::search_move`] builds its caches fresh and drops them on
//! return.

pub use self::{evaluator::*, search::*};

mod evaluator;
mod search;
