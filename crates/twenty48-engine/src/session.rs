use rand::SeedableRng as _;
use rand_pcg::Pcg32;

use crate::{Board, Direction, MoveOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum SessionState {
    Playing,
    /// The target tile was reached; play may continue.
    Won,
    GameOver,
}

/// Multi-turn game session owning the board, the RNG, and the score.
///
/// The score only ever grows (by merge gains); `best` carries the maximum
/// across restarts of the same session.
#[derive(Debug, Clone)]
pub struct GameSession {
    board: Board,
    rng: Pcg32,
    score: u32,
    best: u32,
    state: SessionState,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    /// Creates a session seeded from the OS random source.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(Pcg32::from_os_rng())
    }

    /// Creates a session with a fixed seed, for reproducible games.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(Pcg32::seed_from_u64(seed))
    }

    fn with_rng(mut rng: Pcg32) -> Self {
        let board = Board::new_game(&mut rng);
        Self {
            board,
            rng,
            score: 0,
            best: 0,
            state: SessionState::Playing,
        }
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn best(&self) -> u32 {
        self.best
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Starts a fresh game, keeping `best` from previous games.
    pub fn restart(&mut self) {
        self.board = Board::new_game(&mut self.rng);
        self.score = 0;
        self.state = SessionState::Playing;
    }

    /// Applies one shift. On a changed board the merge gain is added to the
    /// score, a random tile spawns, and terminal conditions are re-checked.
    /// A shift that changes nothing leaves the session untouched.
    pub fn shift(&mut self, direction: Direction) -> MoveOutcome {
        let outcome = self.board.apply_move(direction);
        if !outcome.moved {
            return outcome;
        }

        self.board = outcome.board;
        self.score += outcome.gain;
        self.best = self.best.max(self.score);
        self.board.add_random_tile(&mut self.rng);

        if self.state == SessionState::Playing && self.board.reached_target() {
            self.state = SessionState::Won;
        }
        if !self.board.can_move() {
            self.state = SessionState::GameOver;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CELL_COUNT;

    #[test]
    fn new_session_starts_playing_with_two_tiles() {
        let session = GameSession::with_seed(1);
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.board().count_empty(), CELL_COUNT - 2);
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn score_is_monotonic_over_many_shifts() {
        let mut session = GameSession::with_seed(99);
        let mut last_score = 0;
        for turn in 0..200 {
            if session.state().is_game_over() {
                break;
            }
            let direction = Direction::ALL[turn % 4];
            session.shift(direction);
            assert!(session.score() >= last_score);
            assert!(session.best() >= session.score());
            last_score = session.score();
        }
    }

    #[test]
    fn noop_shift_leaves_session_untouched() {
        let mut session = GameSession::with_seed(5);
        for turn in 0..5000 {
            if session.state().is_game_over() {
                break;
            }
            session.shift(Direction::ALL[turn % 4]);
        }
        assert!(session.state().is_game_over(), "random play should end");

        // On a dead board every shift is a no-op and must not mutate state.
        let board = *session.board();
        let score = session.score();
        for direction in Direction::ALL {
            let outcome = session.shift(direction);
            assert!(!outcome.moved);
            assert_eq!(*session.board(), board);
            assert_eq!(session.score(), score);
        }
    }

    #[test]
    fn restart_keeps_best_score() {
        let mut session = GameSession::with_seed(3);
        for _ in 0..50 {
            if session.state().is_game_over() {
                break;
            }
            for direction in Direction::ALL {
                if session.shift(direction).moved {
                    break;
                }
            }
        }
        let best = session.best();
        session.restart();
        assert_eq!(session.score(), 0);
        assert_eq!(session.best(), best);
        assert_eq!(session.state(), SessionState::Playing);
    }
}
