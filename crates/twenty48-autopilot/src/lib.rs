//! Move arbitration between the external native solver and the local search.
//!
//! [`Autopilot`] asks the external engine first when one is configured and
//! falls back to the in-process expectimax search when it is unavailable,
//! times out, or was never set up. Fallback after an external failure runs
//! the local search in strong mode, since that path exists to cover for a
//! much deeper solver.

use std::time::{Duration, Instant};

use twenty48_ai::Searcher;
use twenty48_bridge::{BridgeError, DEFAULT_MOVE_TIMEOUT, ExternalEngine, WorkerConfig};
use twenty48_engine::{Board, Direction};

/// Below this remaining budget a deepening search is not worth starting;
/// the single-ply heuristic picks instead.
pub const QUICK_MOVE_FLOOR: Duration = Duration::from_millis(80);

/// Which move source the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display(rename_all = "lowercase")]
pub enum EnginePreference {
    /// In-process search only.
    Local,
    /// External solver required; setup failure is an error.
    External,
    /// External solver when available, silent degradation to local.
    Auto,
}

/// Snapshot of the arbitration state for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus<'a> {
    /// True while an external engine is configured and will be consulted.
    pub external_active: bool,
    /// Most recent external failure, or the reason setup degraded to local.
    pub last_external_error: Option<&'a str>,
}

#[derive(Debug)]
pub struct Autopilot {
    searcher: Searcher,
    external: Option<ExternalEngine>,
    external_timeout: Duration,
    degraded: Option<String>,
}

impl Autopilot {
    /// In-process search only.
    #[must_use]
    pub fn local() -> Self {
        Self {
            searcher: Searcher::new(),
            external: None,
            external_timeout: DEFAULT_MOVE_TIMEOUT,
            degraded: None,
        }
    }

    /// Arbitration over an already-constructed external engine.
    #[must_use]
    pub fn with_external(external: ExternalEngine, external_timeout: Duration) -> Self {
        Self {
            searcher: Searcher::new(),
            external: Some(external),
            external_timeout,
            degraded: None,
        }
    }

    /// Sets up per `preference`. `External` propagates setup failures;
    /// `Auto` degrades to local and records the reason in [`status`].
    ///
    /// [`status`]: Self::status
    pub fn connect(
        preference: EnginePreference,
        config: WorkerConfig,
        external_timeout: Duration,
    ) -> Result<Self, BridgeError> {
        match preference {
            EnginePreference::Local => Ok(Self::local()),
            EnginePreference::External => {
                let external = ExternalEngine::load(config)?;
                Ok(Self::with_external(external, external_timeout))
            }
            EnginePreference::Auto => match ExternalEngine::load(config) {
                Ok(external) => Ok(Self::with_external(external, external_timeout)),
                Err(err) => {
                    let mut autopilot = Self::local();
                    autopilot.degraded = Some(err.to_string());
                    Ok(autopilot)
                }
            },
        }
    }

    #[must_use]
    pub fn status(&self) -> EngineStatus<'_> {
        EngineStatus {
            external_active: self.external.is_some(),
            last_external_error: self
                .external
                .as_ref()
                .and_then(ExternalEngine::last_error)
                .or(self.degraded.as_deref()),
        }
    }

    /// Picks a move within `budget`. The external engine is consulted first
    /// when configured; whatever time it consumed is charged against the
    /// local fallback, which drops to [`Searcher::quick_move`] once the
    /// remainder is at or below [`QUICK_MOVE_FLOOR`]. Returns `None` iff no
    /// legal move exists.
    pub fn choose_move(
        &mut self,
        board: &Board,
        budget: Duration,
        strong: bool,
    ) -> Option<Direction> {
        let started = Instant::now();
        let mut strong = strong;

        if let Some(external) = self.external.as_mut() {
            let external_budget = budget.min(self.external_timeout);
            if let Some(direction) = external.choose_move(board, external_budget) {
                return Some(direction);
            }
            strong = true;
        }

        let remaining = budget.saturating_sub(started.elapsed());
        if remaining <= QUICK_MOVE_FLOOR {
            self.searcher.quick_move(board)
        } else {
            self.searcher.search_move(board, remaining, strong)
        }
    }

    /// Stops any live worker; the next external consultation respawns.
    pub fn shutdown(&mut self) {
        if let Some(external) = self.external.as_mut() {
            external.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn mergeable_board() -> Board {
        Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]])
    }

    fn dead_board() -> Board {
        Board::from_rows([
            [2, 4, 2, 4],
            [4, 2, 4, 2],
            [2, 4, 2, 4],
            [4, 2, 4, 2],
        ])
    }

    fn broken_external() -> ExternalEngine {
        ExternalEngine::new(WorkerConfig {
            worker_path: PathBuf::from("/nonexistent/twenty48-worker"),
            library_path: PathBuf::from("/nonexistent/libsolver.so"),
        })
    }

    #[test]
    fn local_autopilot_moves_on_a_live_board() {
        let mut autopilot = Autopilot::local();
        let direction = autopilot.choose_move(&mergeable_board(), Duration::from_millis(50), false);
        assert!(direction.is_some());
        assert!(!autopilot.status().external_active);
    }

    #[test]
    fn dead_board_yields_no_move() {
        let mut autopilot = Autopilot::local();
        assert_eq!(
            autopilot.choose_move(&dead_board(), Duration::from_millis(50), false),
            None
        );
    }

    #[test]
    fn external_failure_falls_back_to_local() {
        let mut autopilot =
            Autopilot::with_external(broken_external(), Duration::from_millis(100));
        let direction = autopilot.choose_move(&mergeable_board(), Duration::from_millis(300), false);
        assert!(direction.is_some());
        assert!(autopilot.status().last_external_error.is_some());
    }

    #[test]
    fn auto_preference_degrades_when_library_is_missing() {
        let config = WorkerConfig {
            worker_path: PathBuf::from("/nonexistent/twenty48-worker"),
            library_path: PathBuf::from("/nonexistent/libsolver.so"),
        };
        let autopilot =
            Autopilot::connect(EnginePreference::Auto, config, DEFAULT_MOVE_TIMEOUT).unwrap();
        let status = autopilot.status();
        assert!(!status.external_active);
        assert!(status.last_external_error.is_some());
    }

    #[test]
    fn external_preference_propagates_setup_failure() {
        let config = WorkerConfig {
            worker_path: PathBuf::from("/nonexistent/twenty48-worker"),
            library_path: PathBuf::from("/nonexistent/libsolver.so"),
        };
        let result = Autopilot::connect(EnginePreference::External, config, DEFAULT_MOVE_TIMEOUT);
        assert!(matches!(result, Err(BridgeError::MissingLibrary { .. })));
    }

    #[test]
    fn tight_budget_still_moves() {
        let mut autopilot = Autopilot::local();
        let direction = autopilot.choose_move(&mergeable_board(), Duration::ZERO, false);
        assert!(direction.is_some());
    }
}
