use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use twenty48_autopilot::{Autopilot, EnginePreference};
use twenty48_bridge::{DEFAULT_MOVE_TIMEOUT, WorkerConfig};
use twenty48_engine::{GameSession, TARGET};

/// Per-move thinking time for the local search.
const MOVE_TIME_BUDGET: Duration = Duration::from_millis(280);

/// Strong mode searches deeper, so it gets a proportionally longer budget.
const STRONG_BUDGET_FACTOR: f64 = 1.6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum EngineArg {
    /// External solver when available, local search otherwise.
    #[default]
    Auto,
    /// External solver required; exit if it cannot start.
    External,
    /// In-process search only.
    Local,
}

impl From<EngineArg> for EnginePreference {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Auto => Self::Auto,
            EngineArg::External => Self::External,
            EngineArg::Local => Self::Local,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Which move source to use
    #[clap(long, value_enum, default_value = "auto")]
    engine: EngineArg,
    /// Search deeper at the cost of slower moves
    #[clap(long)]
    strong: bool,
    /// Number of games to play back to back
    #[clap(long, default_value_t = 1)]
    games: u32,
    /// Path to the worker binary (defaults to one next to this executable)
    #[clap(long)]
    worker: Option<PathBuf>,
    /// Path to the native solver shared library
    #[clap(long, default_value = "2048.so")]
    solver_lib: PathBuf,
    /// Seed for reproducible tile spawns
    #[clap(long)]
    seed: Option<u64>,
    /// Print every move as it is played
    #[clap(long)]
    verbose: bool,
}

fn default_worker_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| Some(exe.parent()?.join("twenty48-worker")))
        .unwrap_or_else(|| PathBuf::from("twenty48-worker"))
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();

    let config = WorkerConfig {
        worker_path: args.worker.clone().unwrap_or_else(default_worker_path),
        library_path: args.solver_lib.clone(),
    };
    let mut autopilot = Autopilot::connect(args.engine.into(), config, DEFAULT_MOVE_TIMEOUT)
        .context("failed to set up the external engine")?;

    let mut reported_error = None;
    if let Some(reason) = autopilot.status().last_external_error {
        eprintln!("external engine unavailable, using local search: {reason}");
        reported_error = Some(reason.to_owned());
    }

    let budget = if args.strong {
        MOVE_TIME_BUDGET.mul_f64(STRONG_BUDGET_FACTOR)
    } else {
        MOVE_TIME_BUDGET
    };

    let mut session = match args.seed {
        Some(seed) => GameSession::with_seed(seed),
        None => GameSession::new(),
    };

    for game in 1..=args.games {
        if game > 1 {
            session.restart();
        }
        let mut turns = 0_u32;

        loop {
            let Some(direction) = autopilot.choose_move(session.board(), budget, args.strong)
            else {
                break;
            };

            if let Some(reason) = autopilot.status().last_external_error
                && reported_error.as_deref() != Some(reason)
            {
                eprintln!("external engine fell back to local search: {reason}");
                reported_error = Some(reason.to_owned());
            }

            let outcome = session.shift(direction);
            if !outcome.moved {
                break;
            }
            turns += 1;
            if args.verbose {
                println!(
                    "  turn {turns}: {direction} (+{}, score {})",
                    outcome.gain,
                    session.score()
                );
            }
            if session.state().is_game_over() {
                break;
            }
        }

        let max_tile = session.board().max_tile();
        let won = if max_tile >= TARGET { ", reached 2048" } else { "" };
        println!(
            "game {game}: score {}, max tile {max_tile}, {turns} turns{won}",
            session.score()
        );
    }

    if args.games > 1 {
        println!("best score: {}", session.best());
    }
    autopilot.shutdown();
    Ok(())
}
