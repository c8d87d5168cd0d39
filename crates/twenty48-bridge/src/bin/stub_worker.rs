//! Scripted worker used by the supervisor integration tests.
//!
//! The first argument selects a behavior:
//!   ok    — handshake, then answer every request with move code 2 (left)
//!   stall — handshake, then never answer
//!   fail  — report a startup error and exit

use std::io::{self, BufReader, BufWriter};
use std::process::ExitCode;
use std::time::Duration;

use twenty48_bridge::worker::{Solver, serve};
use twenty48_bridge::{Message, write_message};

struct LeftSolver;

impl Solver for LeftSolver {
    fn best_move(&mut self, _packed: u64) -> Result<u8, String> {
        Ok(2)
    }
}

fn main() -> ExitCode {
    let mode = std::env::args().nth(1).unwrap_or_default();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = BufWriter::new(stdout.lock());

    let result = match mode.as_str() {
        "ok" => write_message(&mut writer, &Message::Ready)
            .and_then(|()| serve(&mut reader, &mut writer, &mut LeftSolver)),
        "stall" => {
            let result = write_message(&mut writer, &Message::Ready);
            if result.is_ok() {
                loop {
                    std::thread::sleep(Duration::from_secs(60));
                }
            }
            result
        }
        "fail" => write_message(&mut writer, &Message::Error("scripted failure".to_owned())),
        other => {
            eprintln!("unknown stub mode: {other:?}");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("stub worker failure: {err}");
            ExitCode::FAILURE
        }
    }
}
