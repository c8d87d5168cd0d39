//! Worker process hosting the native solver.
//!
//! Usage: `twenty48-worker <solver-library-path>`. Speaks the bridge
//! protocol on stdin/stdout; exits on `Stop` or when stdin closes.

use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use twenty48_bridge::worker;

fn main() -> ExitCode {
    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: twenty48-worker <solver-library-path>");
        return ExitCode::FAILURE;
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = BufWriter::new(stdout.lock());

    match worker::run(&mut reader, &mut writer, &path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("worker protocol failure: {err}");
            ExitCode::FAILURE
        }
    }
}
