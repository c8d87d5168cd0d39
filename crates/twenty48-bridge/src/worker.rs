//! Worker-side request loop.
//!
//! The worker process owns the native solver and answers one request at a
//! time: read a frame off stdin, run the solver, write the reply to stdout.
//! Stdout carries protocol frames only; the native layer's own printing is
//! muted by a [`StdoutGate`](crate::native::StdoutGate) around each call.

use std::io::{Read, Write};
use std::path::Path;

use crate::native::NativeSolver;
use crate::protocol::{Message, ProtocolError, read_message, write_message};

/// Move source the request loop serves. The real worker wraps the native
/// library; tests substitute their own.
pub trait Solver {
    fn best_move(&mut self, packed: u64) -> Result<u8, String>;
}

impl Solver for NativeSolver {
    fn best_move(&mut self, packed: u64) -> Result<u8, String> {
        let gate = crate::native::StdoutGate::redirect()
            .map_err(|e| format!("failed to mute solver stdout: {e}"))?;
        let code = NativeSolver::best_move(self, packed);
        drop(gate);
        u8::try_from(code).map_err(|_| format!("solver returned invalid move {code}"))
    }
}

/// Serves requests until `Stop` or EOF. `Ready` must already have been
/// written by the caller; the loop only produces replies.
pub fn serve<R, W, S>(reader: &mut R, writer: &mut W, solver: &mut S) -> Result<(), ProtocolError>
where
    R: Read,
    W: Write,
    S: Solver,
{
    loop {
        let request = match read_message(reader) {
            Ok(message) => message,
            // Supervisor hung up without a Stop; treat as shutdown.
            Err(ProtocolError::Frame(crate::frame::FrameError::UnexpectedEof)) => return Ok(()),
            Err(err) => return Err(err),
        };
        match request {
            Message::MoveRequest(packed) => {
                let reply = match solver.best_move(packed) {
                    Ok(code) => Message::MoveReply(code),
                    Err(reason) => Message::Error(reason),
                };
                write_message(writer, &reply)?;
            }
            Message::Stop => return Ok(()),
            other => {
                write_message(
                    writer,
                    &Message::Error(format!("unexpected request: {other:?}")),
                )?;
            }
        }
    }
}

/// Full worker lifecycle for the real binary: load the library at `path`,
/// report `Ready` (or `Error` and exit), then serve requests.
pub fn run<R, W>(reader: &mut R, writer: &mut W, path: &Path) -> Result<(), ProtocolError>
where
    R: Read,
    W: Write,
{
    let mut solver = match NativeSolver::load(path) {
        Ok(solver) => solver,
        Err(err) => {
            write_message(writer, &Message::Error(err.to_string()))?;
            return Ok(());
        }
    };
    write_message(writer, &Message::Ready)?;
    serve(reader, writer, &mut solver)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    struct FixedSolver(u8);

    impl Solver for FixedSolver {
        fn best_move(&mut self, _packed: u64) -> Result<u8, String> {
            Ok(self.0)
        }
    }

    struct FailingSolver;

    impl Solver for FailingSolver {
        fn best_move(&mut self, _packed: u64) -> Result<u8, String> {
            Err("solver exploded".to_owned())
        }
    }

    fn requests(messages: &[Message]) -> Cursor<Vec<u8>> {
        let mut buf = Vec::new();
        for message in messages {
            write_message(&mut buf, message).unwrap();
        }
        Cursor::new(buf)
    }

    fn replies(buf: &[u8]) -> Vec<Message> {
        let mut cursor = Cursor::new(buf);
        let mut out = Vec::new();
        while let Ok(message) = read_message(&mut cursor) {
            out.push(message);
        }
        out
    }

    #[test]
    fn answers_each_request_until_stop() {
        let mut input = requests(&[
            Message::MoveRequest(0),
            Message::MoveRequest(42),
            Message::Stop,
        ]);
        let mut output = Vec::new();
        serve(&mut input, &mut output, &mut FixedSolver(2)).unwrap();
        assert_eq!(
            replies(&output),
            vec![Message::MoveReply(2), Message::MoveReply(2)]
        );
    }

    #[test]
    fn eof_is_a_clean_shutdown() {
        let mut input = requests(&[Message::MoveRequest(7)]);
        let mut output = Vec::new();
        serve(&mut input, &mut output, &mut FixedSolver(0)).unwrap();
        assert_eq!(replies(&output), vec![Message::MoveReply(0)]);
    }

    #[test]
    fn solver_failure_becomes_an_error_reply() {
        let mut input = requests(&[Message::MoveRequest(7), Message::Stop]);
        let mut output = Vec::new();
        serve(&mut input, &mut output, &mut FailingSolver).unwrap();
        assert_eq!(
            replies(&output),
            vec![Message::Error("solver exploded".to_owned())]
        );
    }

    #[test]
    fn unexpected_request_is_reported_and_loop_continues() {
        let mut input = requests(&[Message::Ready, Message::MoveRequest(1), Message::Stop]);
        let mut output = Vec::new();
        serve(&mut input, &mut output, &mut FixedSolver(3)).unwrap();
        let replies = replies(&output);
        assert_eq!(replies.len(), 2);
        assert!(matches!(replies[0], Message::Error(_)));
        assert_eq!(replies[1], Message::MoveReply(3));
    }
}
