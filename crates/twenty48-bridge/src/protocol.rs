//! Wire messages and the packed board encoding of the native solver.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use twenty48_engine::{Board, Direction, SIZE};

use crate::frame::{FrameError, read_frame, write_frame};

/// Messages exchanged between supervisor and worker, as tagged
/// (kind, payload) pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Message {
    /// Worker finished initializing the native solver.
    Ready,
    /// Startup or per-request failure, with a human-readable reason.
    Error(String),
    /// Request a move for a packed board.
    MoveRequest(u64),
    /// Direction code reply, see [`direction_from_code`].
    MoveReply(u8),
    /// Supervisor is done; the worker exits. No reply is expected.
    Stop,
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ProtocolError {
    Frame(FrameError),
    #[display("malformed message: {_0}")]
    Decode(serde_json::Error),
}

pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<(), ProtocolError> {
    let payload = serde_json::to_vec(message).map_err(ProtocolError::Decode)?;
    write_frame(writer, &payload)?;
    Ok(())
}

pub fn read_message<R: Read>(reader: &mut R) -> Result<Message, ProtocolError> {
    let payload = read_frame(reader)?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Packs a board into the solver's 64-bit format: sixteen 4-bit nibbles in
/// row-major order, each holding `min(15, log2(value))`, 0 for empty.
#[must_use]
pub fn pack_board(board: &Board) -> u64 {
    let mut packed = 0_u64;
    let mut shift = 0;
    for row in 0..SIZE {
        for col in 0..SIZE {
            let value = board.get(row, col);
            let rank = if value == 0 {
                0
            } else {
                u64::from(value.ilog2().min(15))
            };
            packed |= rank << shift;
            shift += 4;
        }
    }
    packed
}

/// Direction code used on the wire: 0 up, 1 down, 2 left, 3 right.
#[must_use]
pub fn direction_code(direction: Direction) -> u8 {
    match direction {
        Direction::Up => 0,
        Direction::Down => 1,
        Direction::Left => 2,
        Direction::Right => 3,
    }
}

#[must_use]
pub fn direction_from_code(code: u8) -> Option<Direction> {
    match code {
        0 => Some(Direction::Up),
        1 => Some(Direction::Down),
        2 => Some(Direction::Left),
        3 => Some(Direction::Right),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn empty_board_packs_to_zero() {
        assert_eq!(pack_board(&Board::EMPTY), 0);
    }

    #[test]
    fn single_two_packs_to_lowest_nibble() {
        let board = Board::from_rows([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(pack_board(&board), 1);
    }

    #[test]
    fn nibbles_are_row_major_log2() {
        let board = Board::from_rows([
            [2, 4, 0, 0],
            [0; 4],
            [0; 4],
            [0, 0, 0, 32768],
        ]);
        let packed = pack_board(&board);
        assert_eq!(packed & 0xF, 1);
        assert_eq!((packed >> 4) & 0xF, 2);
        assert_eq!((packed >> 60) & 0xF, 15);
    }

    #[test]
    fn huge_tiles_saturate_at_fifteen() {
        let board = Board::from_rows([[131_072, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(pack_board(&board) & 0xF, 15);
    }

    #[test]
    fn direction_codes_round_trip() {
        for direction in Direction::ALL {
            assert_eq!(
                direction_from_code(direction_code(direction)),
                Some(direction)
            );
        }
        assert_eq!(direction_from_code(4), None);
    }

    #[test]
    fn messages_round_trip_through_frames() {
        let messages = [
            Message::Ready,
            Message::Error("dlopen failed".to_owned()),
            Message::MoveRequest(0x1234_5678_9abc_def0),
            Message::MoveReply(2),
            Message::Stop,
        ];
        let mut buf = Vec::new();
        for message in &messages {
            write_message(&mut buf, message).unwrap();
        }
        let mut cursor = Cursor::new(buf);
        for message in &messages {
            assert_eq!(&read_message(&mut cursor).unwrap(), message);
        }
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"not json").unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_message(&mut cursor),
            Err(ProtocolError::Decode(_))
        ));
    }
}
