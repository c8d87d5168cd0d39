//! Length-delimited framing: u32 little-endian length prefix, then payload.

use std::io::{self, Read, Write};

/// Frames beyond this size indicate a corrupted stream, not a real message.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum FrameError {
    #[display("frame io error: {_0}")]
    Io(io::Error),
    #[display("frame too large: {len} > {MAX_FRAME_LEN}")]
    #[from(skip)]
    TooLarge { len: u32 },
    #[display("unexpected end of stream")]
    UnexpectedEof,
}

pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge { len: u32::MAX })?;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len });
    }
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut len_bytes = [0_u8; 4];
    read_exact_or_eof(reader, &mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len });
    }
    let mut payload = vec![0_u8; len as usize];
    read_exact_or_eof(reader, &mut payload)?;
    Ok(payload)
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => return Err(FrameError::UnexpectedEof),
            n => filled += n,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").unwrap();
        write_frame(&mut buf, b"").unwrap();

        let mut cursor = io::Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), b"hello");
        assert_eq!(read_frame(&mut cursor).unwrap(), b"");
        assert!(matches!(
            read_frame(&mut cursor),
            Err(FrameError::UnexpectedEof)
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let payload = vec![0_u8; MAX_FRAME_LEN as usize + 1];
        let mut buf = Vec::new();
        assert!(matches!(
            write_frame(&mut buf, &payload),
            Err(FrameError::TooLarge { .. })
        ));

        let mut bogus = Vec::new();
        bogus.extend_from_slice(&(MAX_FRAME_LEN + 1).to_le_bytes());
        let mut cursor = io::Cursor::new(bogus);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(FrameError::TooLarge { .. })
        ));
    }

    #[test]
    fn truncated_payload_is_eof() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&8_u32.to_le_bytes());
        buf.extend_from_slice(b"abc");
        let mut cursor = io::Cursor::new(buf);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(FrameError::UnexpectedEof)
        ));
    }
}
