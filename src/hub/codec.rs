/// Line codec: frames a TCP byte stream into chat protocol lines.
///
/// Splits inbound bytes on `\n` (a trailing `\r` is tolerated and stripped),
/// yields each client line as a `String`, and serializes outgoing
/// [`ServerLine`]s with `\n` termination.
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::message::ServerLine;

/// Maximum line length (excluding the terminator).
pub const MAX_LINE_LENGTH: usize = 8191;

/// Codec error: an oversized line or an I/O error.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("line exceeds maximum length ({MAX_LINE_LENGTH} bytes)")]
    LineTooLong,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A tokio codec that frames client lines on `\n` boundaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineCodec;

fn into_line(bytes: &[u8]) -> Result<String, CodecError> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    let line = std::str::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(line.to_owned())
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                if pos > MAX_LINE_LENGTH {
                    return Err(CodecError::LineTooLong);
                }
                let line_bytes = src.split_to(pos);
                src.advance(1); // skip \n
                into_line(&line_bytes).map(Some)
            }
            None => {
                // No complete line yet. Check if buffer is getting too large.
                if src.len() > MAX_LINE_LENGTH {
                    return Err(CodecError::LineTooLong);
                }
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        // A final line without a terminator still counts.
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split_to(src.len());
        into_line(&rest).map(Some)
    }
}

impl Encoder<ServerLine> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: ServerLine, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let wire = item.to_wire();
        dst.reserve(wire.len() + 1);
        dst.put_slice(wire.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
