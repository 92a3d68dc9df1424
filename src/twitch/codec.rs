//! IRC line framing for `FramedRead` / `FramedWrite`

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Maximum accepted line length, terminator excluded
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Splits a byte stream into `\n` or `\r\n` terminated lines
///
/// Lines longer than the limit are discarded whole, including the part that
/// arrives after the buffer overflowed, so one oversize line never ends the
/// session.
#[derive(Debug)]
pub struct LineCodec {
    max_length: usize,
    discarding: bool,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_LENGTH)
    }
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            discarding: false,
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = std::io::Error;

    /// Take the next complete line out of `buf`
    ///
    /// Invalid UTF-8 is replaced rather than rejected. Empty lines are
    /// skipped.
    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        loop {
            let Some(pos) = buf.iter().position(|b| *b == b'\n') else {
                if buf.len() > self.max_length {
                    tracing::warn!(buffered = buf.len(), "Line too long, discarding");
                    buf.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let raw = buf.split_to(pos + 1);
            if self.discarding {
                self.discarding = false;
                continue;
            }

            let mut line = &raw[..raw.len() - 1];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if line.len() > self.max_length {
                tracing::warn!(length = line.len(), "Line too long, discarding");
                continue;
            }
            if line.is_empty() {
                continue;
            }
            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        // An unterminated tail at EOF is dropped
        let line = self.decode(buf)?;
        if line.is_none() {
            buf.clear();
        }
        Ok(line)
    }
}

impl Encoder<String> for LineCodec {
    type Error = std::io::Error;

    /// Append `line` with a `\r\n` terminator
    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), Self::Error> {
        buf.reserve(line.len() + 2);
        buf.put_slice(line.as_bytes());
        buf.put_slice(b"\r\n");
        Ok(())
    }
}
