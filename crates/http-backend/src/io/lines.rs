use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading newline-delimited lines from a chunk stream.
///
/// The chat endpoint responds with one JSON object per line, and chunk
/// boundaries fall anywhere, including inside a line or inside a multi-byte
/// character. Bytes are buffered until a line feed arrives; a trailing
/// unterminated line is held back until the stream ends, then yielded as
/// the final line.
pub struct NdjsonLines {
    buf: Vec<u8>,
    chunks: Chunks,
    exhausted: bool,
}

impl NdjsonLines {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
            exhausted: false,
        }
    }

    /// Reads the next non-blank line, or `None` once the stream is over.
    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(line) = self.take_line()? {
                return Ok(Some(line));
            }

            if self.exhausted {
                // Whatever remains never got its line feed; it is still
                // one complete line once the server closes the stream.
                return self.take_remainder();
            }

            match self.chunks.next_chunk().await.map_err(Error::ChunksError)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.exhausted = true,
            }
        }
    }

    fn take_line(&mut self) -> Result<Option<String>, Error> {
        while let Some(lf_idx) = self.buf.iter().position(|b| *b == b'\n') {
            let rest = self.buf.split_off(lf_idx + 1);
            let mut line_bytes = std::mem::replace(&mut self.buf, rest);
            line_bytes.pop();
            let line = decode_line(line_bytes)?;
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    fn take_remainder(&mut self) -> Result<Option<String>, Error> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let line = decode_line(std::mem::take(&mut self.buf))?;
        if line.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

fn decode_line(bytes: Vec<u8>) -> Result<String, Error> {
    String::from_utf8(bytes).map_err(|_| Error::InvalidPayload)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use bytes::Bytes;

    use super::*;

    fn lines_from(chunks: Vec<Bytes>) -> NdjsonLines {
        NdjsonLines::new(Chunks::from_vec_deque(VecDeque::from(chunks)))
    }

    #[tokio::test]
    async fn test_whole_lines() {
        let mut lines = lines_from(vec![
            Bytes::from_static(b"{\"a\":1}\n"),
            Bytes::from_static(b"{\"b\":2}\n"),
        ]);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"b\":2}");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_split_across_chunks() {
        let mut lines = lines_from(vec![
            Bytes::from_static(b"{\"content\":"),
            Bytes::from_static(b"\"hi\"}\n{\"conte"),
            Bytes::from_static(b"nt\":\"bye\"}\n"),
        ]);
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"content\":\"hi\"}"
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"content\":\"bye\"}"
        );
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unterminated_final_line() {
        let mut lines = lines_from(vec![
            Bytes::from_static(b"{\"a\":1}\n{\"b\":"),
            Bytes::from_static(b"2}"),
        ]);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"b\":2}");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multi_byte_char_split_across_chunks() {
        // "你" encodes to three bytes; cut in the middle of it.
        let encoded = "{\"c\":\"你\"}\n".as_bytes();
        let mut lines = lines_from(vec![
            Bytes::copy_from_slice(&encoded[..7]),
            Bytes::copy_from_slice(&encoded[7..]),
        ]);
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"c\":\"你\"}"
        );
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let mut lines =
            lines_from(vec![Bytes::from_static(b"\n  \n{\"a\":1}\n\n")]);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let mut lines = lines_from(vec![Bytes::from_static(b"\xff\xfe\n")]);
        assert_eq!(
            lines.next_line().await.unwrap_err(),
            Error::InvalidPayload
        );
    }
}
