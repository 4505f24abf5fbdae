//! CRLF line decoding over an arbitrarily chunked byte stream.

use std::fmt;
use std::time::Instant;

use tracing::trace;

use super::ByteSource;
use crate::error::ShellChannelError;
use crate::Result;

/// Default number of pulls a single `next` call may make before giving up.
pub const DEFAULT_MAX_READS: usize = 1000;

const TERMINATOR: &[u8; 2] = b"\r\n";

/// A decoded line of output with its terminator stripped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line(String);

impl Line {
    /// Create a line from already decoded text.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The line's text.
    pub fn value(&self) -> &str {
        &self.0
    }

    /// Take the line's text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Line {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lazily splits the bytes of a [`ByteSource`] into CRLF-terminated lines.
///
/// Unconsumed bytes are kept between calls, so a terminator split across
/// two chunks is still recognised as one.
pub struct LineBuffer<S> {
    source: S,
    buffer: Vec<u8>,
    /// Start of the unconsumed region.
    head: usize,
    /// Everything before `scanned - 1` is known not to start a terminator.
    scanned: usize,
    max_reads: usize,
}

impl<S: ByteSource> LineBuffer<S> {
    /// Create a line buffer with the default read ceiling.
    pub fn new(source: S) -> Self {
        Self::with_max_reads(source, DEFAULT_MAX_READS)
    }

    /// Create a line buffer that fails after `max_reads` fruitless pulls.
    pub fn with_max_reads(source: S, max_reads: usize) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            head: 0,
            scanned: 0,
            max_reads,
        }
    }

    /// The configured read ceiling.
    pub fn max_reads(&self) -> usize {
        self.max_reads
    }

    /// Return the next complete line, pulling from the source as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ShellChannelError::ProtocolDesync`] when no terminator
    /// shows up within the read ceiling.
    pub fn next(&mut self) -> Result<Line> {
        self.read_line(None)?
            .ok_or(ShellChannelError::ProtocolDesync {
                reads: self.max_reads,
            })
    }

    /// Like [`next`](Self::next), but gives up with `Ok(None)` once the
    /// source reports that `deadline` has passed.
    pub fn next_until(&mut self, deadline: Instant) -> Result<Option<Line>> {
        self.read_line(Some(deadline))
    }

    fn read_line(&mut self, deadline: Option<Instant>) -> Result<Option<Line>> {
        let mut reads = 0;
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }

            if reads >= self.max_reads {
                return Err(ShellChannelError::ProtocolDesync {
                    reads: self.max_reads,
                });
            }
            reads += 1;

            match self.source.pull(deadline)? {
                Some(chunk) => self.append(&chunk),
                None if deadline.is_some() => return Ok(None),
                None => {}
            }
        }
    }

    fn take_line(&mut self) -> Option<Line> {
        let from = self.head.max(self.scanned.saturating_sub(1));
        match find_terminator(&self.buffer[from..]) {
            Some(offset) => {
                let end = from + offset;
                let line = String::from_utf8_lossy(&self.buffer[self.head..end]).into_owned();
                self.head = end + TERMINATOR.len();
                self.scanned = self.head;
                trace!(len = line.len(), "decoded line");
                Some(Line(line))
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    fn append(&mut self, chunk: &[u8]) {
        if self.head > 0 {
            self.buffer.drain(..self.head);
            self.scanned -= self.head;
            self.head = 0;
        }
        self.buffer.extend_from_slice(chunk);
    }
}

fn find_terminator(haystack: &[u8]) -> Option<usize> {
    haystack.windows(TERMINATOR.len()).position(|w| w == TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Source that replays `chunks` in order and then repeats the last one.
    fn chunks(chunks: &[&str]) -> impl FnMut() -> Vec<u8> + Send {
        let chunks: Vec<Vec<u8>> = chunks.iter().map(|c| c.as_bytes().to_vec()).collect();
        let counter = Arc::new(AtomicUsize::new(0));
        move || {
            let i = counter.fetch_add(1, Ordering::SeqCst);
            chunks[i.min(chunks.len() - 1)].clone()
        }
    }

    fn values<S: ByteSource>(buffer: &mut LineBuffer<S>, n: usize) -> Vec<String> {
        (0..n).map(|_| buffer.next().unwrap().into_string()).collect()
    }

    #[test]
    fn test_no_terminator_within_ceiling() {
        let mut buffer = LineBuffer::with_max_reads(|| b"asd".to_vec(), 1000);

        let err = buffer.next().unwrap_err();
        assert!(matches!(err, ShellChannelError::ProtocolDesync { reads: 1000 }));
        assert_eq!(err.to_string(), "couldn't find new line after 1000 reads");
    }

    #[test]
    fn test_only_crlf_is_one_empty_line() {
        let mut buffer = LineBuffer::new(|| b"\r\n".to_vec());
        assert_eq!(buffer.next().unwrap().value(), "");
    }

    #[test]
    fn test_crlf_split_between_two_chunks() {
        let mut buffer = LineBuffer::new(chunks(&["\r", "\n"]));
        assert_eq!(buffer.next().unwrap().value(), "");
    }

    #[test]
    fn test_single_letter() {
        let mut buffer = LineBuffer::new(|| b"q\r\n".to_vec());
        assert_eq!(buffer.next().unwrap().value(), "q");
    }

    #[test]
    fn test_many_lines_in_one_chunk() {
        let text: String = (0..=20).map(|i| format!("qwerty{}\r\n", i)).collect();
        let bytes = text.into_bytes();
        let mut buffer = LineBuffer::new(move || bytes.clone());

        for i in 0..20 {
            assert_eq!(buffer.next().unwrap().value(), format!("qwerty{}", i));
        }
    }

    #[test]
    fn test_two_lines_with_empty_second_line_repeating_source() {
        let mut buffer = LineBuffer::new(|| b"qwe\r\n\r\n".to_vec());
        assert_eq!(values(&mut buffer, 4), vec!["qwe", "", "qwe", ""]);
    }

    #[test]
    fn test_empty_line_split_across_later_chunks() {
        let mut buffer = LineBuffer::new(chunks(&["qwe\r\n\r\n", "\r", "\n"]));
        assert_eq!(values(&mut buffer, 3), vec!["qwe", "", ""]);
    }

    #[test]
    fn test_terminator_in_separate_chunk() {
        let mut buffer = LineBuffer::new(chunks(&["asdf", "\r\n"]));
        assert_eq!(buffer.next().unwrap().value(), "asdf");
    }

    #[test]
    fn test_two_split_terminators_then_desync() {
        let mut buffer = LineBuffer::with_max_reads(chunks(&["\r", "\n", "\r", "\n", "\r"]), 50);

        assert_eq!(buffer.next().unwrap().value(), "");
        assert_eq!(buffer.next().unwrap().value(), "");
        assert!(matches!(
            buffer.next(),
            Err(ShellChannelError::ProtocolDesync { reads: 50 })
        ));
    }

    #[test]
    fn test_cr_and_lf_in_three_chunks() {
        let mut buffer = LineBuffer::new(chunks(&["q", "\r", "\n"]));
        assert_eq!(buffer.next().unwrap().value(), "q");
    }

    #[test]
    fn test_line_assembled_from_three_chunks() {
        let mut buffer = LineBuffer::new(chunks(&["qwe", "rty", "uio\r\n"]));
        assert_eq!(buffer.next().unwrap().value(), "qwertyuio");
    }

    #[test]
    fn test_split_terminator_keeps_remainder() {
        let mut buffer = LineBuffer::new(chunks(&["X\r", "\nY", "\r\n"]));

        assert_eq!(buffer.next().unwrap().value(), "X");
        assert_eq!(buffer.next().unwrap().value(), "Y");
    }

    #[test]
    fn test_big_lines() {
        let line_count = 150;
        let line_size = 1000;
        let text: String = (0..line_count)
            .map(|i| format!("{}\r\n", i.to_string().repeat(line_size)))
            .collect();
        let bytes = text.into_bytes();
        let mut buffer = LineBuffer::new(move || bytes.clone());

        for i in 0..line_count {
            assert_eq!(buffer.next().unwrap().value(), i.to_string().repeat(line_size));
        }
    }

    #[test]
    fn test_arbitrary_chunking_matches_plain_split() {
        let text = "alpha\r\n\r\nbeta gamma\r\nδέλτα\r\n\r\nlast one\r\n";
        let expected: Vec<&str> = text.trim_end_matches("\r\n").split("\r\n").collect();
        let bytes = text.as_bytes().to_vec();

        for size in 1..=bytes.len() {
            let pieces: Vec<Vec<u8>> = bytes.chunks(size).map(<[u8]>::to_vec).collect();
            let mut index = 0;
            let mut buffer = LineBuffer::new(move || {
                let piece = pieces.get(index).cloned().unwrap_or_default();
                index += 1;
                piece
            });

            let actual = values(&mut buffer, expected.len());
            assert_eq!(actual, expected, "chunk size {}", size);
        }
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut buffer = LineBuffer::new(|| b"ab\xffcd\r\n".to_vec());
        assert_eq!(buffer.next().unwrap().value(), "ab\u{fffd}cd");
    }
}
