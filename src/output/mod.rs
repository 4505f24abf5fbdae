//! Output decoding.
//!
//! This module turns the raw bytes a shell writes into text lines:
//! - [`ByteSource`]: pull-based chunk supply (reader thread or closure)
//! - [`LineBuffer`]: CRLF framing tolerant of arbitrary chunk boundaries
//! - [`LineSanitizer`]: terminal control sequence removal
//!
//! # Example
//!
//! ```
//! use shell_channel::output::LineBuffer;
//!
//! let mut lines = LineBuffer::new(|| b"container-id\r\n".to_vec());
//! assert_eq!(lines.next().unwrap().value(), "container-id");
//! ```

mod line_buffer;
mod sanitizer;
mod source;

pub use line_buffer::{Line, LineBuffer, DEFAULT_MAX_READS};
pub use sanitizer::LineSanitizer;
pub use source::{ByteSource, ChunkReceiver};
