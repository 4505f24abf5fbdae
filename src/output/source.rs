//! Byte sources feeding the line buffer.

use std::io::Read;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use tracing::{debug, error, trace};

use crate::Result;

/// Default size of a single read from the shell's output.
const READ_BUFFER_SIZE: usize = 4096;

/// Number of chunks that may be queued ahead of the consumer.
const CHUNK_QUEUE_DEPTH: usize = 64;

/// A pull-based supply of raw byte chunks.
///
/// `pull` blocks until a chunk is available. When a deadline is given and
/// it passes first, `Ok(None)` is returned. End of stream is not signalled
/// explicitly: exhausted sources keep returning empty chunks.
pub trait ByteSource: Send {
    fn pull(&mut self, deadline: Option<Instant>) -> Result<Option<Vec<u8>>>;
}

impl<F> ByteSource for F
where
    F: FnMut() -> Vec<u8> + Send,
{
    fn pull(&mut self, _deadline: Option<Instant>) -> Result<Option<Vec<u8>>> {
        Ok(Some(self()))
    }
}

/// Receiving end of a reader thread that drains a blocking reader.
pub struct ChunkReceiver {
    rx: Receiver<Vec<u8>>,
    exhausted: bool,
}

impl ChunkReceiver {
    /// Wrap an existing chunk channel.
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            exhausted: false,
        }
    }

    /// Spawn a named thread that reads `reader` until EOF and forwards
    /// every chunk to the returned receiver.
    pub fn spawn<R>(reader: R, name: impl Into<String>) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(CHUNK_QUEUE_DEPTH);
        let name = name.into();
        let label = name.clone();
        let mut reader = reader;

        thread::Builder::new().name(name).spawn(move || {
            let mut buf = vec![0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!(reader = %label, "shell output: EOF");
                        break;
                    }
                    Ok(n) => {
                        trace!(reader = %label, "shell output: read {} bytes", n);
                        if tx.send(buf[..n].to_vec()).is_err() {
                            debug!(reader = %label, "shell output: receiver dropped");
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        // EIO on Unix means the PTY slave side is gone
                        #[cfg(unix)]
                        if e.raw_os_error() == Some(libc::EIO) {
                            debug!(reader = %label, "shell output: PTY closed (EIO)");
                            break;
                        }

                        error!(reader = %label, "shell output error: {}", e);
                        break;
                    }
                }
            }
        })?;

        Ok(Self::new(rx))
    }
}

impl ByteSource for ChunkReceiver {
    fn pull(&mut self, deadline: Option<Instant>) -> Result<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(Some(Vec::new()));
        }

        let received = match deadline {
            None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(deadline) => self
                .rx
                .recv_timeout(deadline.saturating_duration_since(Instant::now())),
        };

        match received {
            Ok(chunk) => Ok(Some(chunk)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                debug!("shell output exhausted");
                self.exhausted = true;
                Ok(Some(Vec::new()))
            }
        }
    }
}
