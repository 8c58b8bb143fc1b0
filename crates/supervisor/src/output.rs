//! Bounded capture of a child's recent output.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

const DEFAULT_TAIL_LINES: usize = 50;

/// The last few lines a child wrote to stdout/stderr.
#[derive(Debug, Clone)]
pub struct OutputTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl OutputTail {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TAIL_LINES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn lines(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().cloned().collect()
    }

    /// Read `reader` line by line until EOF, keeping the tail.
    ///
    /// The pipe is always drained so the child never blocks on a full
    /// buffer. Invalid UTF-8 is replaced rather than ending the drain.
    pub(crate) fn drain<R>(&self, reader: R, service: String, stream: &'static str)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let tail = self.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                        debug!(service = %service, stream, "{}", line);
                        tail.push(line);
                    }
                    Err(e) => {
                        debug!(service = %service, stream, error = %e, "Output stream closed");
                        break;
                    }
                }
            }
        });
    }
}

impl Default for OutputTail {
    fn default() -> Self {
        Self::new()
    }
}
