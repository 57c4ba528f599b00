//! Byte transport into the control loop.
//!
//! A reader thread moves raw bytes from the operator link (stdin, a serial
//! device opened as a file) into a channel. The control thread drains the
//! channel without blocking and feeds bytes into a fixed-capacity
//! [`FrameAssembler`] that the command parser reads from.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use heapless::String;
use tfm_common::consts::{FRAME_BUFFER_CAPACITY, FRAME_TERMINATOR};
use tracing::{debug, warn};

/// Reader thread chunk size [bytes].
const READ_CHUNK: usize = 256;

/// What happened to one pushed byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Buffered,
    /// The byte was the frame terminator.
    Terminated,
    /// Not ASCII; discarded.
    Dropped,
    /// Buffer was full; everything buffered was discarded.
    Overflow,
}

/// Fixed-capacity text buffer for partially received frames.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: String<FRAME_BUFFER_CAPACITY>,
    overflows: u64,
}

impl FrameAssembler {
    pub const fn new() -> Self {
        Self {
            buf: String::new(),
            overflows: 0,
        }
    }

    pub fn push(&mut self, byte: u8) -> PushOutcome {
        if !byte.is_ascii() {
            return PushOutcome::Dropped;
        }
        let ch = char::from(byte);
        if self.buf.push(ch).is_err() {
            self.overflows += 1;
            warn!(
                "frame buffer full ({FRAME_BUFFER_CAPACITY} bytes) without terminator, discarding"
            );
            self.buf.clear();
            return PushOutcome::Overflow;
        }
        if ch == FRAME_TERMINATOR {
            PushOutcome::Terminated
        } else {
            PushOutcome::Buffered
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.buf.as_str()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Times the buffer overflowed.
    #[inline]
    pub const fn overflows(&self) -> u64 {
        self.overflows
    }

    /// Drop the first `n` bytes.
    pub fn consume(&mut self, n: usize) {
        if n >= self.buf.len() {
            self.buf.clear();
            return;
        }
        let mut rest = String::<FRAME_BUFFER_CAPACITY>::new();
        // A suffix of the buffer always fits.
        let _ = rest.push_str(&self.buf[n..]);
        self.buf = rest;
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Spawn a thread that forwards everything read from `reader`.
///
/// The channel disconnects when the reader hits end of input or fails.
pub fn spawn_reader<R>(mut reader: R, name: &str) -> io::Result<Receiver<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let thread_name = name.to_string();
    thread::Builder::new().name(thread_name).spawn(move || {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => {
                    debug!("command input closed");
                    break;
                }
                Ok(n) => {
                    if tx.send(chunk[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("command input read failed: {e}");
                    break;
                }
            }
        }
    })?;
    Ok(rx)
}

/// Operator commands from standard input.
pub fn spawn_stdin_reader() -> io::Result<Receiver<Vec<u8>>> {
    spawn_reader(io::stdin(), "tfm-stdin")
}
