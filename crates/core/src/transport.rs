//! Transport adapter contract.
//!
//! The codec never touches audio hardware directly. Each direction is a
//! simplex channel that moves 32-bit transport words and may block, but always
//! within the deadline the caller hands in.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The channel is not running (disabled, closed, or peer gone).
    #[error("channel disabled")]
    Disabled,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Hardware or driver level fault.
    #[error("fault: {0}")]
    Fault(String),
}

/// Speaker side of the transport.
pub trait OutputTransport: Send {
    /// Transmits `words`, blocking at most `timeout`.
    ///
    /// Returns the number of words accepted, which may be less than
    /// `words.len()` when the deadline expires part way through.
    fn send(&mut self, words: &[i32], timeout: Duration) -> Result<usize, TransportError>;
}

/// Microphone side of the transport.
pub trait InputTransport: Send {
    /// Fills `buf` with captured words, blocking at most `timeout`.
    ///
    /// A short read is not an error: the return value tells how many words
    /// of `buf` are valid.
    fn receive(&mut self, buf: &mut [i32], timeout: Duration) -> Result<usize, TransportError>;
}

impl<T: OutputTransport + ?Sized> OutputTransport for Box<T> {
    fn send(&mut self, words: &[i32], timeout: Duration) -> Result<usize, TransportError> {
        (**self).send(words, timeout)
    }
}

impl<T: InputTransport + ?Sized> InputTransport for Box<T> {
    fn receive(&mut self, buf: &mut [i32], timeout: Duration) -> Result<usize, TransportError> {
        (**self).receive(buf, timeout)
    }
}
