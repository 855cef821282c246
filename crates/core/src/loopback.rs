//! In-memory transport that routes played words straight back to capture.
//!
//! Behaves like a speaker bleeding into a microphone with no acoustic delay.
//! Used by the test suite and by the hardware-free self test.

use crate::transport::{InputTransport, OutputTransport, TransportError};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_micros(200);

/// Creates a connected output/input pair holding up to `capacity` words in flight.
pub fn pair(capacity: usize) -> (LoopbackOutput, LoopbackInput) {
    let (prod, cons) = HeapRb::<i32>::new(capacity).split();
    let connected = Arc::new(AtomicBool::new(true));
    (
        LoopbackOutput {
            prod,
            connected: connected.clone(),
        },
        LoopbackInput {
            cons,
            connected,
            echo_shift: 0,
        },
    )
}

pub struct LoopbackOutput {
    prod: HeapProd<i32>,
    connected: Arc<AtomicBool>,
}

pub struct LoopbackInput {
    cons: HeapCons<i32>,
    connected: Arc<AtomicBool>,
    echo_shift: u32,
}

impl LoopbackInput {
    /// Attenuates looped words by `shift` bits, like a quieter echo path.
    pub fn with_echo_shift(mut self, shift: u32) -> Self {
        self.echo_shift = shift.min(31);
        self
    }
}

impl OutputTransport for LoopbackOutput {
    fn send(&mut self, words: &[i32], timeout: Duration) -> Result<usize, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut sent = 0;
        while sent < words.len() {
            if !self.connected.load(Ordering::Acquire) {
                return Err(TransportError::Disabled);
            }
            sent += self.prod.push_slice(&words[sent..]);
            if sent < words.len() {
                if Instant::now() >= deadline {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        if sent == 0 && !words.is_empty() {
            return Err(TransportError::Timeout(timeout));
        }
        Ok(sent)
    }
}

impl InputTransport for LoopbackInput {
    fn receive(&mut self, buf: &mut [i32], timeout: Duration) -> Result<usize, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut received = 0;
        while received < buf.len() {
            received += self.cons.pop_slice(&mut buf[received..]);
            if received < buf.len() {
                if !self.connected.load(Ordering::Acquire) {
                    break;
                }
                if Instant::now() >= deadline {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        if received == 0 && !buf.is_empty() {
            if !self.connected.load(Ordering::Acquire) {
                return Err(TransportError::Disabled);
            }
            return Err(TransportError::Timeout(timeout));
        }
        if self.echo_shift > 0 {
            for word in &mut buf[..received] {
                *word >>= self.echo_shift;
            }
        }
        Ok(received)
    }
}

impl Drop for LoopbackOutput {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl Drop for LoopbackInput {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(5);

    #[test]
    fn test_words_loop_back_in_order() {
        let (mut tx, mut rx) = pair(16);
        assert_eq!(tx.send(&[1, 2, 3], SHORT).unwrap(), 3);

        let mut buf = [0i32; 3];
        assert_eq!(rx.receive(&mut buf, SHORT).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn test_short_read_is_not_an_error() {
        let (mut tx, mut rx) = pair(16);
        tx.send(&[4, 5], SHORT).unwrap();

        let mut buf = [0i32; 8];
        assert_eq!(rx.receive(&mut buf, SHORT).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
    }

    #[test]
    fn test_empty_receive_times_out() {
        let (_tx, mut rx) = pair(16);
        let mut buf = [0i32; 4];
        assert_eq!(
            rx.receive(&mut buf, SHORT),
            Err(TransportError::Timeout(SHORT))
        );
    }

    #[test]
    fn test_full_send_is_partial_then_times_out() {
        let (mut tx, _rx) = pair(4);
        assert_eq!(tx.send(&[1, 2, 3, 4, 5, 6], SHORT).unwrap(), 4);
        assert_eq!(tx.send(&[7], SHORT), Err(TransportError::Timeout(SHORT)));
    }

    #[test]
    fn test_dropped_peer_disables_channel() {
        let (mut tx, rx) = pair(4);
        drop(rx);
        assert_eq!(tx.send(&[1], SHORT), Err(TransportError::Disabled));

        let (tx, mut rx) = pair(4);
        drop(tx);
        let mut buf = [0i32; 2];
        assert_eq!(rx.receive(&mut buf, SHORT), Err(TransportError::Disabled));
    }

    #[test]
    fn test_echo_shift_attenuates() {
        let (mut tx, rx) = pair(4);
        let mut rx = rx.with_echo_shift(2);
        tx.send(&[400, -400], SHORT).unwrap();
        let mut buf = [0i32; 2];
        rx.receive(&mut buf, SHORT).unwrap();
        assert_eq!(buf, [100, -100]);
    }
}
