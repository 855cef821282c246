//! Backlog of recently played samples used to rebuild the echo reference.
//!
//! Live data always sits in `[read_pos, write_pos)`. Instead of wrapping, the
//! live region is shifted back to the origin on the next append, which keeps
//! both indices within `0..=capacity`. When the backlog would overflow the
//! oldest samples are dropped, never the incoming ones.

use log::debug;

pub struct ReferenceBuffer {
    samples: Vec<i16>,
    read_pos: usize,
    write_pos: usize,
    overflowed: u64,
}

impl ReferenceBuffer {
    /// Allocates a buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0; capacity],
            read_pos: 0,
            write_pos: 0,
            overflowed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples waiting to be drained.
    pub fn len(&self) -> usize {
        self.write_pos - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Total samples discarded to make room for newer ones.
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    /// Archives freshly played samples.
    ///
    /// A batch longer than the whole buffer only keeps its newest
    /// `capacity()` samples.
    pub fn append(&mut self, samples: &[i16]) {
        let capacity = self.capacity();
        let samples = if samples.len() > capacity {
            let skipped = samples.len() - capacity;
            self.note_overflow(self.len() + skipped);
            self.read_pos = 0;
            self.write_pos = 0;
            &samples[skipped..]
        } else {
            samples
        };

        let pending = self.len() + samples.len();
        if pending > capacity {
            let overflow = pending - capacity;
            self.note_overflow(overflow);
            self.read_pos += overflow;
        }

        if self.read_pos > 0 {
            self.samples.copy_within(self.read_pos..self.write_pos, 0);
            self.write_pos -= self.read_pos;
            self.read_pos = 0;
        }

        let end = self.write_pos + samples.len();
        self.samples[self.write_pos..end].copy_from_slice(samples);
        self.write_pos = end;
    }

    /// Pops the oldest archived sample, or silence when nothing is pending.
    pub fn drain(&mut self) -> i16 {
        if self.read_pos >= self.write_pos {
            return 0;
        }
        let sample = self.samples[self.read_pos];
        self.read_pos += 1;
        if self.read_pos == self.write_pos {
            self.read_pos = 0;
            self.write_pos = 0;
        }
        sample
    }

    fn note_overflow(&mut self, dropped: usize) {
        if dropped > 0 {
            debug!("Reference backlog full, dropping {} oldest samples", dropped);
            self.overflowed += dropped as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indices(buf: &ReferenceBuffer) {
        assert!(buf.read_pos() <= buf.write_pos());
        assert!(buf.write_pos() <= buf.capacity());
    }

    fn drain_n(buf: &mut ReferenceBuffer, n: usize) -> Vec<i16> {
        (0..n).map(|_| buf.drain()).collect()
    }

    #[test]
    fn test_empty_drain_is_silence() {
        let mut buf = ReferenceBuffer::new(8);
        assert_eq!(buf.drain(), 0);
        assert_eq!((buf.read_pos(), buf.write_pos()), (0, 0));
    }

    #[test]
    fn test_fifo_order() {
        let mut buf = ReferenceBuffer::new(8);
        buf.append(&[10, 20, 30]);
        buf.append(&[40]);
        assert_eq!(buf.len(), 4);
        assert_eq!(drain_n(&mut buf, 5), vec![10, 20, 30, 40, 0]);
    }

    #[test]
    fn test_single_oversized_append_keeps_newest() {
        let mut buf = ReferenceBuffer::new(4);
        buf.append(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(drain_n(&mut buf, 6), vec![3, 4, 5, 6, 0, 0]);
        assert_eq!(buf.overflowed(), 2);
    }

    #[test]
    fn test_overflow_across_batches_keeps_newest() {
        let mut buf = ReferenceBuffer::new(4);
        buf.append(&[1, 2]);
        buf.append(&[3, 4, 5, 6]);
        assert_eq!(buf.overflowed(), 2);
        assert_eq!(drain_n(&mut buf, 6), vec![3, 4, 5, 6, 0, 0]);
    }

    #[test]
    fn test_last_capacity_samples_survive_long_stream() {
        let mut buf = ReferenceBuffer::new(5);
        let stream: Vec<i16> = (1..=23).collect();
        for chunk in stream.chunks(3) {
            buf.append(chunk);
            assert_indices(&buf);
        }
        assert_eq!(drain_n(&mut buf, 5), vec![19, 20, 21, 22, 23]);
        assert_eq!(buf.overflowed(), 18);
    }

    #[test]
    fn test_compaction_after_partial_drain() {
        let mut buf = ReferenceBuffer::new(6);
        buf.append(&[1, 2, 3, 4]);
        assert_eq!(drain_n(&mut buf, 3), vec![1, 2, 3]);
        assert_eq!(buf.read_pos(), 3);

        buf.append(&[5, 6]);
        assert_eq!(buf.read_pos(), 0);
        assert_eq!(buf.write_pos(), 3);
        assert_eq!(buf.overflowed(), 0);
        assert_eq!(drain_n(&mut buf, 3), vec![4, 5, 6]);
    }

    #[test]
    fn test_drain_to_empty_resets_indices() {
        let mut buf = ReferenceBuffer::new(16);
        buf.append(&[7; 9]);
        drain_n(&mut buf, 4);
        buf.append(&[8; 3]);
        while !buf.is_empty() {
            buf.drain();
        }
        assert_eq!((buf.read_pos(), buf.write_pos()), (0, 0));
        // Extra drains stay put
        buf.drain();
        assert_eq!((buf.read_pos(), buf.write_pos()), (0, 0));
    }

    #[test]
    fn test_indices_hold_under_mixed_operations() {
        let mut buf = ReferenceBuffer::new(7);
        let mut next = 0i16;
        for round in 0..200usize {
            let batch: Vec<i16> = (0..(round % 6))
                .map(|_| {
                    next = next.wrapping_add(1);
                    next
                })
                .collect();
            buf.append(&batch);
            assert_indices(&buf);
            for _ in 0..(round % 4) {
                buf.drain();
                assert_indices(&buf);
            }
        }
    }
}
