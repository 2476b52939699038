//! Fixed-capacity sample FIFO used on both sides of the model.

use crate::error::DenoiseError;

use ringbuf::{
    HeapRb,
    traits::{Consumer, Observer, Producer},
};

/// Circular sample buffer that accumulates audio at the internal rate and
/// releases it in fixed-size frames.
///
/// Storage is allocated once by [`FrameFifo::new`] or [`FrameFifo::configure`].
/// None of the other methods allocate, so the FIFO can live on the real-time
/// thread.
///
/// Overflow is lossy: when a push does not fit, the oldest unread samples are
/// dropped to make room and the loss is added to [`FrameFifo::overwritten`].
/// Reads never zero-pad; callers check [`FrameFifo::available`] first.
///
/// There is no internal synchronization. Producer and consumer are expected
/// to run on the same processing thread.
pub struct FrameFifo {
    ring: HeapRb<f32>,
    capacity: usize,
    overwritten: u64,
}

impl FrameFifo {
    /// Creates an empty FIFO holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self, DenoiseError> {
        if capacity == 0 {
            return Err(DenoiseError::InvalidCapacity);
        }

        Ok(Self {
            ring: HeapRb::new(capacity),
            capacity,
            overwritten: 0,
        })
    }

    /// Resets the FIFO to empty with a new fixed capacity.
    ///
    /// # Warning
    /// Allocates. Do not call from the processing thread.
    pub fn configure(&mut self, capacity: usize) -> Result<(), DenoiseError> {
        *self = Self::new(capacity)?;
        Ok(())
    }

    /// Appends `samples`, overwriting the oldest unread samples if needed.
    ///
    /// If `samples` is longer than the capacity only its newest `capacity`
    /// samples are kept.
    pub fn push(&mut self, samples: &[f32]) {
        let samples = if samples.len() > self.capacity {
            let excess = samples.len() - self.capacity;
            self.overwritten += excess as u64;
            &samples[excess..]
        } else {
            samples
        };

        let vacant = self.ring.vacant_len();
        if samples.len() > vacant {
            let dropped = self.ring.skip(samples.len() - vacant);
            self.overwritten += dropped as u64;
        }

        self.ring.push_slice(samples);
    }

    /// Appends `count` zero samples with the same overwrite policy as [`FrameFifo::push`].
    pub fn push_silence(&mut self, count: usize) {
        const CHUNK: [f32; 64] = [0.0; 64];

        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(CHUNK.len());
            self.push(&CHUNK[..n]);
            remaining -= n;
        }
    }

    /// Number of samples that can currently be read.
    pub fn available(&self) -> usize {
        self.ring.occupied_len()
    }

    /// Number of samples that can be pushed without overwriting.
    pub fn free(&self) -> usize {
        self.ring.vacant_len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of samples lost to overwrite since construction.
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }

    /// Copies the oldest `dest.len()` samples into `dest` without consuming them.
    pub fn peek(&self, dest: &mut [f32]) -> Result<(), DenoiseError> {
        let requested = dest.len();
        let available = self.available();
        if requested > available {
            return Err(DenoiseError::Underrun {
                requested,
                available,
            });
        }

        let (head, tail) = self.ring.as_slices();
        let from_head = requested.min(head.len());
        dest[..from_head].copy_from_slice(&head[..from_head]);
        dest[from_head..].copy_from_slice(&tail[..requested - from_head]);

        Ok(())
    }

    /// Consumes `count` samples.
    pub fn discard(&mut self, count: usize) -> Result<(), DenoiseError> {
        let available = self.available();
        if count > available {
            return Err(DenoiseError::Underrun {
                requested: count,
                available,
            });
        }

        self.ring.skip(count);
        Ok(())
    }

    /// Reads and consumes `dest.len()` samples.
    pub fn pop(&mut self, dest: &mut [f32]) -> Result<(), DenoiseError> {
        self.peek(dest)?;
        self.discard(dest.len())
    }

    /// Drops every buffered sample. Capacity and the overwrite counter are kept.
    pub fn clear(&mut self) {
        let occupied = self.ring.occupied_len();
        self.ring.skip(occupied);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_LEN: usize = 480;

    fn ramp(start: usize, len: usize) -> Vec<f32> {
        (start..start + len).map(|i| i as f32).collect()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(FrameFifo::new(0).err(), Some(DenoiseError::InvalidCapacity));

        let mut fifo = FrameFifo::new(8).unwrap();
        assert_eq!(fifo.configure(0), Err(DenoiseError::InvalidCapacity));
    }

    #[test]
    fn configure_resets_to_empty() {
        let mut fifo = FrameFifo::new(8).unwrap();
        fifo.push(&[1.0, 2.0, 3.0]);

        fifo.configure(16).unwrap();

        assert_eq!(fifo.available(), 0);
        assert_eq!(fifo.capacity(), 16);
        assert_eq!(fifo.free(), 16);
    }

    #[test]
    fn frames_are_conserved() {
        let mut fifo = FrameFifo::new(48_000).unwrap();
        // Irregular push sizes adding up to 20 frames.
        let sizes = [1, 479, 960, 37, 443, 2400, 3000, 2280];
        let total: usize = sizes.iter().sum();
        assert_eq!(total % FRAME_LEN, 0);

        let mut offset = 0;
        for size in sizes {
            fifo.push(&ramp(offset, size));
            offset += size;
        }

        let mut frame = [0.0f32; FRAME_LEN];
        let mut frames = 0;
        while fifo.available() >= FRAME_LEN {
            fifo.peek(&mut frame).unwrap();
            assert_eq!(frame.to_vec(), ramp(frames * FRAME_LEN, FRAME_LEN));
            fifo.discard(FRAME_LEN).unwrap();
            frames += 1;
        }

        assert_eq!(frames, total / FRAME_LEN);
        assert_eq!(fifo.available(), 0);
    }

    #[test]
    fn order_is_preserved_across_wraparound() {
        let mut fifo = FrameFifo::new(100).unwrap();
        let mut written = 0;
        let mut read = 0;

        for round in 0..50 {
            let chunk = (13 + round % 29).min(fifo.free());
            fifo.push(&ramp(written, chunk));
            written += chunk;

            let take = fifo.available().min(17 + round % 11);
            let mut out = vec![0.0f32; take];
            fifo.pop(&mut out).unwrap();
            assert_eq!(out, ramp(read, take));
            read += take;
        }

        // The ring wrapped several times without losing anything.
        assert!(written > 4 * fifo.capacity());
        assert_eq!(read + fifo.available(), written);
        assert_eq!(fifo.overwritten(), 0);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut fifo = FrameFifo::new(16).unwrap();
        fifo.push(&[1.0, 2.0, 3.0, 4.0]);

        let mut first = [0.0f32; 3];
        let mut second = [0.0f32; 3];
        fifo.peek(&mut first).unwrap();
        fifo.peek(&mut second).unwrap();

        assert_eq!(first, [1.0, 2.0, 3.0]);
        assert_eq!(first, second);
        assert_eq!(fifo.available(), 4);
    }

    #[test]
    fn overwrite_keeps_newest_samples() {
        let mut fifo = FrameFifo::new(10).unwrap();
        fifo.push(&ramp(0, 6));
        fifo.push(&ramp(6, 8));

        assert_eq!(fifo.available(), 10);
        assert_eq!(fifo.overwritten(), 4);

        let mut out = [0.0f32; 10];
        fifo.pop(&mut out).unwrap();
        assert_eq!(out.to_vec(), ramp(4, 10));
    }

    #[test]
    fn overwrite_never_exceeds_capacity() {
        let capacity = 64;
        for prior in [0, 1, 30, 63, 64] {
            for count in [1, 10, 34, 64, 65, 200] {
                let mut fifo = FrameFifo::new(capacity).unwrap();
                fifo.push(&ramp(0, prior));
                fifo.push(&ramp(prior, count));

                assert_eq!(fifo.available(), capacity.min(prior + count));
                assert_eq!(
                    fifo.overwritten(),
                    (prior + count).saturating_sub(capacity) as u64
                );
            }
        }
    }

    #[test]
    fn oversized_push_keeps_last_capacity_samples() {
        let mut fifo = FrameFifo::new(4).unwrap();
        fifo.push(&ramp(0, 10));

        let mut out = [0.0f32; 4];
        fifo.pop(&mut out).unwrap();
        assert_eq!(out, [6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn reading_more_than_available_is_an_underrun() {
        let mut fifo = FrameFifo::new(16).unwrap();
        fifo.push(&[0.5; 5]);

        let mut dest = [0.0f32; 6];
        assert_eq!(
            fifo.peek(&mut dest),
            Err(DenoiseError::Underrun {
                requested: 6,
                available: 5
            })
        );
        assert_eq!(
            fifo.discard(6),
            Err(DenoiseError::Underrun {
                requested: 6,
                available: 5
            })
        );
        assert_eq!(fifo.available(), 5);
    }

    #[test]
    fn silence_and_clear() {
        let mut fifo = FrameFifo::new(1000).unwrap();
        fifo.push(&[1.0; 10]);
        fifo.clear();
        assert_eq!(fifo.available(), 0);

        fifo.push_silence(FRAME_LEN);
        assert_eq!(fifo.available(), FRAME_LEN);

        let mut out = vec![1.0f32; FRAME_LEN];
        fifo.pop(&mut out).unwrap();
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
